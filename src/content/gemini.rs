use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ContentProvider, GenerationRequest};
use crate::entities::CardKind;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Content provider backed by the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    fn body(request: &GenerationRequest) -> serde_json::Value {
        let ask = match request.kind {
            CardKind::Response => format!(
                "Generate {} response cards (short answers) for this topic.",
                request.count
            ),
            CardKind::Theme => format!(
                "Generate {} theme cards for this topic. Each one must contain the blank {}.",
                request.count,
                super::BLANK
            ),
        };

        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": format!("{}\n{ask}", request.system_instruction()) }],
            }],
            "generationConfig": {
                "temperature": 1.0,
                "topP": 0.95,
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "cards": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": { "text": { "type": "STRING" } },
                                "required": ["text"],
                            },
                        },
                    },
                    "required": ["cards"],
                },
            },
        })
    }
}

#[async_trait]
impl ContentProvider for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<Vec<String>> {
        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::body(request))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to reach Gemini: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Gemini request failed ({status}): {body}"));
        }

        let payload = resp
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse Gemini response: {e}"))?;

        parse_cards(&payload)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CardBatch {
    cards: Vec<CardText>,
}

#[derive(Debug, Deserialize)]
struct CardText {
    text: String,
}

/// Pull the card texts out of the first candidate's JSON answer.
fn parse_cards(payload: &GenerateContentResponse) -> anyhow::Result<Vec<String>> {
    let text = payload
        .candidates
        .iter()
        .filter_map(|c| c.content.as_ref())
        .flat_map(|c| c.parts.iter())
        .find_map(|p| p.text.as_deref())
        .ok_or_else(|| anyhow::anyhow!("Gemini response has no text part"))?;

    let batch: CardBatch = serde_json::from_str(text)
        .map_err(|e| anyhow::anyhow!("Gemini answer is not a card batch: {e}"))?;

    Ok(batch.cards.into_iter().map(|c| c.text).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(text: &str) -> GenerateContentResponse {
        serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
        .unwrap_or(GenerateContentResponse { candidates: vec![] })
    }

    #[test]
    fn test_parse_cards() {
        let payload = response(r#"{"cards":[{"text":"A llama"},{"text":"Taxes"}]}"#);
        let cards = parse_cards(&payload).unwrap_or_default();
        assert_eq!(cards, vec!["A llama".to_string(), "Taxes".to_string()]);
    }

    #[test]
    fn test_parse_cards_rejects_prose() {
        assert!(parse_cards(&response("Sure! Here are some cards")).is_err());
        assert!(parse_cards(&GenerateContentResponse { candidates: vec![] }).is_err());
    }

    #[test]
    fn test_theme_prompt_mentions_blank() {
        let body = GeminiProvider::body(&GenerationRequest {
            topic_prompt: "Space".to_string(),
            style_prompt: "Be weird about {topic_prompt}".to_string(),
            kind: CardKind::Theme,
            count: 4,
        });
        let text = body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default();
        assert!(text.starts_with("Be weird about Space"));
        assert!(text.contains("Generate 4 theme cards"));
        assert!(text.contains(super::super::BLANK));
    }
}
