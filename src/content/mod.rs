//! Card text generation.
//!
//! The engine only sees [`ContentProvider`]; failures never reach the game because
//! [`generate_or_placeholder`] swaps them for numbered placeholder cards.

pub mod gemini;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::entities::CardKind;

pub use gemini::GeminiProvider;

/// Marker every placeholder theme carries so it stays playable as a fill-in-the-blank prompt.
pub const BLANK: &str = "______";

/// What to generate for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub topic_prompt: String,
    /// Personality template; `{topic_prompt}` is substituted before sending.
    pub style_prompt: String,
    pub kind: CardKind,
    pub count: usize,
}

impl GenerationRequest {
    /// The personality template with the topic prompt filled in.
    #[must_use]
    pub fn system_instruction(&self) -> String {
        if self.style_prompt.contains("{topic_prompt}") {
            self.style_prompt.replace("{topic_prompt}", &self.topic_prompt)
        } else {
            format!("{}\n{}", self.style_prompt, self.topic_prompt)
        }
    }
}

/// External source of card texts.
#[async_trait]
pub trait ContentProvider: Send + Sync + fmt::Debug {
    /// Produce at most `request.count` card texts.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing service is unreachable or answers with garbage.
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<Vec<String>>;
}

/// Run the provider and fall back to placeholders on failure or an empty answer.
pub async fn generate_or_placeholder(
    provider: &dyn ContentProvider,
    request: &GenerationRequest,
) -> Vec<String> {
    match provider.generate(request).await {
        Ok(texts) => {
            let mut texts: Vec<String> = texts
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            texts.truncate(request.count);
            if texts.is_empty() && request.count > 0 {
                tracing::warn!(kind = %request.kind, "Provider returned no cards, using placeholders");
                return placeholder_cards(request.kind, request.count);
            }
            tracing::info!(kind = %request.kind, count = texts.len(), "Generated cards");
            texts
        }
        Err(e) => {
            tracing::warn!(kind = %request.kind, error = %e, "Card generation failed, using placeholders");
            placeholder_cards(request.kind, request.count)
        }
    }
}

/// Deterministic, clearly marked stand-in cards.
#[must_use]
pub fn placeholder_cards(kind: CardKind, count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| match kind {
            CardKind::Response => format!("Emergency response {i} (AI unavailable)"),
            CardKind::Theme => format!("Emergency theme {BLANK} {i} (AI unavailable)"),
        })
        .collect()
}

/// Provider used when no API key is configured; always yields placeholders.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineProvider;

#[async_trait]
impl ContentProvider for OfflineProvider {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<Vec<String>> {
        Ok(placeholder_cards(request.kind, request.count))
    }
}

/// Pick the provider for this deployment.
#[must_use]
pub fn from_config(config: &Config) -> Arc<dyn ContentProvider> {
    match &config.gemini_api_key {
        Some(key) => Arc::new(GeminiProvider::new(key.clone(), config.gemini_model.clone())),
        None => {
            tracing::warn!("GEMINI_API_KEY not set, cards will be placeholders");
            Arc::new(OfflineProvider)
        }
    }
}
