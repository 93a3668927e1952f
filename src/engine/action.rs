//! Inbound `{ "action": ..., "payload": {...} }` messages.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct Envelope {
    action: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameSettings {
    pub topic_id: Uuid,
    pub personality_id: Uuid,
    #[serde(default)]
    pub total_rounds: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct CustomThemePayload {
    text: String,
}

#[derive(Debug, Deserialize)]
struct PlayCardPayload {
    #[serde(alias = "player_card_id")]
    hand_entry_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct SelectWinnersPayload {
    winner_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    SetGameSettings(GameSettings),
    StartGame,
    ChooseThemeCard,
    SubmitCustomTheme { text: String },
    PlayCard { hand_entry_id: Uuid },
    SelectWinners { winner_ids: Vec<Uuid> },
    StartNextRound,
}

/// Result of decoding one text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Action(ClientAction),
    /// Well-formed envelope naming an action this server does not know
    Unknown(String),
    /// Not an envelope, or a known action with a payload that does not fit
    Malformed(String),
}

impl ClientAction {
    #[must_use]
    pub fn decode(raw: &str) -> Decoded {
        let Ok(envelope) = serde_json::from_str::<Envelope>(raw) else {
            return Decoded::Malformed("Invalid message format.".to_string());
        };

        let action = match envelope.action.as_str() {
            "set_game_settings" => payload(envelope.payload).map(Self::SetGameSettings),
            "start_game" => Ok(Self::StartGame),
            "choose_theme_card" => Ok(Self::ChooseThemeCard),
            "submit_custom_theme" => payload::<CustomThemePayload>(envelope.payload)
                .map(|p| Self::SubmitCustomTheme { text: p.text }),
            "play_card" => payload::<PlayCardPayload>(envelope.payload).map(|p| Self::PlayCard {
                hand_entry_id: p.hand_entry_id,
            }),
            "select_winners" => payload::<SelectWinnersPayload>(envelope.payload).map(|p| {
                Self::SelectWinners {
                    winner_ids: p.winner_ids,
                }
            }),
            "start_next_round" => Ok(Self::StartNextRound),
            _ => return Decoded::Unknown(envelope.action),
        };

        match action {
            Ok(action) => Decoded::Action(action),
            Err(e) => Decoded::Malformed(format!("Invalid payload for {}: {e}", envelope.action)),
        }
    }

    /// Wire name, used as the `action` log field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetGameSettings(_) => "set_game_settings",
            Self::StartGame => "start_game",
            Self::ChooseThemeCard => "choose_theme_card",
            Self::SubmitCustomTheme { .. } => "submit_custom_theme",
            Self::PlayCard { .. } => "play_card",
            Self::SelectWinners { .. } => "select_winners",
            Self::StartNextRound => "start_next_round",
        }
    }
}

fn payload<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_actions_without_payload() {
        assert_eq!(
            ClientAction::decode(r#"{"action":"start_game","payload":{}}"#),
            Decoded::Action(ClientAction::StartGame)
        );
        assert_eq!(
            ClientAction::decode(r#"{"action":"choose_theme_card"}"#),
            Decoded::Action(ClientAction::ChooseThemeCard)
        );
    }

    #[test]
    fn test_decode_play_card_accepts_legacy_field() {
        let id = Uuid::new_v4();
        let expected = Decoded::Action(ClientAction::PlayCard { hand_entry_id: id });
        assert_eq!(
            ClientAction::decode(&format!(
                r#"{{"action":"play_card","payload":{{"hand_entry_id":"{id}"}}}}"#
            )),
            expected
        );
        assert_eq!(
            ClientAction::decode(&format!(
                r#"{{"action":"play_card","payload":{{"player_card_id":"{id}"}}}}"#
            )),
            expected
        );
    }

    #[test]
    fn test_decode_settings_with_optional_rounds() {
        let (topic, personality) = (Uuid::new_v4(), Uuid::new_v4());
        let raw = format!(
            r#"{{"action":"set_game_settings","payload":{{"topic_id":"{topic}","personality_id":"{personality}"}}}}"#
        );
        assert_eq!(
            ClientAction::decode(&raw),
            Decoded::Action(ClientAction::SetGameSettings(GameSettings {
                topic_id: topic,
                personality_id: personality,
                total_rounds: None,
            }))
        );
    }

    #[test]
    fn test_unknown_action() {
        assert_eq!(
            ClientAction::decode(r#"{"action":"dance","payload":{}}"#),
            Decoded::Unknown("dance".to_string())
        );
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(ClientAction::decode("not json"), Decoded::Malformed(_)));
        assert!(matches!(
            ClientAction::decode(r#"{"action":"play_card","payload":{"hand_entry_id":42}}"#),
            Decoded::Malformed(_)
        ));
        assert!(matches!(
            ClientAction::decode(r#"{"action":"select_winners"}"#),
            Decoded::Malformed(_)
        ));
    }
}
