use serde::{Deserialize, Serialize};
use std::fmt;

/// Room lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GameState {
    /// Players gather and the host picks settings
    #[default]
    Lobby,
    /// Cards are being generated for a starting game
    Generating,
    /// Rounds are being played
    InGame,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GameState {
    /// Convert from database string representation
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Lobby" => Some(Self::Lobby),
            "Generating" => Some(Self::Generating),
            "InGame" => Some(Self::InGame),
            _ => None,
        }
    }

    /// Convert to database string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lobby => "Lobby",
            Self::Generating => "Generating",
            Self::InGame => "InGame",
        }
    }

    /// New members join as active players only before the game is dealt
    pub const fn seats_new_players(&self) -> bool {
        matches!(self, Self::Lobby | Self::Generating)
    }
}

/// Sub-state of an in-progress game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    ThemeSelection,
    CardPlaying,
    Voting,
    RoundOver,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RoundPhase {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ThemeSelection" => Some(Self::ThemeSelection),
            "CardPlaying" => Some(Self::CardPlaying),
            "Voting" => Some(Self::Voting),
            "RoundOver" => Some(Self::RoundOver),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ThemeSelection => "ThemeSelection",
            Self::CardPlaying => "CardPlaying",
            Self::Voting => "Voting",
            Self::RoundOver => "RoundOver",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_state_round_trips_through_db_strings() {
        for state in [GameState::Lobby, GameState::Generating, GameState::InGame] {
            assert_eq!(GameState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(GameState::from_str("lobby"), None);
    }

    #[test]
    fn test_round_phase_from_str() {
        assert_eq!(
            RoundPhase::from_str("ThemeSelection"),
            Some(RoundPhase::ThemeSelection)
        );
        assert_eq!(RoundPhase::from_str("Voting"), Some(RoundPhase::Voting));
        assert_eq!(RoundPhase::from_str("Finished"), None);
    }

    #[test]
    fn test_seats_new_players() {
        assert!(GameState::Lobby.seats_new_players());
        assert!(GameState::Generating.seats_new_players());
        assert!(!GameState::InGame.seats_new_players());
    }

    #[test]
    fn test_serializes_as_pascal_case() {
        let json = serde_json::to_string(&GameState::InGame).unwrap_or_default();
        assert_eq!(json, "\"InGame\"");
        let json = serde_json::to_string(&RoundPhase::RoundOver).unwrap_or_default();
        assert_eq!(json, "\"RoundOver\"");
    }

    #[test]
    fn test_default() {
        assert_eq!(GameState::default(), GameState::Lobby);
    }
}
