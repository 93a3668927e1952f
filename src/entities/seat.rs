use serde::{Deserialize, Serialize};
use std::fmt;

/// What a member is doing in the current round.
///
/// Replaces independent `is_theme_master` / `has_played` / `is_spectating` flags, so a
/// spectating judge or a judge who has played cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    /// Joined mid-game, promoted at the next round boundary
    Spectating,
    /// Active player who has not played a card this round
    #[default]
    Waiting,
    /// Active player who has played a card this round
    Played,
    /// The player judging this round
    ThemeMaster,
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SeatStatus {
    /// Convert from database string representation
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "spectating" => Some(Self::Spectating),
            "waiting" => Some(Self::Waiting),
            "played" => Some(Self::Played),
            "theme_master" => Some(Self::ThemeMaster),
            _ => None,
        }
    }

    /// Convert to database string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spectating => "spectating",
            Self::Waiting => "waiting",
            Self::Played => "played",
            Self::ThemeMaster => "theme_master",
        }
    }

    /// Takes part in rounds (holds a hand, can judge)
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::Spectating)
    }
}
