//! Outbound `{ "type": ..., "data": ... }` messages and the bookkeeping a transition leaves
//! for the publisher.

use serde::Serialize;
use uuid::Uuid;

use crate::dto::{HandEntryView, RoomSnapshot};
use crate::entities::player;

pub const ROOM_CLOSED_MESSAGE: &str = "The room has been closed.";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    GameStateUpdate(RoomSnapshot),
    PlayerHandUpdate(Vec<HandEntryView>),
    Error { message: String },
    RoomClosed { message: String },
    GameOver(GameOver),
}

impl ServerEvent {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Why a game went back to the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    RoundsCompleted,
    OutOfThemeCards,
    OutOfResponseCards,
    NotEnoughPlayers,
}

impl GameOverReason {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::RoundsCompleted => "All rounds have been played.",
            Self::OutOfThemeCards => "There are no theme cards left. The game is over.",
            Self::OutOfResponseCards => "There are not enough response cards left. The game is over.",
            Self::NotEnoughPlayers => "Not enough players left to continue. The game is over.",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GameOver {
    pub reason: GameOverReason,
    pub message: String,
    /// Highest score first; ties keep join order
    pub standings: Vec<Standing>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub player_id: Uuid,
    pub username: String,
    pub score: i32,
}

impl GameOver {
    /// `players` must already be in join order.
    #[must_use]
    pub fn new(reason: GameOverReason, players: &[player::Model]) -> Self {
        let mut standings: Vec<Standing> = players
            .iter()
            .map(|p| Standing {
                player_id: p.id,
                username: p.display_name.clone(),
                score: p.score,
            })
            .collect();
        standings.sort_by(|a, b| b.score.cmp(&a.score));

        Self {
            reason,
            message: reason.message().to_string(),
            standings,
        }
    }
}

/// Which private hands to push after a committed transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HandRefresh {
    #[default]
    None,
    Players(Vec<Uuid>),
    All,
}

/// Side effects of a committed transition, applied by the publisher.
#[derive(Debug, Clone, Default)]
pub struct Transition {
    pub hands: HandRefresh,
    pub game_over: Option<GameOver>,
    /// Ask the background replenisher to look at this room's pool.
    pub check_pool: bool,
}

impl Transition {
    #[must_use]
    pub fn hands_of(players: Vec<Uuid>) -> Self {
        Self {
            hands: HandRefresh::Players(players),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn game_over(over: GameOver) -> Self {
        Self {
            game_over: Some(over),
            ..Self::default()
        }
    }
}
