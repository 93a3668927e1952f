use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::room::PlayedCard;
use crate::entities::{CardKind, GameState, RoundPhase, SeatStatus, card, personality, player};

// ============ Request DTOs ============

/// Room creation request; every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct CreateRoomRequest {
    pub topic_id: Option<Uuid>,
    pub personality_id: Option<Uuid>,
    pub total_rounds: Option<i32>,
}

// ============ Response DTOs ============

/// Full room state broadcast as `game_state_update`.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub id: Uuid,
    pub code: String,
    pub game_state: GameState,
    pub round_phase: Option<RoundPhase>,
    pub topic_id: Option<Uuid>,
    pub personality_id: Option<Uuid>,
    pub personality: Option<PersonalitySummary>,
    pub theme_master_id: Option<Uuid>,
    pub current_theme_card: Option<CardView>,
    pub players: Vec<PlayerView>,
    pub played_cards: Vec<PlayedCard>,
    pub round_winners: Vec<Uuid>,
    pub total_rounds: i32,
    pub current_round: i32,
}

impl RoomSnapshot {
    #[must_use]
    pub fn player(&self, player_id: Uuid) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == player_id)
    }
}

/// A room member as seen by everyone in the room.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub score: i32,
    pub seat: SeatStatus,
    pub is_host: bool,
    pub is_theme_master: bool,
    pub has_played: bool,
    pub is_spectating: bool,
    pub is_active: bool,
}

impl From<&player::Model> for PlayerView {
    fn from(p: &player::Model) -> Self {
        let seat = p.seat();
        Self {
            id: p.id,
            user_id: p.user_id,
            username: p.display_name.clone(),
            score: p.score,
            seat,
            is_host: p.is_host,
            is_theme_master: seat == SeatStatus::ThemeMaster,
            has_played: seat == SeatStatus::Played,
            is_spectating: seat == SeatStatus::Spectating,
            is_active: p.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalitySummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
}

impl From<personality::Model> for PersonalitySummary {
    fn from(p: personality::Model) -> Self {
        Self {
            id: p.id,
            title: p.title,
            description: p.description,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CardView {
    pub id: Uuid,
    pub text: String,
    pub card_type: CardKind,
}

impl From<card::Model> for CardView {
    fn from(c: card::Model) -> Self {
        Self {
            card_type: c.kind(),
            id: c.id,
            text: c.text,
        }
    }
}

/// One card in a player's private hand; `id` is what `play_card` refers to.
#[derive(Debug, Clone, Serialize)]
pub struct HandEntryView {
    pub id: Uuid,
    pub card: CardView,
}

/// Returned by the create and join endpoints.
#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub player_id: Uuid,
    pub room: RoomSnapshot,
}
