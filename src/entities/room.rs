use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::room_state::{GameState, RoundPhase};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "room")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub game_state: String,
    pub round_phase: Option<String>,
    pub topic_id: Option<Uuid>,
    pub personality_id: Option<Uuid>,
    pub current_theme_card_id: Option<Uuid>,
    pub theme_master_id: Option<Uuid>,
    /// `Vec<PlayedCard>` in play order
    pub played_cards: Json,
    /// Player ids in rank order
    pub round_winners: Json,
    pub total_rounds: i32,
    pub current_round: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

/// A card put on the table this round, denormalized for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedCard {
    pub player_id: Uuid,
    pub player_name: String,
    pub card_id: Uuid,
    pub card_text: String,
}

impl Model {
    #[must_use]
    pub fn state(&self) -> GameState {
        GameState::from_str(&self.game_state).unwrap_or_default()
    }

    #[must_use]
    pub fn phase(&self) -> Option<RoundPhase> {
        self.round_phase.as_deref().and_then(RoundPhase::from_str)
    }

    /// `true` when the room is mid-game in `phase`.
    #[must_use]
    pub fn in_phase(&self, phase: RoundPhase) -> bool {
        self.state() == GameState::InGame && self.phase() == Some(phase)
    }

    #[must_use]
    pub fn played_cards(&self) -> Vec<PlayedCard> {
        serde_json::from_value(self.played_cards.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn round_winners(&self) -> Vec<Uuid> {
        serde_json::from_value(self.round_winners.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::player::Entity")]
    Player,
    #[sea_orm(
        belongs_to = "super::topic::Entity",
        from = "Column::TopicId",
        to = "super::topic::Column::Id"
    )]
    Topic,
    #[sea_orm(
        belongs_to = "super::personality::Entity",
        from = "Column::PersonalityId",
        to = "super::personality::Column::Id"
    )]
    Personality,
    #[sea_orm(
        belongs_to = "super::card::Entity",
        from = "Column::CurrentThemeCardId",
        to = "super::card::Column::Id"
    )]
    CurrentThemeCard,
}

impl Related<super::player::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Player.def()
    }
}

impl Related<super::topic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Topic.def()
    }
}

impl Related<super::personality::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Personality.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
