use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::seat::SeatStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "player")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub score: i32,
    pub is_host: bool,
    pub seat: String,
    /// `false` while every connection of the player is closed
    pub is_active: bool,
    /// Stable tenure order inside the room
    pub join_order: i32,
    pub joined_at: DateTimeWithTimeZone,
}

impl Model {
    #[must_use]
    pub fn seat(&self) -> SeatStatus {
        SeatStatus::from_str(&self.seat).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::room::Entity",
        from = "Column::RoomId",
        to = "super::room::Column::Id"
    )]
    Room,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::hand_entry::Entity")]
    HandEntry,
}

impl Related<super::room::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Room.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::hand_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::HandEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
