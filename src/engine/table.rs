//! In-transaction view of one room and its roster.

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use super::events::{GameOver, GameOverReason};
use crate::entities::room::PlayedCard;
use crate::entities::{GameState, RoundPhase, SeatStatus, player, room};
use crate::error::AppError;

pub struct Table {
    pub room: room::Model,
    /// In join order
    pub players: Vec<player::Model>,
}

impl Table {
    pub async fn load<C: ConnectionTrait>(conn: &C, room_id: Uuid) -> Result<Option<Self>, DbErr> {
        let Some(room) = room::Entity::find_by_id(room_id).one(conn).await? else {
            return Ok(None);
        };
        let players = player::Entity::find()
            .filter(player::Column::RoomId.eq(room_id))
            .order_by_asc(player::Column::JoinOrder)
            .all(conn)
            .await?;
        Ok(Some(Self { room, players }))
    }

    /// Like [`Table::load`], but a missing room is an error.
    pub async fn require<C: ConnectionTrait>(conn: &C, room_id: Uuid) -> Result<Self, AppError> {
        Self::load(conn, room_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found.".to_string()))
    }

    pub fn member(&self, player_id: Uuid) -> Result<&player::Model, AppError> {
        self.players
            .iter()
            .find(|p| p.id == player_id)
            .ok_or_else(|| AppError::NotFound("Player is not in this room.".to_string()))
    }

    pub fn require_host(&self, player_id: Uuid) -> Result<&player::Model, AppError> {
        let actor = self.member(player_id)?;
        if actor.is_host {
            Ok(actor)
        } else {
            Err(AppError::Forbidden("Only the host can do that.".to_string()))
        }
    }

    /// The actor must be the theme master of a running game in `phase`.
    pub fn require_theme_master(&self, player_id: Uuid, phase: RoundPhase) -> Result<(), AppError> {
        self.member(player_id)?;
        if self.room.theme_master_id != Some(player_id) {
            return Err(AppError::Forbidden("Only the theme master can do that.".to_string()));
        }
        self.require_phase(phase)
    }

    pub fn require_phase(&self, phase: RoundPhase) -> Result<(), AppError> {
        if self.room.in_phase(phase) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Not allowed outside of {phase}.")))
        }
    }

    /// Players taking part in the game, spectators excluded.
    pub fn seated(&self) -> impl Iterator<Item = &player::Model> {
        self.players.iter().filter(|p| p.seat().is_active())
    }

    pub fn with_seat(&self, seat: SeatStatus) -> impl Iterator<Item = &player::Model> {
        self.players.iter().filter(move |p| p.seat() == seat)
    }

    /// Persist changes to the room row and bump its activity timestamp.
    pub async fn update_room<C, F>(&mut self, conn: &C, apply: F) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
        F: FnOnce(&mut room::ActiveModel),
    {
        let mut active: room::ActiveModel = self.room.clone().into();
        apply(&mut active);
        active.updated_at = Set(Utc::now().fixed_offset());
        self.room = active.update(conn).await?;
        Ok(())
    }

    pub async fn update_player<C, F>(&mut self, conn: &C, player_id: Uuid, apply: F) -> Result<(), DbErr>
    where
        C: ConnectionTrait,
        F: FnOnce(&mut player::ActiveModel),
    {
        let Some(idx) = self.players.iter().position(|p| p.id == player_id) else {
            return Ok(());
        };
        let mut active: player::ActiveModel = self.players[idx].clone().into();
        apply(&mut active);
        self.players[idx] = active.update(conn).await?;
        Ok(())
    }

    pub async fn set_seat<C: ConnectionTrait>(
        &mut self,
        conn: &C,
        player_id: Uuid,
        seat: SeatStatus,
    ) -> Result<(), DbErr> {
        if self.players.iter().any(|p| p.id == player_id && p.seat() == seat) {
            return Ok(());
        }
        self.update_player(conn, player_id, |p| p.seat = Set(seat.as_str().to_string()))
            .await
    }

    /// Make `player_id` the theme master; every other seated player goes back to waiting.
    pub async fn seat_theme_master<C: ConnectionTrait>(
        &mut self,
        conn: &C,
        player_id: Uuid,
    ) -> Result<(), DbErr> {
        let seated: Vec<Uuid> = self.seated().map(|p| p.id).collect();
        for id in seated {
            let seat = if id == player_id {
                SeatStatus::ThemeMaster
            } else {
                SeatStatus::Waiting
            };
            self.set_seat(conn, id, seat).await?;
        }
        self.update_room(conn, |r| r.theme_master_id = Set(Some(player_id)))
            .await
    }

    /// Clear the per-round fields and go to `ThemeSelection`.
    pub async fn open_round<C: ConnectionTrait>(&mut self, conn: &C, round: i32) -> Result<(), DbErr> {
        self.update_room(conn, |r| {
            r.game_state = Set(GameState::InGame.as_str().to_string());
            r.round_phase = Set(Some(RoundPhase::ThemeSelection.as_str().to_string()));
            r.current_theme_card_id = Set(None);
            r.played_cards = Set(serde_json::json!([]));
            r.round_winners = Set(serde_json::json!([]));
            r.current_round = Set(round);
        })
        .await
    }

    pub async fn set_played_cards<C: ConnectionTrait>(
        &mut self,
        conn: &C,
        played: &[PlayedCard],
    ) -> Result<(), AppError> {
        let value = serde_json::to_value(played)?;
        self.update_room(conn, |r| r.played_cards = Set(value)).await?;
        Ok(())
    }

    /// Send the room back to the lobby, keeping scores for the standings.
    pub async fn end_game<C: ConnectionTrait>(
        &mut self,
        conn: &C,
        reason: GameOverReason,
    ) -> Result<GameOver, DbErr> {
        let ids: Vec<Uuid> = self.players.iter().map(|p| p.id).collect();
        for id in ids {
            self.set_seat(conn, id, SeatStatus::Waiting).await?;
        }
        self.update_room(conn, |r| {
            r.game_state = Set(GameState::Lobby.as_str().to_string());
            r.round_phase = Set(None);
            r.theme_master_id = Set(None);
            r.current_theme_card_id = Set(None);
            r.played_cards = Set(serde_json::json!([]));
            r.round_winners = Set(serde_json::json!([]));
        })
        .await?;

        tracing::info!(room = %self.room.code, ?reason, "Game over");
        Ok(GameOver::new(reason, &self.players))
    }
}
