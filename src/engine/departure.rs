//! Removing a player and repairing the roles they held.

use sea_orm::ActiveValue::Set;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use super::events::{GameOverReason, Transition};
use super::round;
use super::table::Table;
use crate::entities::{GameState, RoundPhase, player, room};
use crate::error::AppError;
use crate::services::CardPool;

/// What happened to the room when a player was removed.
#[derive(Debug)]
pub enum Departure {
    /// The player had already left
    Gone,
    /// The leaver was the last player and the room was deleted
    RoomDeleted,
    Left(Transition),
}

pub async fn remove_player<C: ConnectionTrait>(
    conn: &C,
    table: &mut Table,
    player_id: Uuid,
) -> Result<Departure, AppError> {
    let Some(leaver) = table.players.iter().find(|p| p.id == player_id).cloned() else {
        return Ok(Departure::Gone);
    };

    if table.players.len() <= 1 {
        room::Entity::delete_by_id(table.room.id).exec(conn).await?;
        tracing::info!(room = %table.room.code, "Last player left, room deleted");
        return Ok(Departure::RoomDeleted);
    }

    let was_theme_master = table.room.theme_master_id == Some(player_id);
    if was_theme_master {
        table
            .update_room(conn, |r| r.theme_master_id = Set(None))
            .await?;
    }

    player::Entity::delete_by_id(player_id).exec(conn).await?;
    table.players.retain(|p| p.id != player_id);
    tracing::info!(room = %table.room.code, player = %leaver.display_name, "Player removed");

    if leaver.is_host
        && let Some(next_host) = table.players.first().map(|p| p.id)
    {
        table
            .update_player(conn, next_host, |p| p.is_host = Set(true))
            .await?;
        tracing::info!(room = %table.room.code, host = %next_host, "Host reassigned");
    }

    if table.room.state() != GameState::InGame {
        table.update_room(conn, |_| {}).await?;
        return Ok(Departure::Left(Transition::default()));
    }

    if table.seated().count() <= 1 {
        let over = table.end_game(conn, GameOverReason::NotEnoughPlayers).await?;
        return Ok(Departure::Left(Transition::game_over(over)));
    }

    if was_theme_master {
        return reset_round(conn, table).await.map(Departure::Left);
    }

    if table.room.in_phase(RoundPhase::CardPlaying) {
        let mut played = table.room.played_cards();
        played.retain(|p| p.player_id != player_id);
        table.set_played_cards(conn, &played).await?;
        round::advance_if_all_played(conn, table).await?;
    } else {
        table.update_room(conn, |_| {}).await?;
    }
    Ok(Departure::Left(Transition::default()))
}

/// Restart the current round under a new theme master. Cards already on the table go back to
/// the hands they came from.
async fn reset_round<C: ConnectionTrait>(conn: &C, table: &mut Table) -> Result<Transition, AppError> {
    let next = table
        .seated()
        .find(|p| p.is_active)
        .or_else(|| table.seated().next())
        .map(|p| p.id)
        .ok_or_else(|| AppError::Conflict("Nobody can be theme master.".to_string()))?;

    let mut returned = Vec::new();
    for record in table.room.played_cards() {
        if table.member(record.player_id).is_ok() {
            CardPool::give(conn, record.player_id, &[record.card_id]).await?;
            returned.push(record.player_id);
        }
    }

    table.seat_theme_master(conn, next).await?;
    table.open_round(conn, table.room.current_round).await?;

    tracing::info!(room = %table.room.code, theme_master = %next, "Theme master left, round reset");
    Ok(Transition::hands_of(returned))
}

/// Ids of rooms with no committed activity since `cutoff`.
pub async fn expired_rooms<C: ConnectionTrait>(
    conn: &C,
    cutoff: chrono::DateTime<chrono::FixedOffset>,
) -> Result<Vec<Uuid>, AppError> {
    let rooms = room::Entity::find()
        .filter(room::Column::UpdatedAt.lt(cutoff))
        .all(conn)
        .await?;
    Ok(rooms.into_iter().map(|r| r.id).collect())
}
