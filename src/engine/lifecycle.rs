//! Lobby settings and the two locked halves of starting a game.

use sea_orm::ActiveValue::Set;
use sea_orm::ConnectionTrait;
use uuid::Uuid;

use super::action::GameSettings;
use super::events::{HandRefresh, Transition};
use super::table::Table;
use crate::config::GameRules;
use crate::content::GenerationRequest;
use crate::entities::{CardKind, GameState, SeatStatus};
use crate::error::AppError;
use crate::services::{CardPool, RoomService};

/// Pick topic, personality and round count while in the lobby.
pub async fn update_settings<C: ConnectionTrait>(
    conn: &C,
    table: &mut Table,
    actor: Uuid,
    settings: &GameSettings,
    rules: &GameRules,
) -> Result<Transition, AppError> {
    let host = table.require_host(actor)?.clone();
    if table.room.state() != GameState::Lobby {
        return Err(AppError::Forbidden("Settings can only change in the lobby.".to_string()));
    }

    RoomService::visible_topic(conn, settings.topic_id, host.user_id).await?;
    RoomService::existing_personality(conn, settings.personality_id).await?;
    let total_rounds = settings
        .total_rounds
        .map_or(table.room.total_rounds, |n| rules.clamp_rounds(n));

    table
        .update_room(conn, |r| {
            r.topic_id = Set(Some(settings.topic_id));
            r.personality_id = Set(Some(settings.personality_id));
            r.total_rounds = Set(total_rounds);
        })
        .await?;
    Ok(Transition::default())
}

/// The two batches to generate once a start is accepted.
#[derive(Debug, Clone)]
pub struct PendingGeneration {
    pub topic_id: Uuid,
    pub responses: GenerationRequest,
    pub themes: GenerationRequest,
}

/// Validate a start request and mark the room `Generating`.
pub async fn prepare_start<C: ConnectionTrait>(
    conn: &C,
    table: &mut Table,
    actor: Uuid,
    rules: &GameRules,
) -> Result<PendingGeneration, AppError> {
    let host_user = table.require_host(actor)?.user_id;
    if table.room.state() != GameState::Lobby {
        return Err(AppError::Forbidden("The game has already started.".to_string()));
    }

    let (Some(topic_id), Some(personality_id)) = (table.room.topic_id, table.room.personality_id)
    else {
        return Err(AppError::BadRequest(
            "Choose a topic and a personality before starting.".to_string(),
        ));
    };
    ensure_enough_players(table, rules)?;

    let topic = RoomService::visible_topic(conn, topic_id, host_user).await?;
    let personality = RoomService::existing_personality(conn, personality_id).await?;

    table
        .update_room(conn, |r| {
            r.game_state = Set(GameState::Generating.as_str().to_string());
            r.round_phase = Set(None);
        })
        .await?;

    let request = |kind, count| GenerationRequest {
        topic_prompt: topic.prompt.clone(),
        style_prompt: personality.template_prompt.clone(),
        kind,
        count,
    };
    Ok(PendingGeneration {
        topic_id,
        responses: request(CardKind::Response, rules.response_batch_size),
        themes: request(CardKind::Theme, rules.theme_batch_size),
    })
}

/// Store the generated cards, reset the room and deal the opening hands. The host opens as
/// theme master.
pub async fn deal_new_game<C: ConnectionTrait>(
    conn: &C,
    table: &mut Table,
    pending: &PendingGeneration,
    responses: &[String],
    themes: &[String],
    rules: &GameRules,
) -> Result<Transition, AppError> {
    if table.room.state() != GameState::Generating {
        return Err(AppError::Conflict("The room is no longer generating cards.".to_string()));
    }
    ensure_enough_players(table, rules)?;

    CardPool::insert_batch(conn, pending.topic_id, CardKind::Response, responses).await?;
    CardPool::insert_batch(conn, pending.topic_id, CardKind::Theme, themes).await?;

    let everyone: Vec<Uuid> = table.players.iter().map(|p| p.id).collect();
    CardPool::clear_hands(conn, &everyone).await?;
    for id in &everyone {
        table
            .update_player(conn, *id, |p| {
                p.score = Set(0);
                p.seat = Set(SeatStatus::Waiting.as_str().to_string());
            })
            .await?;
    }

    let dealt_to: Vec<Uuid> = table.seated().map(|p| p.id).collect();
    let needed = dealt_to.len() * rules.initial_hand_size;
    let available =
        CardPool::draw_responses(conn, table.room.id, pending.topic_id, needed).await?;
    if available.len() < needed {
        return Err(AppError::BadRequest(
            "Not enough response cards to deal the opening hands.".to_string(),
        ));
    }

    let mut deck = available.into_iter();
    for id in &dealt_to {
        let hand: Vec<_> = deck.by_ref().take(rules.initial_hand_size).collect();
        CardPool::deal(conn, table.room.id, *id, &hand).await?;
    }

    let host = table.players.iter().find(|p| p.is_host).map(|p| p.id);
    let theme_master = host
        .filter(|id| dealt_to.contains(id))
        .or_else(|| dealt_to.first().copied())
        .ok_or_else(|| AppError::Conflict("Nobody can be theme master.".to_string()))?;

    table.seat_theme_master(conn, theme_master).await?;
    table.open_round(conn, 1).await?;

    tracing::info!(
        room = %table.room.code,
        players = dealt_to.len(),
        theme_master = %theme_master,
        "Game started"
    );
    Ok(Transition {
        hands: HandRefresh::All,
        ..Transition::default()
    })
}

/// Put a room stuck in `Generating` back into the lobby.
pub async fn abort_start<C: ConnectionTrait>(conn: &C, table: &mut Table) -> Result<bool, AppError> {
    if table.room.state() != GameState::Generating {
        return Ok(false);
    }
    table
        .update_room(conn, |r| {
            r.game_state = Set(GameState::Lobby.as_str().to_string());
            r.round_phase = Set(None);
        })
        .await?;
    Ok(true)
}

fn ensure_enough_players(table: &Table, rules: &GameRules) -> Result<(), AppError> {
    let ready = table.seated().filter(|p| p.is_active).count();
    if ready < rules.min_players {
        return Err(AppError::BadRequest(format!(
            "At least {} players are needed to start.",
            rules.min_players
        )));
    }
    Ok(())
}
