//! Round lifecycle: `ThemeSelection → CardPlaying → Voting → RoundOver → ThemeSelection`.

use std::collections::HashSet;

use sea_orm::ActiveValue::Set;
use sea_orm::{ConnectionTrait, EntityTrait, ModelTrait};
use uuid::Uuid;

use super::events::{GameOverReason, Transition};
use super::table::Table;
use crate::config::GameRules;
use crate::content::BLANK;
use crate::entities::room::PlayedCard;
use crate::entities::{CardKind, RoundPhase, SeatStatus, card, hand_entry};
use crate::error::AppError;
use crate::services::CardPool;

const CUSTOM_THEME_MIN_CHARS: usize = 10;
const CUSTOM_THEME_MAX_CHARS: usize = 280;

/// Trim a custom theme and check it: strictly between 10 and 280 characters, with a blank.
pub fn validate_custom_theme(text: &str) -> Result<String, AppError> {
    let text = text.trim();
    let len = text.chars().count();
    if len <= CUSTOM_THEME_MIN_CHARS || len >= CUSTOM_THEME_MAX_CHARS {
        return Err(AppError::BadRequest(format!(
            "A custom theme must be longer than {CUSTOM_THEME_MIN_CHARS} and shorter than {CUSTOM_THEME_MAX_CHARS} characters."
        )));
    }
    if !text.contains(BLANK) {
        return Err(AppError::BadRequest(format!(
            "A custom theme must contain the blank {BLANK}."
        )));
    }
    Ok(text.to_string())
}

/// Draw a random theme card the room has never used.
pub async fn choose_theme<C: ConnectionTrait>(
    conn: &C,
    table: &mut Table,
    actor: Uuid,
) -> Result<Transition, AppError> {
    table.require_theme_master(actor, RoundPhase::ThemeSelection)?;
    let topic_id = topic_of(table)?;

    match CardPool::pick_unused_theme(conn, table.room.id, topic_id).await? {
        Some(theme) => {
            CardPool::record_history(conn, table.room.id, CardKind::Theme, &[theme.id]).await?;
            open_card_playing(conn, table, theme.id).await?;
            Ok(Transition {
                check_pool: true,
                ..Transition::default()
            })
        }
        None => Ok(Transition::game_over(
            table.end_game(conn, GameOverReason::OutOfThemeCards).await?,
        )),
    }
}

/// Use a theme written by the theme master instead of drawing one.
pub async fn submit_custom_theme<C: ConnectionTrait>(
    conn: &C,
    table: &mut Table,
    actor: Uuid,
    text: &str,
) -> Result<Transition, AppError> {
    table.require_theme_master(actor, RoundPhase::ThemeSelection)?;
    let text = validate_custom_theme(text)?;
    let topic_id = topic_of(table)?;

    let inserted = CardPool::insert_batch(conn, topic_id, CardKind::Theme, &[text]).await?;
    let theme_ids: Vec<Uuid> = inserted.iter().map(|c| c.id).collect();
    CardPool::record_history(conn, table.room.id, CardKind::Theme, &theme_ids).await?;

    if let Some(theme_id) = theme_ids.first() {
        open_card_playing(conn, table, *theme_id).await?;
    }
    Ok(Transition::default())
}

/// Put a card from the actor's hand on the table.
pub async fn play_card<C: ConnectionTrait>(
    conn: &C,
    table: &mut Table,
    actor: Uuid,
    hand_entry_id: Uuid,
) -> Result<Transition, AppError> {
    let player = table.member(actor)?.clone();
    table.require_phase(RoundPhase::CardPlaying)?;
    if player.seat() != SeatStatus::Waiting {
        return Err(AppError::Forbidden(format!(
            "A player who is {} cannot play a card.",
            player.seat()
        )));
    }

    let (entry, played_card) = hand_entry::Entity::find_by_id(hand_entry_id)
        .find_also_related(card::Entity)
        .one(conn)
        .await?
        .filter(|(entry, _)| entry.player_id == actor)
        .and_then(|(entry, c)| c.map(|c| (entry, c)))
        .ok_or_else(|| AppError::BadRequest("That card is not in your hand.".to_string()))?;

    let mut played = table.room.played_cards();
    played.push(PlayedCard {
        player_id: actor,
        player_name: player.display_name.clone(),
        card_id: played_card.id,
        card_text: played_card.text,
    });
    table.set_played_cards(conn, &played).await?;
    entry.delete(conn).await?;
    table.set_seat(conn, actor, SeatStatus::Played).await?;

    advance_if_all_played(conn, table).await?;
    Ok(Transition::hands_of(vec![actor]))
}

/// Go to `Voting` once nobody is left to play.
pub async fn advance_if_all_played<C: ConnectionTrait>(
    conn: &C,
    table: &mut Table,
) -> Result<(), AppError> {
    if !table.room.in_phase(RoundPhase::CardPlaying) {
        return Ok(());
    }
    let waiting = table.with_seat(SeatStatus::Waiting).count();
    let played = table.with_seat(SeatStatus::Played).count();
    if waiting == 0 && played > 0 {
        table
            .update_room(conn, |r| {
                r.round_phase = Set(Some(RoundPhase::Voting.as_str().to_string()));
            })
            .await?;
        tracing::info!(room = %table.room.code, played, "All cards are in, voting starts");
    }
    Ok(())
}

/// Rank the played cards and award points.
pub async fn select_winners<C: ConnectionTrait>(
    conn: &C,
    table: &mut Table,
    actor: Uuid,
    winner_ids: &[Uuid],
    rules: &GameRules,
) -> Result<Transition, AppError> {
    table.require_theme_master(actor, RoundPhase::Voting)?;

    let contenders: HashSet<Uuid> = table
        .room
        .played_cards()
        .iter()
        .map(|p| p.player_id)
        .filter(|id| *id != actor && table.member(*id).is_ok())
        .collect();

    let mut seen = HashSet::new();
    let winners: Vec<Uuid> = winner_ids
        .iter()
        .copied()
        .filter(|id| contenders.contains(id) && seen.insert(*id))
        .collect();

    if winners.is_empty() {
        return Err(AppError::BadRequest(
            "Pick at least one player who played a card this round.".to_string(),
        ));
    }

    for (rank, winner) in winners.iter().enumerate() {
        let points = rules.points_for_rank(rank);
        if points == 0 {
            continue;
        }
        let score = table.member(*winner)?.score + points;
        table
            .update_player(conn, *winner, |p| p.score = Set(score))
            .await?;
    }

    let value = serde_json::to_value(&winners)?;
    table
        .update_room(conn, |r| {
            r.round_winners = Set(value);
            r.round_phase = Set(Some(RoundPhase::RoundOver.as_str().to_string()));
        })
        .await?;
    Ok(Transition::default())
}

/// Refill hands, seat spectators, rotate the theme master and open the next round.
pub async fn start_next_round<C: ConnectionTrait>(
    conn: &C,
    table: &mut Table,
    actor: Uuid,
    rules: &GameRules,
) -> Result<Transition, AppError> {
    table.require_theme_master(actor, RoundPhase::RoundOver)?;

    if table.room.current_round >= table.room.total_rounds {
        return Ok(Transition::game_over(
            table.end_game(conn, GameOverReason::RoundsCompleted).await?,
        ));
    }

    let topic_id = topic_of(table)?;
    let newcomers: Vec<Uuid> = table.with_seat(SeatStatus::Spectating).map(|p| p.id).collect();
    let players_who_played: Vec<Uuid> = table.with_seat(SeatStatus::Played).map(|p| p.id).collect();
    let needed = newcomers.len() * rules.initial_hand_size + players_who_played.len();

    let available = CardPool::draw_responses(conn, table.room.id, topic_id, needed).await?;
    if available.len() < needed {
        return Ok(Transition::game_over(
            table.end_game(conn, GameOverReason::OutOfResponseCards).await?,
        ));
    }

    let mut deck = available.into_iter();
    for id in &newcomers {
        let cards: Vec<card::Model> = deck.by_ref().take(rules.initial_hand_size).collect();
        CardPool::deal(conn, table.room.id, *id, &cards).await?;
        table.set_seat(conn, *id, SeatStatus::Waiting).await?;
    }
    for id in &players_who_played {
        let cards: Vec<card::Model> = deck.by_ref().take(1).collect();
        CardPool::deal(conn, table.room.id, *id, &cards).await?;
    }

    let next = next_theme_master(table, table.room.theme_master_id)
        .ok_or_else(|| AppError::Conflict("Nobody can be theme master.".to_string()))?;
    table.seat_theme_master(conn, next).await?;
    table.open_round(conn, table.room.current_round + 1).await?;

    tracing::info!(
        room = %table.room.code,
        round = table.room.current_round,
        theme_master = %next,
        promoted = newcomers.len(),
        "Next round"
    );

    let mut refreshed = newcomers;
    refreshed.extend(players_who_played);
    Ok(Transition {
        check_pool: true,
        ..Transition::hands_of(refreshed)
    })
}

/// The first active seated player after `current` in join order, wrapping around.
pub fn next_theme_master(table: &Table, current: Option<Uuid>) -> Option<Uuid> {
    let candidates: Vec<_> = table.seated().filter(|p| p.is_active).collect();
    let after = current
        .and_then(|id| table.players.iter().find(|p| p.id == id))
        .map(|p| p.join_order);

    after
        .and_then(|order| candidates.iter().find(|p| p.join_order > order))
        .or_else(|| candidates.first())
        .map(|p| p.id)
}

async fn open_card_playing<C: ConnectionTrait>(
    conn: &C,
    table: &mut Table,
    theme_id: Uuid,
) -> Result<(), AppError> {
    table
        .update_room(conn, |r| {
            r.current_theme_card_id = Set(Some(theme_id));
            r.round_phase = Set(Some(RoundPhase::CardPlaying.as_str().to_string()));
        })
        .await?;
    tracing::info!(room = %table.room.code, theme = %theme_id, "Theme chosen");
    Ok(())
}

fn topic_of(table: &Table) -> Result<Uuid, AppError> {
    table
        .room
        .topic_id
        .ok_or_else(|| AppError::Conflict("The room has no topic.".to_string()))
}
