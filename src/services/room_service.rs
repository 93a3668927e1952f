use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::config::GameRules;
use crate::dto::{CardView, PlayerView, RoomSnapshot};
use crate::entities::{GameState, SeatStatus, card, personality, player, room, topic, user};
use crate::error::AppError;
use crate::utils::{generate_room_code, is_valid_room_code, normalize_room_code};

/// Maximum attempts to generate a unique room code
const MAX_CODE_GENERATION_ATTEMPTS: u32 = 20;

/// Outcome of a join request.
#[derive(Debug)]
pub struct Membership {
    pub player: player::Model,
    /// `true` when the user already had a seat in the room
    pub rejoined: bool,
}

pub struct RoomService;

impl RoomService {
    /// Create a room in Lobby with `host` as its only player.
    pub async fn create_room<C: ConnectionTrait>(
        conn: &C,
        host: &user::Model,
        topic_id: Option<Uuid>,
        personality_id: Option<Uuid>,
        total_rounds: Option<i32>,
        rules: &GameRules,
    ) -> Result<(room::Model, player::Model), AppError> {
        if let Some(topic_id) = topic_id {
            Self::visible_topic(conn, topic_id, host.id).await?;
        }
        if let Some(personality_id) = personality_id {
            Self::existing_personality(conn, personality_id).await?;
        }

        let code = Self::generate_unique_code(conn).await?;
        let now = Utc::now().fixed_offset();

        let new_room = room::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            game_state: Set(GameState::Lobby.as_str().to_string()),
            round_phase: Set(None),
            topic_id: Set(topic_id),
            personality_id: Set(personality_id),
            current_theme_card_id: Set(None),
            theme_master_id: Set(None),
            played_cards: Set(serde_json::json!([])),
            round_winners: Set(serde_json::json!([])),
            total_rounds: Set(rules.clamp_rounds(total_rounds.unwrap_or(rules.default_total_rounds))),
            current_round: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;

        let host_player = Self::insert_player(conn, &new_room, host, true, SeatStatus::Waiting, 1).await?;

        tracing::info!(room = %new_room.code, host = %host.username, "Room created");
        Ok((new_room, host_player))
    }

    /// Seat `user` in the room, or reactivate their existing seat.
    ///
    /// Callers hold the room lock.
    pub async fn join<C: ConnectionTrait>(
        conn: &C,
        target: &room::Model,
        user: &user::Model,
        rules: &GameRules,
    ) -> Result<Membership, AppError> {
        let existing = player::Entity::find()
            .filter(player::Column::RoomId.eq(target.id))
            .filter(player::Column::UserId.eq(user.id))
            .one(conn)
            .await?;

        if let Some(seat) = existing {
            let seat = if seat.is_active {
                seat
            } else {
                let mut active: player::ActiveModel = seat.into();
                active.is_active = Set(true);
                active.update(conn).await?
            };
            return Ok(Membership {
                player: seat,
                rejoined: true,
            });
        }

        let players = player::Entity::find()
            .filter(player::Column::RoomId.eq(target.id))
            .order_by_desc(player::Column::JoinOrder)
            .all(conn)
            .await?;

        if players.len() >= rules.max_players {
            return Err(AppError::Forbidden("Room is full.".to_string()));
        }

        let seat = if target.state().seats_new_players() {
            SeatStatus::Waiting
        } else {
            SeatStatus::Spectating
        };
        let join_order = players.first().map_or(1, |p| p.join_order + 1);

        let new_player = Self::insert_player(conn, target, user, false, seat, join_order).await?;
        tracing::info!(room = %target.code, player = %user.username, seat = %seat, "Player joined");

        Ok(Membership {
            player: new_player,
            rejoined: false,
        })
    }

    /// Look a room up by its code, in any letter case.
    pub async fn find_by_code<C: ConnectionTrait>(
        conn: &C,
        code: &str,
    ) -> Result<Option<room::Model>, DbErr> {
        let code = normalize_room_code(code);
        if !is_valid_room_code(&code) {
            return Ok(None);
        }

        room::Entity::find()
            .filter(room::Column::Code.eq(code))
            .one(conn)
            .await
    }

    /// The seat `user_id` holds in the room, if any.
    pub async fn membership<C: ConnectionTrait>(
        conn: &C,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<player::Model>, DbErr> {
        player::Entity::find()
            .filter(player::Column::RoomId.eq(room_id))
            .filter(player::Column::UserId.eq(user_id))
            .one(conn)
            .await
    }

    /// Topic by id, visible to `user_id` (public or owned).
    pub async fn visible_topic<C: ConnectionTrait>(
        conn: &C,
        topic_id: Uuid,
        user_id: Uuid,
    ) -> Result<topic::Model, AppError> {
        topic::Entity::find_by_id(topic_id)
            .one(conn)
            .await?
            .filter(|t| t.is_visible_to(user_id))
            .ok_or_else(|| AppError::BadRequest("Unknown topic.".to_string()))
    }

    pub async fn existing_personality<C: ConnectionTrait>(
        conn: &C,
        personality_id: Uuid,
    ) -> Result<personality::Model, AppError> {
        personality::Entity::find_by_id(personality_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::BadRequest("Unknown personality.".to_string()))
    }

    /// Everything a client needs to render the room.
    pub async fn load_snapshot<C: ConnectionTrait>(
        conn: &C,
        room_id: Uuid,
    ) -> Result<Option<RoomSnapshot>, DbErr> {
        let Some(current) = room::Entity::find_by_id(room_id).one(conn).await? else {
            return Ok(None);
        };

        let players = player::Entity::find()
            .filter(player::Column::RoomId.eq(room_id))
            .order_by_asc(player::Column::JoinOrder)
            .all(conn)
            .await?;

        let personality = match current.personality_id {
            Some(id) => personality::Entity::find_by_id(id).one(conn).await?,
            None => None,
        };

        let theme_card = match current.current_theme_card_id {
            Some(id) => card::Entity::find_by_id(id).one(conn).await?,
            None => None,
        };

        Ok(Some(RoomSnapshot {
            id: current.id,
            game_state: current.state(),
            round_phase: current.phase(),
            played_cards: current.played_cards(),
            round_winners: current.round_winners(),
            code: current.code,
            topic_id: current.topic_id,
            personality_id: current.personality_id,
            personality: personality.map(Into::into),
            theme_master_id: current.theme_master_id,
            current_theme_card: theme_card.map(CardView::from),
            players: players.iter().map(PlayerView::from).collect(),
            total_rounds: current.total_rounds,
            current_round: current.current_round,
        }))
    }

    async fn insert_player<C: ConnectionTrait>(
        conn: &C,
        target: &room::Model,
        user: &user::Model,
        is_host: bool,
        seat: SeatStatus,
        join_order: i32,
    ) -> Result<player::Model, DbErr> {
        player::ActiveModel {
            id: Set(Uuid::new_v4()),
            room_id: Set(target.id),
            user_id: Set(user.id),
            display_name: Set(user.username.clone()),
            score: Set(0),
            is_host: Set(is_host),
            seat: Set(seat.as_str().to_string()),
            is_active: Set(true),
            join_order: Set(join_order),
            joined_at: Set(Utc::now().fixed_offset()),
        }
        .insert(conn)
        .await
    }

    /// Generate a unique room code, with retry logic
    async fn generate_unique_code<C: ConnectionTrait>(conn: &C) -> Result<String, AppError> {
        for _ in 0..MAX_CODE_GENERATION_ATTEMPTS {
            let code = generate_room_code();

            let taken = room::Entity::find()
                .filter(room::Column::Code.eq(&code))
                .count(conn)
                .await?;

            if taken == 0 {
                return Ok(code);
            }
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "Failed to generate unique room code after {MAX_CODE_GENERATION_ATTEMPTS} attempts"
        )))
    }
}
