//! The round engine: the only component that changes game state.
//!
//! Every accepted action runs as lock → transaction → rule → commit → publish, so broadcasts
//! only ever show committed snapshots and two actions on the same room never interleave.

pub mod action;
pub mod departure;
pub mod events;
pub mod lifecycle;
pub mod locks;
mod replenish;
pub mod round;
pub mod table;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use sea_orm::ActiveValue::Set;
use sea_orm::{DatabaseConnection, EntityTrait, TransactionTrait};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::config::GameRules;
use crate::content::{ContentProvider, generate_or_placeholder};
use crate::dto::{CreateRoomRequest, MembershipResponse};
use crate::entities::{room, user};
use crate::error::AppError;
use crate::services::{CardPool, RoomService};
use crate::sessions::{SessionRegistry, WsTx};

use action::{ClientAction, Decoded};
use departure::Departure;
use events::{HandRefresh, ROOM_CLOSED_MESSAGE, ServerEvent, Transition};
use lifecycle::PendingGeneration;
use locks::RoomLocks;
use table::Table;

#[derive(Debug, Clone)]
pub struct RoundEngine {
    db: DatabaseConnection,
    sessions: SessionRegistry,
    locks: RoomLocks,
    content: Arc<dyn ContentProvider>,
    rules: Arc<GameRules>,
    /// Rooms with a background top-up in flight
    top_ups: Arc<DashMap<Uuid, ()>>,
    /// `player_id` → connection whose close started the player's grace period
    departures: Arc<DashMap<Uuid, Uuid>>,
}

impl RoundEngine {
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        sessions: SessionRegistry,
        content: Arc<dyn ContentProvider>,
        rules: GameRules,
    ) -> Self {
        Self {
            db,
            sessions,
            locks: RoomLocks::new(),
            content,
            rules: Arc::new(rules),
            top_ups: Arc::new(DashMap::new()),
            departures: Arc::new(DashMap::new()),
        }
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    #[must_use]
    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Membership
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a room hosted by `host`.
    ///
    /// # Errors
    ///
    /// `BadRequest` for an unknown topic or personality, `Internal` on database failure.
    pub async fn create_room(
        &self,
        host: &user::Model,
        request: &CreateRoomRequest,
    ) -> Result<MembershipResponse, AppError> {
        let txn = self.db.begin().await?;
        let (created, host_player) = RoomService::create_room(
            &txn,
            host,
            request.topic_id,
            request.personality_id,
            request.total_rounds,
            &self.rules,
        )
        .await?;
        txn.commit().await?;

        self.membership_response(created.id, host_player.id).await
    }

    /// Join a room by code, or reactivate an existing seat.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown code, `Forbidden` when the room is full.
    pub async fn join_room(
        &self,
        code: &str,
        joiner: &user::Model,
    ) -> Result<MembershipResponse, AppError> {
        let target = RoomService::find_by_code(&self.db, code)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found.".to_string()))?;

        let player_id = {
            let _guard = self.locks.acquire(target.id).await;
            let txn = self.db.begin().await?;
            let mut table = Table::require(&txn, target.id).await?;
            let membership = RoomService::join(&txn, &table.room, joiner, &self.rules).await?;
            table.update_room(&txn, |_| {}).await?;
            txn.commit().await?;

            if !membership.rejoined {
                tracing::info!(room = %table.room.code, player = %membership.player.id, "Seat taken");
            }
            self.publish(target.id, &Transition::default()).await;
            membership.player.id
        };

        self.membership_response(target.id, player_id).await
    }

    async fn membership_response(
        &self,
        room_id: Uuid,
        player_id: Uuid,
    ) -> Result<MembershipResponse, AppError> {
        let snapshot = RoomService::load_snapshot(&self.db, room_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found.".to_string()))?;
        Ok(MembershipResponse {
            player_id,
            room: snapshot,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connections
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a live connection and send the current state to it. Returns the connection id.
    pub async fn connect(&self, room_id: Uuid, player_id: Uuid, tx: WsTx) -> Uuid {
        let connection_id = self.sessions.register(room_id, player_id, tx);
        self.departures.remove(&player_id);

        let _guard = self.locks.acquire(room_id).await;
        if let Err(e) = self.set_active(room_id, player_id, true).await {
            self.settle(room_id, player_id, "connect", Err(e));
        }
        self.publish(room_id, &Transition::default()).await;
        self.push_hand(room_id, player_id).await;

        tracing::info!(%room_id, %player_id, "Player connected");
        connection_id
    }

    /// Handle a closed connection. The player's seat is released once their last connection
    /// is gone and the reconnect grace period has passed.
    pub async fn disconnect(&self, room_id: Uuid, player_id: Uuid, connection_id: Uuid) {
        if self.sessions.unregister(room_id, player_id, connection_id) > 0 {
            return;
        }

        let grace = self.rules.reconnect_grace;
        if grace.is_zero() {
            self.release_seat(room_id, player_id).await;
            return;
        }

        self.departures.insert(player_id, connection_id);
        {
            let _guard = self.locks.acquire(room_id).await;
            // A new tab may have registered after the unregister above
            if self.sessions.is_player_connected(room_id, player_id) {
                self.departures
                    .remove_if(&player_id, |_, conn| *conn == connection_id);
                return;
            }
            match self.set_active(room_id, player_id, false).await {
                Ok(true) => self.publish(room_id, &Transition::default()).await,
                Ok(false) => {}
                Err(e) => self.settle(room_id, player_id, "disconnect", Err(e)),
            }
        }
        tracing::info!(%room_id, %player_id, grace_secs = grace.as_secs(), "Player disconnected");

        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let expired = engine
                .departures
                .remove_if(&player_id, |_, conn| *conn == connection_id)
                .is_some();
            if expired {
                engine.release_seat(room_id, player_id).await;
            }
        });
    }

    /// Returns `true` when the flag changed. Callers hold the room lock.
    async fn set_active(&self, room_id: Uuid, player_id: Uuid, active: bool) -> Result<bool, AppError> {
        let txn = self.db.begin().await?;
        let Some(mut table) = Table::load(&txn, room_id).await? else {
            return Ok(false);
        };
        if table.member(player_id)?.is_active == active {
            return Ok(false);
        }
        table
            .update_player(&txn, player_id, |p| p.is_active = Set(active))
            .await?;
        txn.commit().await?;
        Ok(true)
    }

    /// Remove a player from a room now, repairing host and theme master roles.
    pub async fn remove_player(&self, room_id: Uuid, player_id: Uuid) {
        let guard = self.locks.acquire(room_id).await;
        self.leave(room_id, player_id, guard).await;
    }

    /// Remove a player whose connections are all closed. Checked under the room lock, so a
    /// reconnect that registered in the meantime keeps the seat.
    async fn release_seat(&self, room_id: Uuid, player_id: Uuid) {
        let guard = self.locks.acquire(room_id).await;
        if self.sessions.is_player_connected(room_id, player_id) {
            return;
        }
        self.leave(room_id, player_id, guard).await;
    }

    async fn leave(&self, room_id: Uuid, player_id: Uuid, guard: OwnedMutexGuard<()>) {
        let result = async {
            let txn = self.db.begin().await?;
            let Some(mut table) = Table::load(&txn, room_id).await? else {
                return Ok(Departure::Gone);
            };
            let departure = departure::remove_player(&txn, &mut table, player_id).await?;
            txn.commit().await?;
            Ok::<_, AppError>(departure)
        }
        .await;

        match result {
            Ok(Departure::Gone) => {}
            Ok(Departure::RoomDeleted) => {
                drop(guard);
                self.close_room(room_id);
            }
            Ok(Departure::Left(transition)) => self.publish(room_id, &transition).await,
            Err(e) => self.settle(room_id, player_id, "leave", Err(e)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Actions
    // ─────────────────────────────────────────────────────────────────────────

    /// Decode one inbound frame and apply it.
    pub async fn dispatch(&self, room_id: Uuid, player_id: Uuid, raw: &str) {
        match ClientAction::decode(raw) {
            Decoded::Action(action) => self.handle(room_id, player_id, action).await,
            Decoded::Unknown(name) => {
                tracing::warn!(%room_id, %player_id, action = %name, "Unknown action ignored");
            }
            Decoded::Malformed(message) => {
                tracing::warn!(%room_id, %player_id, reason = %message, "Malformed message");
                self.notify_player(room_id, player_id, &ServerEvent::error(message));
            }
        }
    }

    pub async fn handle(&self, room_id: Uuid, player_id: Uuid, action: ClientAction) {
        if action == ClientAction::StartGame {
            self.begin_game(room_id, player_id).await;
            return;
        }
        let result = self.apply(room_id, player_id, &action).await;
        self.settle(room_id, player_id, action.name(), result);
    }

    async fn apply(&self, room_id: Uuid, player_id: Uuid, action: &ClientAction) -> Result<(), AppError> {
        let _guard = self.locks.acquire(room_id).await;
        let txn = self.db.begin().await?;
        let mut table = Table::require(&txn, room_id).await?;

        let transition = match action {
            ClientAction::SetGameSettings(settings) => {
                lifecycle::update_settings(&txn, &mut table, player_id, settings, &self.rules).await?
            }
            ClientAction::ChooseThemeCard => round::choose_theme(&txn, &mut table, player_id).await?,
            ClientAction::SubmitCustomTheme { text } => {
                round::submit_custom_theme(&txn, &mut table, player_id, text).await?
            }
            ClientAction::PlayCard { hand_entry_id } => {
                round::play_card(&txn, &mut table, player_id, *hand_entry_id).await?
            }
            ClientAction::SelectWinners { winner_ids } => {
                round::select_winners(&txn, &mut table, player_id, winner_ids, &self.rules).await?
            }
            ClientAction::StartNextRound => {
                round::start_next_round(&txn, &mut table, player_id, &self.rules).await?
            }
            ClientAction::StartGame => return Ok(()),
        };

        txn.commit().await?;
        tracing::info!(
            room = %table.room.code,
            %player_id,
            action = action.name(),
            state = %table.room.state(),
            phase = ?table.room.phase(),
            "Action applied"
        );
        self.publish(room_id, &transition).await;
        Ok(())
    }

    /// Start a game: validate and mark `Generating` under the lock, generate both batches
    /// without it, then deal under the lock again. Any failure after the first step puts the
    /// room back in the lobby and tells the initiator.
    async fn begin_game(&self, room_id: Uuid, player_id: Uuid) {
        let pending = match self.prepare_start(room_id, player_id).await {
            Ok(pending) => pending,
            Err(e) => {
                self.settle(room_id, player_id, "start_game", Err(e));
                return;
            }
        };

        let (responses, themes) = tokio::join!(
            generate_or_placeholder(self.content.as_ref(), &pending.responses),
            generate_or_placeholder(self.content.as_ref(), &pending.themes),
        );

        if let Err(e) = self.finish_start(room_id, &pending, &responses, &themes).await {
            let message = if e.is_validation() {
                e.client_message()
            } else {
                "The game could not be started. Please try again.".to_string()
            };
            match &e {
                AppError::Internal(err) => {
                    tracing::error!(%room_id, %player_id, error = %format!("{err:#}"), "Game start failed");
                }
                other => {
                    tracing::warn!(%room_id, %player_id, reason = %other.client_message(), "Game start aborted");
                }
            }
            self.abort_start(room_id).await;
            self.notify_player(room_id, player_id, &ServerEvent::error(message));
        }
    }

    async fn prepare_start(&self, room_id: Uuid, player_id: Uuid) -> Result<PendingGeneration, AppError> {
        let _guard = self.locks.acquire(room_id).await;
        let txn = self.db.begin().await?;
        let mut table = Table::require(&txn, room_id).await?;
        let pending = lifecycle::prepare_start(&txn, &mut table, player_id, &self.rules).await?;
        txn.commit().await?;

        tracing::info!(room = %table.room.code, "Generating cards");
        self.publish(room_id, &Transition::default()).await;
        Ok(pending)
    }

    async fn finish_start(
        &self,
        room_id: Uuid,
        pending: &PendingGeneration,
        responses: &[String],
        themes: &[String],
    ) -> Result<(), AppError> {
        let _guard = self.locks.acquire(room_id).await;
        let txn = self.db.begin().await?;
        let mut table = Table::require(&txn, room_id).await?;
        let transition =
            lifecycle::deal_new_game(&txn, &mut table, pending, responses, themes, &self.rules)
                .await?;
        txn.commit().await?;
        self.publish(room_id, &transition).await;
        Ok(())
    }

    async fn abort_start(&self, room_id: Uuid) {
        let _guard = self.locks.acquire(room_id).await;
        let result = async {
            let txn = self.db.begin().await?;
            let Some(mut table) = Table::load(&txn, room_id).await? else {
                return Ok(false);
            };
            let restored = lifecycle::abort_start(&txn, &mut table).await?;
            txn.commit().await?;
            Ok::<_, AppError>(restored)
        }
        .await;

        match result {
            Ok(true) => self.publish(room_id, &Transition::default()).await,
            Ok(false) => {}
            Err(e) => tracing::error!(%room_id, error = ?e, "Could not restore the lobby"),
        }
    }

    /// Log or report a rejected action. Nothing was committed.
    fn settle(&self, room_id: Uuid, player_id: Uuid, action: &str, result: Result<(), AppError>) {
        let Err(e) = result else {
            return;
        };
        match e {
            AppError::Forbidden(reason) => {
                tracing::warn!(%room_id, %player_id, action, %reason, "Action not allowed");
            }
            AppError::Internal(err) => {
                tracing::error!(%room_id, %player_id, action, error = %format!("{err:#}"), "Action rolled back");
            }
            e if e.is_validation() => {
                tracing::info!(%room_id, %player_id, action, reason = %e.client_message(), "Action rejected");
                self.notify_player(room_id, player_id, &ServerEvent::error(e.client_message()));
            }
            e => {
                tracing::warn!(%room_id, %player_id, action, reason = %e.client_message(), "Action ignored");
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Publishing
    // ─────────────────────────────────────────────────────────────────────────

    /// Broadcast the committed snapshot, then any game-over notice, then private hands.
    async fn publish(&self, room_id: Uuid, transition: &Transition) {
        match RoomService::load_snapshot(&self.db, room_id).await {
            Ok(Some(snapshot)) => {
                let everyone: Vec<Uuid> = snapshot.players.iter().map(|p| p.id).collect();
                self.sessions
                    .broadcast(room_id, &ServerEvent::GameStateUpdate(snapshot).to_json());

                if let Some(over) = &transition.game_over {
                    self.sessions
                        .broadcast(room_id, &ServerEvent::GameOver(over.clone()).to_json());
                }

                let targets = match &transition.hands {
                    HandRefresh::None => vec![],
                    HandRefresh::Players(ids) => ids.clone(),
                    HandRefresh::All => everyone,
                };
                for player_id in targets {
                    self.push_hand(room_id, player_id).await;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::error!(%room_id, error = %e, "Could not load room snapshot"),
        }

        if transition.check_pool {
            self.spawn_top_up(room_id);
        }
    }

    async fn push_hand(&self, room_id: Uuid, player_id: Uuid) {
        match CardPool::hand_of(&self.db, player_id).await {
            Ok(hand) => self.notify_player(
                room_id,
                player_id,
                &ServerEvent::PlayerHandUpdate(hand),
            ),
            Err(e) => tracing::error!(%room_id, %player_id, error = %e, "Could not load hand"),
        }
    }

    fn notify_player(&self, room_id: Uuid, player_id: Uuid, event: &ServerEvent) {
        self.sessions.send_to_player(room_id, player_id, &event.to_json());
    }

    /// Tell everyone the room is gone and drop their connections.
    fn close_room(&self, room_id: Uuid) {
        let closed = ServerEvent::RoomClosed {
            message: ROOM_CLOSED_MESSAGE.to_string(),
        };
        self.sessions.broadcast(room_id, &closed.to_json());
        self.sessions.close_room(room_id);
        self.locks.forget(room_id);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expiry
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete rooms idle for longer than the configured expiration. Returns how many went.
    pub async fn sweep_expired(&self) -> usize {
        let age = chrono::Duration::from_std(self.rules.room_expiration)
            .unwrap_or_else(|_| chrono::Duration::hours(3));
        let cutoff = Utc::now().fixed_offset() - age;

        let candidates = match departure::expired_rooms(&self.db, cutoff).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = ?e, "Could not list expired rooms");
                return 0;
            }
        };

        let mut swept = 0;
        for room_id in candidates {
            let guard = self.locks.acquire(room_id).await;
            let result = async {
                let txn = self.db.begin().await?;
                let still_expired = room::Entity::find_by_id(room_id)
                    .one(&txn)
                    .await?
                    .is_some_and(|r| r.updated_at < cutoff);
                if still_expired {
                    room::Entity::delete_by_id(room_id).exec(&txn).await?;
                    txn.commit().await?;
                }
                Ok::<_, AppError>(still_expired)
            }
            .await;

            match result {
                Ok(true) => {
                    drop(guard);
                    self.close_room(room_id);
                    swept += 1;
                    tracing::info!(%room_id, "Expired room deleted");
                }
                Ok(false) => {}
                Err(e) => tracing::error!(%room_id, error = ?e, "Could not delete expired room"),
            }
        }
        swept
    }

    /// Run [`RoundEngine::sweep_expired`] forever at the configured interval.
    pub async fn run_sweeper(self) {
        let period = self.rules.sweep_interval.max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            let swept = self.sweep_expired().await;
            if swept > 0 {
                tracing::info!(swept, "Room sweep finished");
            }
        }
    }
}
