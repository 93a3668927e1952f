#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use http_body_util::BodyExt;
use migration::{Migrator, MigratorTrait};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use theme_master_api::auth::jwt::issue_access_token;
use theme_master_api::config::{Config, Environment, GameRules};
use theme_master_api::content::{BLANK, ContentProvider, GenerationRequest};
use theme_master_api::dto::CreateRoomRequest;
use theme_master_api::engine::RoundEngine;
use theme_master_api::engine::action::ClientAction;
use theme_master_api::entities::{CardKind, personality, topic, user};
use theme_master_api::sessions::SessionRegistry;
use theme_master_api::state::AppState;

pub const JWT_SECRET: &str = "test-secret-key-for-testing-only-32chars";

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        server_host: std::net::IpAddr::from([127, 0, 0, 1]),
        server_port: 0,
        environment: Environment::Development,
        log_level: "warn".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_access_expiration_secs: 900,
        frontend_url: "http://localhost:3001".to_string(),
        gemini_api_key: None,
        gemini_model: String::new(),
        rules: test_rules(),
    }
}

/// Default rules with top-ups off and no reconnect grace, so every effect is synchronous.
pub fn test_rules() -> GameRules {
    GameRules {
        top_up_threshold: 0,
        reconnect_grace: Duration::ZERO,
        ..GameRules::default()
    }
}

/// Deterministic card source: `"<kind> card <n>"`, themes carry the blank.
#[derive(Debug, Default)]
pub struct StubProvider {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ContentProvider for StubProvider {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<Vec<String>> {
        let batch = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..request.count)
            .map(|i| match request.kind {
                CardKind::Response => format!("Response card {batch}-{i}"),
                CardKind::Theme => format!("Theme card {batch}-{i} is {BLANK}"),
            })
            .collect())
    }
}

/// Provider that always fails, to exercise the placeholder fallback.
#[derive(Debug, Default)]
pub struct BrokenProvider;

#[async_trait]
impl ContentProvider for BrokenProvider {
    async fn generate(&self, _request: &GenerationRequest) -> anyhow::Result<Vec<String>> {
        Err(anyhow::anyhow!("model unavailable"))
    }
}

/// Collects the events a registered connection receives.
#[derive(Debug)]
pub struct Listener {
    rx: mpsc::UnboundedReceiver<String>,
}

impl Listener {
    /// Every event received so far, oldest first.
    pub fn drain(&mut self) -> Vec<Value> {
        let mut events = vec![];
        while let Ok(raw) = self.rx.try_recv() {
            events.push(serde_json::from_str(&raw).unwrap_or_default());
        }
        events
    }

    /// Drain, keeping only the events of one type.
    pub fn take(&mut self, event_type: &str) -> Vec<Value> {
        self.drain()
            .into_iter()
            .filter(|e| e["type"] == event_type)
            .collect()
    }

    /// Payload of the newest event of one type, or `Null`.
    pub fn last(&mut self, event_type: &str) -> Value {
        self.take(event_type)
            .pop()
            .map(|e| e["data"].clone())
            .unwrap_or_default()
    }

    /// `true` once the registry dropped this connection's sender.
    pub fn is_closed(&mut self) -> bool {
        matches!(
            self.rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        )
    }
}

/// A connected member of a test room.
#[derive(Debug)]
pub struct Member {
    pub user: user::Model,
    pub player_id: Uuid,
    pub connection_id: Uuid,
    pub listener: Listener,
}

#[derive(Debug)]
pub struct TestRoom {
    pub room_id: Uuid,
    pub code: String,
    pub members: Vec<Member>,
}

impl TestRoom {
    pub fn player_ids(&self) -> Vec<Uuid> {
        self.members.iter().map(|m| m.player_id).collect()
    }

    pub fn member(&self, player_id: Uuid) -> Option<&Member> {
        self.members.iter().find(|m| m.player_id == player_id)
    }

    pub fn member_mut(&mut self, player_id: Uuid) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.player_id == player_id)
    }

    /// Discard everything received so far.
    pub fn clear_events(&mut self) {
        for member in &mut self.members {
            member.listener.drain();
        }
    }
}

pub struct TestEnv {
    pub db: DatabaseConnection,
    pub engine: RoundEngine,
    pub config: Config,
    pub topic: topic::Model,
    pub personality: personality::Model,
}

pub async fn test_env() -> anyhow::Result<TestEnv> {
    test_env_with(test_rules(), Arc::new(StubProvider::default())).await
}

/// Fresh in-memory database, migrated, with one public topic and one personality.
pub async fn test_env_with(
    rules: GameRules,
    provider: Arc<dyn ContentProvider>,
) -> anyhow::Result<TestEnv> {
    let db = sea_orm::Database::connect("sqlite::memory:")
        .await
        .unwrap_or_default();
    Migrator::up(&db, None).await.unwrap_or_default();

    let topic = topic::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Office Life".to_string()),
        prompt: Set("Meetings and printers".to_string()),
        is_public: Set(true),
        owner_id: Set(None),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(&db)
    .await?;

    let personality = personality::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Narrator".to_string()),
        description: Set("Plain".to_string()),
        template_prompt: Set("Write cards about {topic_prompt}".to_string()),
    }
    .insert(&db)
    .await?;

    let mut config = test_config();
    config.rules = rules.clone();
    let engine = RoundEngine::new(db.clone(), SessionRegistry::new(), provider, rules);

    Ok(TestEnv {
        db,
        engine,
        config,
        topic,
        personality,
    })
}

impl TestEnv {
    pub async fn user(&self, username: &str) -> anyhow::Result<user::Model> {
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(&self.db)
        .await?;
        Ok(created)
    }

    pub fn token(&self, user: &user::Model) -> String {
        issue_access_token(user.id, &self.config).unwrap_or_default()
    }

    pub fn app(&self) -> Router {
        let state = AppState {
            db: self.db.clone(),
            config: self.config.clone(),
            engine: self.engine.clone(),
        };
        theme_master_api::routes::router().with_state(state)
    }

    /// Room with topic and personality set; the first name hosts, everyone is connected.
    pub async fn room(&self, names: &[&str]) -> anyhow::Result<TestRoom> {
        let request = CreateRoomRequest {
            topic_id: Some(self.topic.id),
            personality_id: Some(self.personality.id),
            total_rounds: None,
        };

        let mut room_id = Uuid::nil();
        let mut code = String::new();
        let mut members = vec![];

        for (i, name) in names.iter().enumerate() {
            let user = self.user(name).await?;
            let membership = if i == 0 {
                self.engine.create_room(&user, &request).await
            } else {
                self.engine.join_room(&code, &user).await
            }
            .map_err(|e| anyhow::anyhow!("{name} could not take a seat: {}", e.client_message()))?;
            room_id = membership.room.id;
            code.clone_from(&membership.room.code);

            let (listener, connection_id) = self.connect(room_id, membership.player_id).await;
            members.push(Member {
                user,
                player_id: membership.player_id,
                connection_id,
                listener,
            });
        }

        let mut room = TestRoom {
            room_id,
            code,
            members,
        };
        room.clear_events();
        Ok(room)
    }

    pub async fn connect(&self, room_id: Uuid, player_id: Uuid) -> (Listener, Uuid) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = self.engine.connect(room_id, player_id, tx).await;
        (Listener { rx }, connection_id)
    }

    pub async fn act(&self, room: &TestRoom, player_id: Uuid, action: ClientAction) {
        self.engine.handle(room.room_id, player_id, action).await;
    }

    /// Room with a started game; the host is theme master.
    pub async fn started(&self, names: &[&str]) -> anyhow::Result<TestRoom> {
        let mut room = self.room(names).await?;
        let host = room.members[0].player_id;
        self.act(&room, host, ClientAction::StartGame).await;
        room.clear_events();
        Ok(room)
    }

    /// Current committed snapshot as JSON, `Null` once the room is gone.
    pub async fn snapshot(&self, room_id: Uuid) -> Value {
        theme_master_api::services::RoomService::load_snapshot(&self.db, room_id)
            .await
            .ok()
            .flatten()
            .and_then(|s| serde_json::to_value(s).ok())
            .unwrap_or_default()
    }

    pub async fn hand(&self, player_id: Uuid) -> Vec<Uuid> {
        theme_master_api::services::CardPool::hand_of(&self.db, player_id)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.id)
            .collect()
    }
}

pub fn uuid_of(value: &Value) -> Uuid {
    value.as_str().and_then(|s| s.parse().ok()).unwrap_or_default()
}

pub fn player_json(snapshot: &Value, player_id: Uuid) -> Value {
    snapshot["players"]
        .as_array()
        .and_then(|players| {
            players
                .iter()
                .find(|p| uuid_of(&p["id"]) == player_id)
                .cloned()
        })
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap_or_default();

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .unwrap_or_default();
    let body_str = String::from_utf8(body.to_vec()).unwrap_or_default();

    (status, body_str)
}

/// Test helper: send a GET request to the app and return (status, body).
pub async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap_or_default();
    send(app, request).await
}

pub async fn get_with_auth(app: &Router, uri: &str, token: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap_or_default();
    send(app, request).await
}

pub async fn post_json_with_auth(
    app: &Router,
    uri: &str,
    body: &Value,
    token: &str,
) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap_or_default();
    send(app, request).await
}

pub async fn post_with_auth(app: &Router, uri: &str, token: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap_or_default();
    send(app, request).await
}
