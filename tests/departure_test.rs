mod common;

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use theme_master_api::config::GameRules;
use theme_master_api::engine::action::ClientAction;
use theme_master_api::entities::player;
use theme_master_api::error::AppError;

use common::{StubProvider, player_json, test_env, test_env_with, test_rules, uuid_of};

async fn player_rows(env: &common::TestEnv, room_id: Uuid) -> u64 {
    player::Entity::find()
        .filter(player::Column::RoomId.eq(room_id))
        .count(&env.db)
        .await
        .unwrap_or_default()
}

#[tokio::test]
async fn joining_twice_keeps_one_seat_and_one_hand() -> anyhow::Result<()> {
    let env = test_env().await?;
    let room = env.started(&["host", "ana", "ben"]).await?;
    let ana = &room.members[1];
    let hand_before = env.hand(ana.player_id).await;

    for _ in 0..2 {
        let again = env
            .engine
            .join_room(&room.code.to_lowercase(), &ana.user)
            .await
            .map_err(|e| anyhow::anyhow!(e.client_message()))?;
        assert_eq!(again.player_id, ana.player_id);
    }

    assert_eq!(player_rows(&env, room.room_id).await, 3);
    assert_eq!(env.hand(ana.player_id).await, hand_before);
    Ok(())
}

#[tokio::test]
async fn full_room_rejects_new_players() -> anyhow::Result<()> {
    let rules = GameRules {
        max_players: 3,
        ..test_rules()
    };
    let env = test_env_with(rules, Arc::new(StubProvider::default())).await?;
    let room = env.room(&["host", "ana", "ben"]).await?;

    let late = env.user("late").await?;
    let result = env.engine.join_room(&room.code, &late).await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert_eq!(player_rows(&env, room.room_id).await, 3);
    Ok(())
}

#[tokio::test]
async fn unknown_room_code_is_not_found() -> anyhow::Result<()> {
    let env = test_env().await?;
    let user = env.user("ana").await?;

    let result = env.engine.join_room("ZZZZZZ", &user).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn host_leaving_the_lobby_promotes_the_next_player() -> anyhow::Result<()> {
    let env = test_env().await?;
    let mut room = env.room(&["host", "ana", "ben"]).await?;
    let host = &room.members[0];
    let ana = room.members[1].player_id;

    env.engine
        .disconnect(room.room_id, host.player_id, host.connection_id)
        .await;

    let snapshot = env.snapshot(room.room_id).await;
    assert_eq!(snapshot["players"].as_array().map(Vec::len), Some(2));
    assert_eq!(player_json(&snapshot, ana)["is_host"], true);
    assert_eq!(
        room.members[2].listener.last("game_state_update")["players"]
            .as_array()
            .map(Vec::len),
        Some(2)
    );
    Ok(())
}

#[tokio::test]
async fn last_player_leaving_deletes_the_room() -> anyhow::Result<()> {
    let env = test_env().await?;
    let mut room = env.room(&["host", "ana"]).await?;
    let (host, ana) = (room.members[0].player_id, &room.members[1]);

    env.engine
        .disconnect(room.room_id, ana.player_id, ana.connection_id)
        .await;
    assert_eq!(player_rows(&env, room.room_id).await, 1);
    room.clear_events();

    // The grace period of the host runs out while the socket is still registered
    env.engine.remove_player(room.room_id, host).await;

    assert!(env.snapshot(room.room_id).await.is_null());
    let closed = room.members[0].listener.last("room_closed");
    assert!(closed["message"].is_string());
    assert!(room.members[0].listener.is_closed());
    assert_eq!(env.engine.sessions().connected_players(room.room_id), 0);
    Ok(())
}

#[tokio::test]
async fn theme_master_leaving_mid_round_resets_the_round() -> anyhow::Result<()> {
    let env = test_env().await?;
    let room = env.started(&["host", "ana", "ben", "cy"]).await?;
    let ids = room.player_ids();
    let (host, ana, ben) = (ids[0], ids[1], ids[2]);

    env.act(&room, host, ClientAction::ChooseThemeCard).await;
    let ana_card = env.hand(ana).await[0];
    env.act(&room, ana, ClientAction::PlayCard { hand_entry_id: ana_card })
        .await;
    assert_eq!(env.hand(ana).await.len(), 6);

    let leaver = &room.members[0];
    env.engine
        .disconnect(room.room_id, leaver.player_id, leaver.connection_id)
        .await;

    let snapshot = env.snapshot(room.room_id).await;
    assert_eq!(snapshot["game_state"], "InGame");
    assert_eq!(snapshot["round_phase"], "ThemeSelection");
    assert_eq!(snapshot["current_round"], 1);
    assert_eq!(theme_master_of(&snapshot), Some(ana));
    assert!(snapshot["current_theme_card"].is_null());
    assert_eq!(snapshot["played_cards"], serde_json::json!([]));
    assert_eq!(player_json(&snapshot, ana)["is_host"], true);
    assert_eq!(player_json(&snapshot, ben)["seat"], "waiting");
    // The played card went back to its owner
    assert_eq!(env.hand(ana).await.len(), 7);
    Ok(())
}

fn theme_master_of(snapshot: &serde_json::Value) -> Option<Uuid> {
    snapshot["theme_master_id"].as_str().and_then(|s| s.parse().ok())
}

#[tokio::test]
async fn leaver_who_was_awaited_moves_the_round_to_voting() -> anyhow::Result<()> {
    let env = test_env().await?;
    let room = env.started(&["host", "ana", "ben", "cy"]).await?;
    let ids = room.player_ids();
    let (host, ana, ben) = (ids[0], ids[1], ids[2]);

    env.act(&room, host, ClientAction::ChooseThemeCard).await;
    for id in [ana, ben] {
        let card = env.hand(id).await[0];
        env.act(&room, id, ClientAction::PlayCard { hand_entry_id: card })
            .await;
    }

    let cy = &room.members[3];
    env.engine
        .disconnect(room.room_id, cy.player_id, cy.connection_id)
        .await;

    let snapshot = env.snapshot(room.room_id).await;
    assert_eq!(snapshot["round_phase"], "Voting");
    assert_eq!(snapshot["played_cards"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn game_ends_when_too_few_players_remain() -> anyhow::Result<()> {
    let env = test_env().await?;
    let mut room = env.started(&["host", "ana", "ben"]).await?;

    for member in &room.members[1..] {
        env.engine
            .disconnect(room.room_id, member.player_id, member.connection_id)
            .await;
    }

    let snapshot = env.snapshot(room.room_id).await;
    assert_eq!(snapshot["game_state"], "Lobby");
    assert!(snapshot["round_phase"].is_null());
    let over = room.members[0].listener.last("game_over");
    assert_eq!(over["reason"], "not_enough_players");
    Ok(())
}

#[tokio::test]
async fn second_tab_keeps_the_seat() -> anyhow::Result<()> {
    let env = test_env().await?;
    let room = env.room(&["host", "ana", "ben"]).await?;
    let ana = &room.members[1];

    let (_second, _) = env.connect(room.room_id, ana.player_id).await;
    env.engine
        .disconnect(room.room_id, ana.player_id, ana.connection_id)
        .await;

    let snapshot = env.snapshot(room.room_id).await;
    assert_eq!(player_json(&snapshot, ana.player_id)["is_active"], true);
    assert_eq!(player_rows(&env, room.room_id).await, 3);
    Ok(())
}

#[tokio::test]
async fn reconnecting_within_the_grace_period_keeps_the_seat() -> anyhow::Result<()> {
    let rules = GameRules {
        reconnect_grace: Duration::from_millis(100),
        ..test_rules()
    };
    let env = test_env_with(rules, Arc::new(StubProvider::default())).await?;
    let room = env.started(&["host", "ana", "ben"]).await?;
    let ana = &room.members[1];
    let hand = env.hand(ana.player_id).await;

    env.engine
        .disconnect(room.room_id, ana.player_id, ana.connection_id)
        .await;
    let snapshot = env.snapshot(room.room_id).await;
    assert_eq!(player_json(&snapshot, ana.player_id)["is_active"], false);

    let (mut back, _) = env.connect(room.room_id, ana.player_id).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let snapshot = env.snapshot(room.room_id).await;
    assert_eq!(player_json(&snapshot, ana.player_id)["is_active"], true);
    assert_eq!(env.hand(ana.player_id).await, hand);

    // The new connection got the state and then its hand
    let events = back.drain();
    assert_eq!(events[0]["type"], "game_state_update");
    assert_eq!(events[1]["type"], "player_hand_update");
    Ok(())
}

#[tokio::test]
async fn seat_is_released_after_the_grace_period() -> anyhow::Result<()> {
    let rules = GameRules {
        reconnect_grace: Duration::from_millis(50),
        ..test_rules()
    };
    let env = test_env_with(rules, Arc::new(StubProvider::default())).await?;
    let room = env.room(&["host", "ana", "ben"]).await?;
    let ana = &room.members[1];

    env.engine
        .disconnect(room.room_id, ana.player_id, ana.connection_id)
        .await;
    assert_eq!(player_rows(&env, room.room_id).await, 3);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(player_rows(&env, room.room_id).await, 2);
    let snapshot = env.snapshot(room.room_id).await;
    assert!(player_json(&snapshot, ana.player_id).is_null());
    assert_eq!(uuid_of(&snapshot["players"][0]["id"]), room.members[0].player_id);
    Ok(())
}

#[tokio::test]
async fn sweep_deletes_idle_rooms_and_closes_their_connections() -> anyhow::Result<()> {
    let rules = GameRules {
        room_expiration: Duration::ZERO,
        ..test_rules()
    };
    let env = test_env_with(rules, Arc::new(StubProvider::default())).await?;
    let mut room = env.room(&["host", "ana"]).await?;

    tokio::time::sleep(Duration::from_millis(10)).await;
    let swept = env.engine.sweep_expired().await;

    assert_eq!(swept, 1);
    assert!(env.snapshot(room.room_id).await.is_null());
    for member in &mut room.members {
        assert!(!member.listener.last("room_closed").is_null());
    }
    Ok(())
}

#[tokio::test]
async fn sweep_keeps_active_rooms() -> anyhow::Result<()> {
    let env = test_env().await?;
    let room = env.room(&["host", "ana"]).await?;

    assert_eq!(env.engine.sweep_expired().await, 0);
    assert!(!env.snapshot(room.room_id).await.is_null());
    Ok(())
}
