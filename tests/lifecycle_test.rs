mod common;

use std::sync::Arc;

use sea_orm::{EntityTrait, PaginatorTrait};
use theme_master_api::config::GameRules;
use theme_master_api::dto::CreateRoomRequest;
use theme_master_api::engine::action::{ClientAction, GameSettings};
use theme_master_api::entities::card;
use uuid::Uuid;

use common::{
    BrokenProvider, StubProvider, player_json, test_env, test_env_with, test_rules, uuid_of,
};

#[tokio::test]
async fn start_game_deals_opening_hands_and_seats_host_as_theme_master() -> anyhow::Result<()> {
    let env = test_env().await?;
    let mut room = env.room(&["host", "ana", "ben", "cy"]).await?;
    let host = room.members[0].player_id;

    env.act(&room, host, ClientAction::StartGame).await;

    let snapshot = env.snapshot(room.room_id).await;
    assert_eq!(snapshot["game_state"], "InGame");
    assert_eq!(snapshot["round_phase"], "ThemeSelection");
    assert_eq!(snapshot["current_round"], 1);
    assert_eq!(uuid_of(&snapshot["theme_master_id"]), host);
    assert_eq!(player_json(&snapshot, host)["is_theme_master"], true);

    for member in &mut room.members {
        assert_eq!(env.hand(member.player_id).await.len(), 7);

        let states: Vec<String> = member
            .listener
            .take("game_state_update")
            .iter()
            .map(|e| e["data"]["game_state"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(states, vec!["Generating", "InGame"]);
    }

    Ok(())
}

#[tokio::test]
async fn hand_update_follows_the_snapshot_and_goes_to_its_owner_only() -> anyhow::Result<()> {
    let env = test_env().await?;
    let mut room = env.room(&["host", "ana", "ben"]).await?;
    let host = room.members[0].player_id;

    env.act(&room, host, ClientAction::StartGame).await;

    for member in &mut room.members {
        let events = member.listener.drain();
        let kinds: Vec<&str> = events.iter().filter_map(|e| e["type"].as_str()).collect();
        assert_eq!(
            kinds,
            vec!["game_state_update", "game_state_update", "player_hand_update"]
        );

        let own = env.hand(member.player_id).await;
        let sent: Vec<Uuid> = events[2]["data"]
            .as_array()
            .map(|cards| cards.iter().map(|c| uuid_of(&c["id"])).collect())
            .unwrap_or_default();
        assert_eq!(sent.len(), 7);
        assert!(sent.iter().all(|id| own.contains(id)));
    }
    Ok(())
}

#[tokio::test]
async fn only_the_host_can_start() -> anyhow::Result<()> {
    let env = test_env().await?;
    let mut room = env.room(&["host", "ana", "ben"]).await?;
    let ana = room.members[1].player_id;

    env.act(&room, ana, ClientAction::StartGame).await;

    assert_eq!(env.snapshot(room.room_id).await["game_state"], "Lobby");
    // Authorization failures are silent
    assert!(room.members[1].listener.drain().is_empty());
    Ok(())
}

#[tokio::test]
async fn starting_with_too_few_players_reports_to_the_host() -> anyhow::Result<()> {
    let env = test_env().await?;
    let mut room = env.room(&["host", "ana"]).await?;
    let host = room.members[0].player_id;

    env.act(&room, host, ClientAction::StartGame).await;

    let snapshot = env.snapshot(room.room_id).await;
    assert_eq!(snapshot["game_state"], "Lobby");
    assert!(snapshot["round_phase"].is_null());

    let error = room.members[0].listener.last("error");
    assert!(
        error["message"]
            .as_str()
            .unwrap_or_default()
            .contains("At least 3 players")
    );
    assert!(room.members[1].listener.take("error").is_empty());
    Ok(())
}

#[tokio::test]
async fn starting_without_a_topic_is_rejected() -> anyhow::Result<()> {
    let env = test_env().await?;
    let host = env.user("host").await?;
    let created = env
        .engine
        .create_room(&host, &CreateRoomRequest::default())
        .await
        .map_err(|e| anyhow::anyhow!(e.client_message()))?;
    for name in ["ana", "ben"] {
        let user = env.user(name).await?;
        env.engine
            .join_room(&created.room.code, &user)
            .await
            .map_err(|e| anyhow::anyhow!(e.client_message()))?;
    }
    let (mut listener, _) = env.connect(created.room.id, created.player_id).await;
    listener.drain();

    env.engine
        .handle(created.room.id, created.player_id, ClientAction::StartGame)
        .await;

    assert_eq!(env.snapshot(created.room.id).await["game_state"], "Lobby");
    assert!(!listener.last("error").is_null());
    Ok(())
}

#[tokio::test]
async fn host_updates_settings_in_the_lobby() -> anyhow::Result<()> {
    let env = test_env().await?;
    let mut room = env.room(&["host", "ana"]).await?;
    let (host, ana) = (room.members[0].player_id, room.members[1].player_id);

    let settings = GameSettings {
        topic_id: env.topic.id,
        personality_id: env.personality.id,
        total_rounds: Some(500),
    };

    env.act(&room, ana, ClientAction::SetGameSettings(GameSettings {
        total_rounds: Some(4),
        ..settings.clone()
    }))
    .await;
    assert_eq!(env.snapshot(room.room_id).await["total_rounds"], 10);

    env.act(&room, host, ClientAction::SetGameSettings(settings)).await;
    let snapshot = env.snapshot(room.room_id).await;
    assert_eq!(snapshot["total_rounds"], 50);
    assert_eq!(uuid_of(&snapshot["topic_id"]), env.topic.id);
    assert_eq!(snapshot["personality"]["title"], "Narrator");

    // Everyone sees the change
    assert_eq!(room.members[1].listener.last("game_state_update")["total_rounds"], 50);
    Ok(())
}

#[tokio::test]
async fn settings_with_unknown_topic_report_an_error() -> anyhow::Result<()> {
    let env = test_env().await?;
    let mut room = env.room(&["host", "ana"]).await?;
    let host = room.members[0].player_id;

    env.act(&room, host, ClientAction::SetGameSettings(GameSettings {
        topic_id: Uuid::new_v4(),
        personality_id: env.personality.id,
        total_rounds: None,
    }))
    .await;

    assert_eq!(uuid_of(&env.snapshot(room.room_id).await["topic_id"]), env.topic.id);
    assert!(!room.members[0].listener.last("error").is_null());
    Ok(())
}

#[tokio::test]
async fn failing_provider_still_starts_with_placeholders() -> anyhow::Result<()> {
    let env = test_env_with(test_rules(), Arc::new(BrokenProvider)).await?;
    let mut room = env.room(&["host", "ana", "ben"]).await?;
    let host = room.members[0].player_id;

    env.act(&room, host, ClientAction::StartGame).await;

    assert_eq!(env.snapshot(room.room_id).await["game_state"], "InGame");
    let hand = room.members[0].listener.last("player_hand_update");
    let texts: Vec<&str> = hand
        .as_array()
        .map(|cards| cards.iter().filter_map(|c| c["card"]["text"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(texts.len(), 7);
    assert!(texts.iter().all(|t| t.contains("AI unavailable")));
    Ok(())
}

#[tokio::test]
async fn failed_deal_puts_the_room_back_in_the_lobby() -> anyhow::Result<()> {
    // Five responses cannot fill three opening hands
    let rules = GameRules {
        response_batch_size: 5,
        ..test_rules()
    };
    let env = test_env_with(rules, Arc::new(StubProvider::default())).await?;
    let mut room = env.room(&["host", "ana", "ben"]).await?;
    let host = room.members[0].player_id;

    env.act(&room, host, ClientAction::StartGame).await;

    let snapshot = env.snapshot(room.room_id).await;
    assert_eq!(snapshot["game_state"], "Lobby");
    assert!(snapshot["round_phase"].is_null());
    assert!(snapshot["theme_master_id"].is_null());
    assert_eq!(card::Entity::find().count(&env.db).await?, 0);
    for id in room.player_ids() {
        assert!(env.hand(id).await.is_empty());
    }

    assert!(!room.members[0].listener.last("error").is_null());
    for member in &mut room.members[1..] {
        assert!(member.listener.take("error").is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn start_game_twice_is_ignored_once_in_game() -> anyhow::Result<()> {
    let env = test_env().await?;
    let room = env.started(&["host", "ana", "ben"]).await?;
    let host = room.members[0].player_id;
    let before = env.hand(host).await;

    env.act(&room, host, ClientAction::StartGame).await;

    let snapshot = env.snapshot(room.room_id).await;
    assert_eq!(snapshot["game_state"], "InGame");
    assert_eq!(snapshot["current_round"], 1);
    assert_eq!(env.hand(host).await, before);
    Ok(())
}
