//! Background top-up of a room's card pool.

use sea_orm::EntityTrait;
use uuid::Uuid;

use super::RoundEngine;
use crate::content::{GenerationRequest, generate_or_placeholder};
use crate::entities::{CardKind, personality, room, topic};
use crate::services::CardPool;

impl RoundEngine {
    /// Start a top-up for the room unless one is already running.
    pub(super) fn spawn_top_up(&self, room_id: Uuid) {
        if self.top_ups.insert(room_id, ()).is_some() {
            return;
        }

        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.top_up(room_id).await {
                tracing::error!(%room_id, error = %format!("{e:#}"), "Card top-up failed");
            }
            engine.top_ups.remove(&room_id);
        });
    }

    /// Generate another batch of every card kind that is running low for this room.
    ///
    /// Runs without the room lock; cards are append-only.
    async fn top_up(&self, room_id: Uuid) -> anyhow::Result<()> {
        let Some(current) = room::Entity::find_by_id(room_id).one(&self.db).await? else {
            return Ok(());
        };
        let (Some(topic_id), Some(personality_id)) = (current.topic_id, current.personality_id)
        else {
            return Ok(());
        };
        let (Some(topic), Some(style)) = (
            topic::Entity::find_by_id(topic_id).one(&self.db).await?,
            personality::Entity::find_by_id(personality_id)
                .one(&self.db)
                .await?,
        ) else {
            return Ok(());
        };

        let threshold = u64::try_from(self.rules.top_up_threshold).unwrap_or(u64::MAX);
        for kind in [CardKind::Response, CardKind::Theme] {
            let left = CardPool::count_available(&self.db, room_id, topic_id, kind).await?;
            if left >= threshold {
                continue;
            }

            let request = GenerationRequest {
                topic_prompt: topic.prompt.clone(),
                style_prompt: style.template_prompt.clone(),
                kind,
                count: self.rules.top_up_batch_size,
            };
            let texts = generate_or_placeholder(self.content.as_ref(), &request).await;
            let added = CardPool::insert_batch(&self.db, topic_id, kind, &texts).await?;
            tracing::info!(room = %current.code, %kind, left, added = added.len(), "Card pool topped up");
        }
        Ok(())
    }
}
