//! Set-difference queries over a topic's card pool, scoped to one room.

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, Query, SelectStatement};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::dto::HandEntryView;
use crate::entities::{CardKind, card, hand_entry, player, room_card_history};

pub struct CardPool;

impl CardPool {
    /// Append a batch of cards to a topic. Returns the inserted rows in input order.
    pub async fn insert_batch<C: ConnectionTrait>(
        conn: &C,
        topic_id: Uuid,
        kind: CardKind,
        texts: &[String],
    ) -> Result<Vec<card::Model>, DbErr> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let now = Utc::now().fixed_offset();
        let models: Vec<card::Model> = texts
            .iter()
            .map(|text| card::Model {
                id: Uuid::new_v4(),
                topic_id,
                kind: kind.as_str().to_string(),
                text: text.clone(),
                created_at: now,
            })
            .collect();

        let rows = models.iter().map(|m| card::ActiveModel {
            id: Set(m.id),
            topic_id: Set(m.topic_id),
            kind: Set(m.kind.clone()),
            text: Set(m.text.clone()),
            created_at: Set(m.created_at),
        });
        card::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;

        Ok(models)
    }

    /// Up to `count` random response cards of the topic that this room has never dealt and
    /// nobody holds. Fewer are returned only when the pool is that low.
    pub async fn draw_responses<C: ConnectionTrait>(
        conn: &C,
        room_id: Uuid,
        topic_id: Uuid,
        count: usize,
    ) -> Result<Vec<card::Model>, DbErr> {
        if count == 0 {
            return Ok(vec![]);
        }
        card::Entity::find()
            .filter(card::Column::TopicId.eq(topic_id))
            .filter(card::Column::Kind.eq(CardKind::Response.as_str()))
            .filter(card::Column::Id.not_in_subquery(Self::used_in_room(room_id)))
            .filter(card::Column::Id.not_in_subquery(Self::held_in_room(room_id)))
            .order_by(Expr::cust("RANDOM()"), Order::Asc)
            .limit(u64::try_from(count).unwrap_or(u64::MAX))
            .all(conn)
            .await
    }

    /// Number of cards of `kind` the room could still draw.
    pub async fn count_available<C: ConnectionTrait>(
        conn: &C,
        room_id: Uuid,
        topic_id: Uuid,
        kind: CardKind,
    ) -> Result<u64, DbErr> {
        let mut query = card::Entity::find()
            .filter(card::Column::TopicId.eq(topic_id))
            .filter(card::Column::Kind.eq(kind.as_str()))
            .filter(card::Column::Id.not_in_subquery(Self::used_in_room(room_id)));
        if kind == CardKind::Response {
            query = query.filter(card::Column::Id.not_in_subquery(Self::held_in_room(room_id)));
        }
        query.count(conn).await
    }

    /// Uniformly random theme card of the topic that the room has never used.
    pub async fn pick_unused_theme<C: ConnectionTrait>(
        conn: &C,
        room_id: Uuid,
        topic_id: Uuid,
    ) -> Result<Option<card::Model>, DbErr> {
        card::Entity::find()
            .filter(card::Column::TopicId.eq(topic_id))
            .filter(card::Column::Kind.eq(CardKind::Theme.as_str()))
            .filter(card::Column::Id.not_in_subquery(Self::used_in_room(room_id)))
            .order_by(Expr::cust("RANDOM()"), Order::Asc)
            .one(conn)
            .await
    }

    /// Remember that the room has used these cards.
    pub async fn record_history<C: ConnectionTrait>(
        conn: &C,
        room_id: Uuid,
        kind: CardKind,
        card_ids: &[Uuid],
    ) -> Result<(), DbErr> {
        if card_ids.is_empty() {
            return Ok(());
        }

        let now = Utc::now().fixed_offset();
        let rows = card_ids.iter().map(|card_id| room_card_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            room_id: Set(room_id),
            card_id: Set(*card_id),
            kind: Set(kind.as_str().to_string()),
            used_at: Set(now),
        });
        room_card_history::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    /// Put fresh cards into a player's hand and record them as dealt in the room.
    pub async fn deal<C: ConnectionTrait>(
        conn: &C,
        room_id: Uuid,
        player_id: Uuid,
        cards: &[card::Model],
    ) -> Result<(), DbErr> {
        let ids: Vec<Uuid> = cards.iter().map(|c| c.id).collect();
        Self::give(conn, player_id, &ids).await?;
        Self::record_history(conn, room_id, CardKind::Response, &ids).await
    }

    /// Put cards into a player's hand without touching the room history.
    pub async fn give<C: ConnectionTrait>(
        conn: &C,
        player_id: Uuid,
        card_ids: &[Uuid],
    ) -> Result<(), DbErr> {
        if card_ids.is_empty() {
            return Ok(());
        }

        let now = Utc::now().fixed_offset();
        let rows = card_ids.iter().map(|card_id| hand_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            player_id: Set(player_id),
            card_id: Set(*card_id),
            dealt_at: Set(now),
        });
        hand_entry::Entity::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    /// Empty the hands of the given players.
    pub async fn clear_hands<C: ConnectionTrait>(
        conn: &C,
        player_ids: &[Uuid],
    ) -> Result<(), DbErr> {
        if player_ids.is_empty() {
            return Ok(());
        }
        hand_entry::Entity::delete_many()
            .filter(hand_entry::Column::PlayerId.is_in(player_ids.iter().copied()))
            .exec(conn)
            .await?;
        Ok(())
    }

    /// A player's hand in deal order.
    pub async fn hand_of<C: ConnectionTrait>(
        conn: &C,
        player_id: Uuid,
    ) -> Result<Vec<HandEntryView>, DbErr> {
        let rows = hand_entry::Entity::find()
            .filter(hand_entry::Column::PlayerId.eq(player_id))
            .find_also_related(card::Entity)
            .order_by_asc(hand_entry::Column::DealtAt)
            .order_by_asc(hand_entry::Column::Id)
            .all(conn)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(entry, card)| {
                card.map(|c| HandEntryView {
                    id: entry.id,
                    card: c.into(),
                })
            })
            .collect())
    }

    /// Cards the room has dealt or put on the table.
    fn used_in_room(room_id: Uuid) -> SelectStatement {
        Query::select()
            .column(room_card_history::Column::CardId)
            .from(room_card_history::Entity)
            .and_where(room_card_history::Column::RoomId.eq(room_id))
            .to_owned()
    }

    /// Cards currently sitting in any hand of the room.
    fn held_in_room(room_id: Uuid) -> SelectStatement {
        Query::select()
            .column((hand_entry::Entity, hand_entry::Column::CardId))
            .from(hand_entry::Entity)
            .inner_join(
                player::Entity,
                Expr::col((player::Entity, player::Column::Id))
                    .equals((hand_entry::Entity, hand_entry::Column::PlayerId)),
            )
            .and_where(player::Column::RoomId.eq(room_id))
            .to_owned()
    }
}
