use sea_orm_migration::prelude::*;

/// Creates the `card` table holding generated theme and response cards.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Card {
    Table,
    Id,
    TopicId,
    Kind,
    Text,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Topic {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Card::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Card::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Card::TopicId).uuid().not_null())
                    .col(ColumnDef::new(Card::Kind).string_len(20).not_null())
                    .col(ColumnDef::new(Card::Text).text().not_null())
                    .col(
                        ColumnDef::new(Card::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_card_topic_id")
                            .from(Card::Table, Card::TopicId)
                            .to(Topic::Table, Topic::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_card_topic_kind")
                    .table(Card::Table)
                    .col(Card::TopicId)
                    .col(Card::Kind)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Card::Table).to_owned())
            .await
    }
}
