use sea_orm_migration::prelude::*;

/// Creates the `hand_entry` table: one row per card currently held by a player.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum HandEntry {
    Table,
    Id,
    PlayerId,
    CardId,
    DealtAt,
}

#[derive(DeriveIden)]
enum Player {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Card {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(HandEntry::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HandEntry::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HandEntry::PlayerId).uuid().not_null())
                    .col(ColumnDef::new(HandEntry::CardId).uuid().not_null())
                    .col(
                        ColumnDef::new(HandEntry::DealtAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_hand_entry_player_id")
                            .from(HandEntry::Table, HandEntry::PlayerId)
                            .to(Player::Table, Player::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_hand_entry_card_id")
                            .from(HandEntry::Table, HandEntry::CardId)
                            .to(Card::Table, Card::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_hand_entry_player_id")
                    .table(HandEntry::Table)
                    .col(HandEntry::PlayerId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(HandEntry::Table).to_owned())
            .await
    }
}
