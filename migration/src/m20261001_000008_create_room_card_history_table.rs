use sea_orm_migration::prelude::*;

/// Creates the `room_card_history` table: every card a room has dealt or put on the table.
///
/// The room row only keeps the current theme card, so this is what prevents repeats.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum RoomCardHistory {
    Table,
    Id,
    RoomId,
    CardId,
    Kind,
    UsedAt,
}

#[derive(DeriveIden)]
enum Room {
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
                    .table(RoomCardHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoomCardHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RoomCardHistory::RoomId).uuid().not_null())
                    .col(ColumnDef::new(RoomCardHistory::CardId).uuid().not_null())
                    .col(
                        ColumnDef::new(RoomCardHistory::Kind)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RoomCardHistory::UsedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_room_card_history_room_id")
                            .from(RoomCardHistory::Table, RoomCardHistory::RoomId)
                            .to(Room::Table, Room::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_room_card_history_card_id")
                            .from(RoomCardHistory::Table, RoomCardHistory::CardId)
                            .to(Card::Table, Card::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_room_card_history_room_card")
                    .table(RoomCardHistory::Table)
                    .col(RoomCardHistory::RoomId)
                    .col(RoomCardHistory::CardId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RoomCardHistory::Table).to_owned())
            .await
    }
}
