use sea_orm_migration::prelude::*;

/// Creates the `player` table: a user's seat in one room.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Player {
    Table,
    Id,
    RoomId,
    UserId,
    DisplayName,
    Score,
    IsHost,
    Seat,
    IsActive,
    JoinOrder,
    JoinedAt,
}

#[derive(DeriveIden)]
enum Room {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum User {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Player::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Player::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Player::RoomId).uuid().not_null())
                    .col(ColumnDef::new(Player::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Player::DisplayName)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Player::Score)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Player::IsHost)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Player::Seat)
                            .string_len(20)
                            .not_null()
                            .default("waiting"),
                    )
                    .col(
                        ColumnDef::new(Player::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Player::JoinOrder).integer().not_null())
                    .col(
                        ColumnDef::new(Player::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_player_room_id")
                            .from(Player::Table, Player::RoomId)
                            .to(Room::Table, Room::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_player_user_id")
                            .from(Player::Table, Player::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One seat per user per room
        manager
            .create_index(
                Index::create()
                    .name("idx_player_room_user")
                    .table(Player::Table)
                    .col(Player::RoomId)
                    .col(Player::UserId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Player::Table).to_owned())
            .await
    }
}
