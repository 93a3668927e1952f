use sea_orm_migration::prelude::*;

/// Creates the `room` table: one row per game session snapshot.
///
/// `theme_master_id` has no foreign key: it is a player id resolved against the roster, and it is
/// cleared before the referenced player is removed.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[allow(clippy::enum_variant_names)]
#[derive(DeriveIden)]
enum Room {
    Table,
    Id,
    Code,
    GameState,
    RoundPhase,
    TopicId,
    PersonalityId,
    CurrentThemeCardId,
    ThemeMasterId,
    PlayedCards,
    RoundWinners,
    TotalRounds,
    CurrentRound,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Topic {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Personality {
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
                    .table(Room::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Room::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Room::Code)
                            .string_len(10)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Room::GameState)
                            .string_len(20)
                            .not_null()
                            .default("Lobby"),
                    )
                    .col(ColumnDef::new(Room::RoundPhase).string_len(20).null())
                    .col(ColumnDef::new(Room::TopicId).uuid().null())
                    .col(ColumnDef::new(Room::PersonalityId).uuid().null())
                    .col(ColumnDef::new(Room::CurrentThemeCardId).uuid().null())
                    .col(ColumnDef::new(Room::ThemeMasterId).uuid().null())
                    .col(ColumnDef::new(Room::PlayedCards).json().not_null())
                    .col(ColumnDef::new(Room::RoundWinners).json().not_null())
                    .col(
                        ColumnDef::new(Room::TotalRounds)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .col(
                        ColumnDef::new(Room::CurrentRound)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Room::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Room::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_room_topic_id")
                            .from(Room::Table, Room::TopicId)
                            .to(Topic::Table, Topic::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_room_personality_id")
                            .from(Room::Table, Room::PersonalityId)
                            .to(Personality::Table, Personality::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_room_current_theme_card_id")
                            .from(Room::Table, Room::CurrentThemeCardId)
                            .to(Card::Table, Card::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_room_updated_at")
                    .table(Room::Table)
                    .col(Room::UpdatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Room::Table).to_owned())
            .await
    }
}
