use sea_orm_migration::prelude::*;

/// Creates the `topic` table. Cards are scoped to a topic.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Topic {
    Table,
    Id,
    Title,
    Prompt,
    IsPublic,
    OwnerId,
    CreatedAt,
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
                    .table(Topic::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Topic::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Topic::Title).string_len(100).not_null())
                    .col(ColumnDef::new(Topic::Prompt).text().not_null())
                    .col(
                        ColumnDef::new(Topic::IsPublic)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Topic::OwnerId).uuid().null())
                    .col(
                        ColumnDef::new(Topic::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_topic_owner_id")
                            .from(Topic::Table, Topic::OwnerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_topic_title")
                    .table(Topic::Table)
                    .col(Topic::Title)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Topic::Table).to_owned())
            .await
    }
}
