use sea_orm_migration::prelude::*;

/// Creates the `personality` table: the comedic voice used when generating cards.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Personality {
    Table,
    Id,
    Title,
    Description,
    TemplatePrompt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Personality::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Personality::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Personality::Title)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Personality::Description).text().not_null())
                    .col(ColumnDef::new(Personality::TemplatePrompt).text().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Personality::Table).to_owned())
            .await
    }
}
