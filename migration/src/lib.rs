pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_user_table;
mod m20261001_000002_create_topic_table;
mod m20261001_000003_create_personality_table;
mod m20261001_000004_create_card_table;
mod m20261001_000005_create_room_table;
mod m20261001_000006_create_player_table;
mod m20261001_000007_create_hand_entry_table;
mod m20261001_000008_create_room_card_history_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_user_table::Migration),
            Box::new(m20261001_000002_create_topic_table::Migration),
            Box::new(m20261001_000003_create_personality_table::Migration),
            Box::new(m20261001_000004_create_card_table::Migration),
            Box::new(m20261001_000005_create_room_table::Migration),
            Box::new(m20261001_000006_create_player_table::Migration),
            Box::new(m20261001_000007_create_hand_entry_table::Migration),
            Box::new(m20261001_000008_create_room_card_history_table::Migration),
        ]
    }
}
