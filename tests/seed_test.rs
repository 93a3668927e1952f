mod common;

use sea_orm::{EntityTrait, PaginatorTrait};

use theme_master_api::entities::{personality, topic};
use theme_master_api::seed::seed_defaults;

use common::test_env;

#[tokio::test]
async fn seeding_is_idempotent() -> anyhow::Result<()> {
    let env = test_env().await?;
    let topics_before = topic::Entity::find().count(&env.db).await?;

    let first = seed_defaults(&env.db).await?;
    let second = seed_defaults(&env.db).await?;

    assert_eq!(first, 7);
    assert_eq!(second, 0);
    assert_eq!(topic::Entity::find().count(&env.db).await?, topics_before + 4);

    let templates = personality::Entity::find().all(&env.db).await?;
    assert!(templates.iter().all(|p| p.template_prompt.contains("{topic_prompt}")));
    Ok(())
}
