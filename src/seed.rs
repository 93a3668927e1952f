//! Built-in topics and personalities, created at startup when missing.

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::{personality, topic};

struct DefaultTopic {
    title: &'static str,
    prompt: &'static str,
}

struct DefaultPersonality {
    title: &'static str,
    description: &'static str,
    template: &'static str,
}

const DEFAULT_TOPICS: &[DefaultTopic] = &[
    DefaultTopic {
        title: "Office Life",
        prompt: "Meetings, coworkers, bosses, printers and everything else that happens between 9 and 5.",
    },
    DefaultTopic {
        title: "Family Dinner",
        prompt: "Awkward relatives, holiday traditions and the things nobody says at the table.",
    },
    DefaultTopic {
        title: "Internet Culture",
        prompt: "Memes, influencers, comment sections, online dating and doomscrolling at 3am.",
    },
    DefaultTopic {
        title: "Space Travel",
        prompt: "Astronauts, aliens, broken spaceships and life on a colony far from Earth.",
    },
];

const DEFAULT_PERSONALITIES: &[DefaultPersonality] = &[
    DefaultPersonality {
        title: "Sarcastic Comedian",
        description: "Dry, ironic and a little mean.",
        template: "You are a sarcastic stand-up comedian writing cards for a party game. \
                   Keep every card short and punchy. Topic: {topic_prompt}",
    },
    DefaultPersonality {
        title: "Wholesome Grandma",
        description: "Sweet, nostalgic and accidentally hilarious.",
        template: "You are a sweet grandmother writing cards for a family party game. \
                   Keep every card short and kind. Topic: {topic_prompt}",
    },
    DefaultPersonality {
        title: "Absurdist Poet",
        description: "Surreal images and strange logic.",
        template: "You are an absurdist poet writing cards for a party game. \
                   Keep every card short, surreal and vivid. Topic: {topic_prompt}",
    },
];

/// Insert the default topics and personalities that do not exist yet. Returns how many rows
/// were created.
///
/// # Errors
///
/// Returns an error if the database cannot be queried or written.
pub async fn seed_defaults(db: &DatabaseConnection) -> anyhow::Result<usize> {
    let mut created = 0;

    for default in DEFAULT_TOPICS {
        let exists = topic::Entity::find()
            .filter(topic::Column::Title.eq(default.title))
            .filter(topic::Column::OwnerId.is_null())
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }

        topic::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(default.title.to_string()),
            prompt: Set(default.prompt.to_string()),
            is_public: Set(true),
            owner_id: Set(None),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(db)
        .await?;
        tracing::info!(title = default.title, "Seeded topic");
        created += 1;
    }

    for default in DEFAULT_PERSONALITIES {
        let exists = personality::Entity::find()
            .filter(personality::Column::Title.eq(default.title))
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }

        personality::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(default.title.to_string()),
            description: Set(default.description.to_string()),
            template_prompt: Set(default.template.to_string()),
        }
        .insert(db)
        .await?;
        tracing::info!(title = default.title, "Seeded personality");
        created += 1;
    }

    Ok(created)
}
