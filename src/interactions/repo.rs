use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait InteractionRepo: Send + Sync {
    /// Record that `user_id` viewed their own contact `contact_id`. A no-op when
    /// already recorded; duplicates collapse on the (user_id, contact_id) unique key.
    /// Returns false, writing nothing, when the user owns no such contact.
    async fn upsert_viewed(&self, user_id: Uuid, contact_id: Uuid) -> anyhow::Result<bool>;

    async fn viewed_contact_ids(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>>;
}

#[derive(Clone)]
pub struct PgInteractionRepo {
    db: PgPool,
}

impl PgInteractionRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InteractionRepo for PgInteractionRepo {
    async fn upsert_viewed(&self, user_id: Uuid, contact_id: Uuid) -> anyhow::Result<bool> {
        let (owned,): (bool,) = sqlx::query_as(
            r#"
            WITH owned AS (
                SELECT id FROM contacts WHERE id = $2 AND user_id = $1
            ), inserted AS (
                INSERT INTO contact_interactions (user_id, contact_id)
                SELECT $1, id FROM owned
                ON CONFLICT (user_id, contact_id) DO NOTHING
            )
            SELECT EXISTS (SELECT 1 FROM owned)
            "#,
        )
        .bind(user_id)
        .bind(contact_id)
        .fetch_one(&self.db)
        .await
        .context("upsert contact interaction")?;
        Ok(owned)
    }

    async fn viewed_contact_ids(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT contact_id FROM contact_interactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list viewed contacts")?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
