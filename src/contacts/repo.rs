use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::contacts::repo_types::{Contact, ContactPatch, NewContact};

const CONTACT_COLUMNS: &str =
    "id, user_id, first_name, last_name, email, phone, contact_type, created_at, updated_at";

/// Contacts scoped to their owning user. Every query filters on `user_id`.
#[async_trait]
pub trait ContactRepo: Send + Sync {
    async fn list_by_user(&self, user_id: Uuid, limit: i64, offset: i64)
        -> anyhow::Result<Vec<Contact>>;

    async fn get(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>>;

    async fn create(&self, user_id: Uuid, new: NewContact) -> anyhow::Result<Contact>;

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: ContactPatch,
    ) -> anyhow::Result<Option<Contact>>;

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool>;

    /// Delete the user's contacts whose email ends with `suffix`.
    async fn delete_by_email_suffix(&self, user_id: Uuid, suffix: &str) -> anyhow::Result<u64>;

    async fn insert_many(&self, user_id: Uuid, rows: Vec<NewContact>) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgContactRepo {
    db: PgPool,
}

impl PgContactRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContactRepo for PgContactRepo {
    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
              FROM contacts
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list contacts by user")?;
        Ok(rows)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("get contact")?;
        Ok(row)
    }

    async fn create(&self, user_id: Uuid, new: NewContact) -> anyhow::Result<Contact> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            r#"
            INSERT INTO contacts (user_id, first_name, last_name, email, phone, contact_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, now()))
            RETURNING {CONTACT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(new.contact_type)
        .bind(new.created_at)
        .fetch_one(&self.db)
        .await
        .context("create contact")?;
        Ok(row)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: ContactPatch,
    ) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            r#"
            UPDATE contacts
               SET first_name   = COALESCE($3, first_name),
                   last_name    = COALESCE($4, last_name),
                   email        = COALESCE($5, email),
                   phone        = CASE WHEN $6 THEN $7 ELSE phone END,
                   contact_type = COALESCE($8, contact_type),
                   updated_at   = now()
             WHERE id = $1 AND user_id = $2
            RETURNING {CONTACT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&patch.first_name)
        .bind(&patch.last_name)
        .bind(&patch.email)
        .bind(patch.phone.is_some())
        .bind(patch.phone.flatten())
        .bind(patch.contact_type)
        .fetch_optional(&self.db)
        .await
        .context("update contact")?;
        Ok(row)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM contacts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete contact")?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_by_email_suffix(&self, user_id: Uuid, suffix: &str) -> anyhow::Result<u64> {
        let res = sqlx::query(
            "DELETE FROM contacts WHERE user_id = $1 AND right(email, length($2)) = $2",
        )
        .bind(user_id)
        .bind(suffix)
        .execute(&self.db)
        .await
        .context("delete contacts by email suffix")?;
        Ok(res.rows_affected())
    }

    async fn insert_many(&self, user_id: Uuid, rows: Vec<NewContact>) -> anyhow::Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO contacts (user_id, first_name, last_name, email, phone, contact_type, created_at) ",
        );
        qb.push_values(rows, |mut b, c| {
            b.push_bind(user_id)
                .push_bind(c.first_name)
                .push_bind(c.last_name)
                .push_bind(c.email)
                .push_bind(c.phone)
                .push_bind(c.contact_type)
                .push("COALESCE(")
                .push_bind_unseparated(c.created_at)
                .push_unseparated(", now())");
        });
        let res = qb
            .build()
            .execute(&self.db)
            .await
            .context("insert contacts")?;
        Ok(res.rows_affected())
    }
}
