use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{
    Account, NewUser, OAuthUser, ProviderAccount, Role, TokenPurpose, User, VerificationToken,
};

const USER_COLUMNS: &str =
    "id, email, name, image, password_hash, email_verified, role, created_at, updated_at";

/// Storage for users, their linked accounts and one-time tokens.
///
/// Uniqueness of emails and of (provider, provider_account_id) is enforced by
/// the store itself; implementations must insert atomically rather than
/// check-then-write.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    async fn find_by_email_with_accounts(
        &self,
        email: &str,
    ) -> anyhow::Result<Option<(User, Vec<Account>)>>;

    async fn find_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> anyhow::Result<Option<User>>;

    async fn create(&self, new: NewUser) -> anyhow::Result<User>;

    /// Create a user and link its first provider account in one step.
    /// Create a user and link `account` atomically. When the account was
    /// linked concurrently, nothing is created and its owner is returned.
    async fn create_with_account(
        &self,
        new: NewUser,
        account: &ProviderAccount,
    ) -> anyhow::Result<User>;

    /// Returns false when the (provider, provider_account_id) pair was already linked.
    async fn link_account(&self, user_id: Uuid, account: &ProviderAccount) -> anyhow::Result<bool>;

    /// Refresh name/image/verification on the user keyed by email, or create it as USER.
    async fn upsert_oauth_profile(
        &self,
        email: &str,
        profile: &OAuthUser,
        verified_at: OffsetDateTime,
    ) -> anyhow::Result<User>;

    async fn mark_email_verified(&self, email: &str, at: OffsetDateTime) -> anyhow::Result<bool>;

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<()>;

    /// Store a token, replacing earlier ones for the same identifier and purpose.
    async fn save_token(&self, token: &VerificationToken) -> anyhow::Result<()>;

    /// Remove and return a token.
    async fn take_token(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> anyhow::Result<Option<VerificationToken>>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

async fn insert_account<'e, E>(db: E, user_id: Uuid, a: &ProviderAccount) -> anyhow::Result<bool>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let res = sqlx::query(
        r#"
        INSERT INTO accounts (user_id, type, provider, provider_account_id, access_token,
                              expires_at, refresh_token, id_token, scope, session_state, token_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (provider, provider_account_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(&a.provider_type)
    .bind(&a.provider)
    .bind(&a.provider_account_id)
    .bind(&a.access_token)
    .bind(a.expires_at)
    .bind(&a.refresh_token)
    .bind(&a.id_token)
    .bind(&a.scope)
    .bind(&a.session_state)
    .bind(&a.token_type)
    .execute(db)
    .await
    .context("insert account")?;
    Ok(res.rows_affected() == 1)
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email_with_accounts(
        &self,
        email: &str,
    ) -> anyhow::Result<Option<(User, Vec<Account>)>> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, type, provider, provider_account_id, access_token, expires_at,
                   refresh_token, id_token, scope, session_state, token_type
              FROM accounts
             WHERE user_id = $1
            "#,
        )
        .bind(user.id)
        .fetch_all(&self.db)
        .await
        .context("list accounts by user")?;
        Ok(Some((user, accounts)))
    }

    async fn find_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.name, u.image, u.password_hash, u.email_verified,
                   u.role, u.created_at, u.updated_at
              FROM users u
              JOIN accounts a ON a.user_id = u.id
             WHERE a.provider = $1 AND a.provider_account_id = $2
            "#,
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(&self.db)
        .await
        .context("find user by account")?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, image, password_hash, role, email_verified)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.image)
        .bind(&new.password_hash)
        .bind(new.role)
        .bind(new.email_verified)
        .fetch_one(&self.db)
        .await
        .context("create user")?;
        Ok(user)
    }

    async fn create_with_account(
        &self,
        new: NewUser,
        account: &ProviderAccount,
    ) -> anyhow::Result<User> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, image, password_hash, role, email_verified)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.image)
        .bind(&new.password_hash)
        .bind(new.role)
        .bind(new.email_verified)
        .fetch_one(&mut *tx)
        .await
        .context("create user")?;
        if !insert_account(&mut *tx, user.id, account).await? {
            tx.rollback().await.context("rollback tx")?;
            return self
                .find_by_account(&account.provider, &account.provider_account_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("account linked concurrently but owner not found"));
        }
        tx.commit().await.context("commit tx")?;
        Ok(user)
    }

    async fn link_account(&self, user_id: Uuid, account: &ProviderAccount) -> anyhow::Result<bool> {
        insert_account(&self.db, user_id, account).await
    }

    async fn upsert_oauth_profile(
        &self,
        email: &str,
        profile: &OAuthUser,
        verified_at: OffsetDateTime,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, image, role, email_verified)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
               SET name = EXCLUDED.name,
                   image = EXCLUDED.image,
                   email_verified = EXCLUDED.email_verified,
                   updated_at = now()
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(&profile.name)
        .bind(&profile.image)
        .bind(Role::User)
        .bind(verified_at)
        .fetch_one(&self.db)
        .await
        .context("upsert oauth profile")?;
        Ok(user)
    }

    async fn mark_email_verified(&self, email: &str, at: OffsetDateTime) -> anyhow::Result<bool> {
        let res = sqlx::query(
            "UPDATE users SET email_verified = $2, updated_at = now() WHERE email = $1",
        )
        .bind(email)
        .bind(at)
        .execute(&self.db)
        .await
        .context("mark email verified")?;
        Ok(res.rows_affected() == 1)
    }

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("set password")?;
        Ok(())
    }

    async fn save_token(&self, token: &VerificationToken) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query("DELETE FROM verification_tokens WHERE identifier = $1 AND purpose = $2")
            .bind(&token.identifier)
            .bind(token.purpose)
            .execute(&mut *tx)
            .await
            .context("delete previous tokens")?;
        sqlx::query(
            r#"
            INSERT INTO verification_tokens (token, identifier, purpose, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&token.token)
        .bind(&token.identifier)
        .bind(token.purpose)
        .bind(token.expires_at)
        .execute(&mut *tx)
        .await
        .context("insert token")?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn take_token(
        &self,
        token: &str,
        purpose: TokenPurpose,
    ) -> anyhow::Result<Option<VerificationToken>> {
        let row = sqlx::query_as::<_, VerificationToken>(
            r#"
            DELETE FROM verification_tokens
             WHERE token = $1 AND purpose = $2
            RETURNING token, identifier, purpose, expires_at
            "#,
        )
        .bind(token)
        .bind(purpose)
        .fetch_optional(&self.db)
        .await
        .context("take token")?;
        Ok(row)
    }
}
