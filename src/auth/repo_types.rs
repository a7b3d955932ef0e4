use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const CREDENTIALS_PROVIDER: &str = "credentials";
pub const GOOGLE_PROVIDER: &str = "google";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "token_purpose", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String, // always lowercase
    pub name: Option<String>,
    pub image: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>, // none for OAuth-only users
    pub email_verified: Option<OffsetDateTime>,
    pub role: Role,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Link between a user and an external identity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type")]
    pub provider_type: String,
    pub provider: String,
    pub provider_account_id: String,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub expires_at: Option<i64>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing)]
    pub id_token: Option<String>,
    pub scope: Option<String>,
    pub session_state: Option<String>,
    pub token_type: Option<String>,
}

/// Provider account as handed over by a sign-in attempt, before it is stored.
#[derive(Debug, Clone, Default)]
pub struct ProviderAccount {
    pub provider_type: String,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub expires_at: Option<i64>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub scope: Option<String>,
    pub session_state: Option<String>,
    pub token_type: Option<String>,
}

impl ProviderAccount {
    pub fn credentials(email: &str) -> Self {
        Self {
            provider_type: CREDENTIALS_PROVIDER.into(),
            provider: CREDENTIALS_PROVIDER.into(),
            provider_account_id: email.to_string(),
            ..Default::default()
        }
    }

    pub fn matches(&self, account: &Account) -> bool {
        account.provider == self.provider
            && account.provider_account_id == self.provider_account_id
    }
}

/// Identity produced by an OAuth profile mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthUser {
    pub id: String, // provider subject, not a local id
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub password_hash: Option<String>,
    pub role: Role,
    pub email_verified: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub token: String,
    pub identifier: String,
    pub purpose: TokenPurpose,
    pub expires_at: OffsetDateTime,
}

impl VerificationToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }
}
