//! Sign-in pipeline hooks.
//!
//! Run in order for every authentication: [`sign_in`] (account linking),
//! [`google_sign_in_event`] (profile sync, Google only), [`jwt`] on every token
//! issuance, and [`session`] on every session read.

use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::auth::{
    claims::Claims,
    dto::Session,
    repo::UserRepo,
    repo_types::{OAuthUser, ProviderAccount, Role, User, CREDENTIALS_PROVIDER, GOOGLE_PROVIDER},
    services::normalize_email,
};

/// Outcome of the sign-in hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInDecision {
    Continue,
    Deny,
    Redirect(String),
}

/// Link an OAuth account to an existing user with the same email.
///
/// Linking failures are logged and swallowed: sign-in is never blocked by them.
pub async fn sign_in(
    users: &dyn UserRepo,
    email: Option<&str>,
    account: Option<&ProviderAccount>,
) -> SignInDecision {
    let (Some(account), Some(email)) = (account, email) else {
        return SignInDecision::Continue;
    };
    if account.provider == CREDENTIALS_PROVIDER {
        return SignInDecision::Continue;
    }

    match users.find_by_email_with_accounts(email).await {
        Ok(Some((user, accounts))) if !accounts.iter().any(|a| account.matches(a)) => {
            match users.link_account(user.id, account).await {
                Ok(true) => {
                    info!(user_id = %user.id, provider = %account.provider, "linked oauth account to existing user")
                }
                Ok(false) => {
                    debug!(user_id = %user.id, provider = %account.provider, "oauth account linked concurrently")
                }
                Err(e) => {
                    error!(error = %e, provider = %account.provider, "account linking failed; continuing sign-in")
                }
            }
        }
        Ok(_) => {}
        Err(e) => {
            error!(error = %e, provider = %account.provider, "account lookup for linking failed; continuing sign-in")
        }
    }
    SignInDecision::Continue
}

/// Keep the local user in sync with the Google profile.
///
/// Returns `Ok(None)` for any other provider.
pub async fn google_sign_in_event(
    users: &dyn UserRepo,
    user: &OAuthUser,
    account: Option<&ProviderAccount>,
) -> anyhow::Result<Option<User>> {
    if account.map(|a| a.provider.as_str()) != Some(GOOGLE_PROVIDER) {
        return Ok(None);
    }
    let email = user
        .email
        .as_deref()
        .map(normalize_email)
        .ok_or_else(|| anyhow::anyhow!("google profile has no email"))?;
    let synced = users
        .upsert_oauth_profile(&email, user, OffsetDateTime::now_utc())
        .await?;
    debug!(user_id = %synced.id, "google profile synced");
    Ok(Some(synced))
}

/// Token enricher: stamp the role from storage onto the token.
///
/// The in-memory `user` is only used for its id; the role is re-read so that
/// changes made after linking are reflected. Falls back to `USER` when the
/// user cannot be loaded.
pub async fn jwt(users: &dyn UserRepo, mut token: Claims, user: Option<&User>) -> Claims {
    let Some(user) = user else {
        return token;
    };
    match users.find_by_id(user.id).await {
        Ok(Some(db_user)) => token.role = Some(db_user.role),
        Ok(None) => {
            error!(user_id = %user.id, "user not found while issuing token; assigning default role");
            token.role = Some(Role::User);
        }
        Err(e) => {
            error!(error = %e, user_id = %user.id, "user lookup failed while issuing token; assigning default role");
            token.role = Some(Role::User);
        }
    }
    token
}

/// Session shaper: expose the token subject and role on the session.
pub fn session(mut session: Session, token: &Claims) -> Session {
    session.user.id = Some(token.sub);
    if let Some(role) = token.role {
        session.user.role = Some(role);
    } else {
        warn!(user_id = %token.sub, "token without role claim");
    }
    session
}
