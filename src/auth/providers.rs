use tracing::warn;

use crate::{
    auth::{
        google::GoogleProfile,
        password::verify_password,
        repo::UserRepo,
        repo_types::{OAuthUser, Role, User},
    },
    error::AppError,
};

/// Credential verifier for the email/password provider.
///
/// The verification timestamp is only checked once the password matched, so an
/// unauthenticated caller learns nothing about verification state.
pub async fn authorize_credentials(
    users: &dyn UserRepo,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::MissingInput("email"));
    }
    if password.is_empty() {
        return Err(AppError::MissingInput("password"));
    }

    let user = users.find_by_email(&email).await?;
    let Some((user, hash)) = user.and_then(|u| {
        let hash = u.password_hash.clone()?;
        Some((u, hash))
    }) else {
        warn!(email = %email, "login attempt failed: user not found or no password set");
        return Err(AppError::UserNotFound);
    };

    if !verify_password(password, &hash)? {
        warn!(user_id = %user.id, "login attempt failed: incorrect password");
        return Err(AppError::InvalidPassword);
    }

    if user.email_verified.is_none() {
        return Err(AppError::EmailNotVerified);
    }

    Ok(user)
}

/// Map a Google profile onto the local identity shape.
pub fn map_google_profile(profile: GoogleProfile) -> OAuthUser {
    OAuthUser {
        id: profile.sub,
        name: profile.name,
        email: profile.email,
        image: profile.picture,
        role: Role::User,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::memory::MemoryStore;

    fn store_with(email: &str, password: Option<&str>, verified: bool) -> MemoryStore {
        let store = MemoryStore::new();
        let hash = password.map(|p| hash_password(p).unwrap());
        store.insert_user(email, hash.as_deref(), verified);
        store
    }

    #[tokio::test]
    async fn email_lookup_ignores_case() {
        let store = store_with("user@x.com", Some("hunter2hunter2"), true);
        let a = authorize_credentials(&store, "USER@X.com", "hunter2hunter2")
            .await
            .unwrap();
        let b = authorize_credentials(&store, "user@x.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn unknown_user_and_oauth_only_user_are_not_found() {
        let store = store_with("oauth@x.com", None, true);
        assert!(matches!(
            authorize_credentials(&store, "oauth@x.com", "whatever1").await,
            Err(AppError::UserNotFound)
        ));
        assert!(matches!(
            authorize_credentials(&store, "missing@x.com", "whatever1").await,
            Err(AppError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn wrong_password_wins_over_unverified_email() {
        let store = store_with("new@x.com", Some("right-password"), false);
        assert!(matches!(
            authorize_credentials(&store, "new@x.com", "wrong-password").await,
            Err(AppError::InvalidPassword)
        ));
    }

    #[tokio::test]
    async fn correct_password_but_unverified_email() {
        let store = store_with("new@x.com", Some("right-password"), false);
        assert!(matches!(
            authorize_credentials(&store, "new@x.com", "right-password").await,
            Err(AppError::EmailNotVerified)
        ));
    }

    #[tokio::test]
    async fn blank_fields_are_missing_input() {
        let store = MemoryStore::new();
        assert!(matches!(
            authorize_credentials(&store, "  ", "pw").await,
            Err(AppError::MissingInput("email"))
        ));
        assert!(matches!(
            authorize_credentials(&store, "a@x.com", "").await,
            Err(AppError::MissingInput("password"))
        ));
    }

    #[test]
    fn google_profile_maps_to_user_role() {
        let mapped = map_google_profile(GoogleProfile {
            sub: "1234".into(),
            name: Some("Ada".into()),
            email: Some("ada@x.com".into()),
            picture: Some("https://pic".into()),
            email_verified: Some(true),
        });
        assert_eq!(
            mapped,
            OAuthUser {
                id: "1234".into(),
                name: Some("Ada".into()),
                email: Some("ada@x.com".into()),
                image: Some("https://pic".into()),
                role: Role::User,
            }
        );
    }
}
