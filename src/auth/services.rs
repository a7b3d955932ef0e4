use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};

use crate::{
    auth::{
        callbacks::{self, SignInDecision},
        claims::TokenKind,
        csrf::random_token,
        dto::{RegisterRequest, Session},
        extractors::session_from_claims,
        jwt::JwtKeys,
        password::{check_policy, hash_password},
        providers::authorize_credentials,
        repo::UserRepo,
        repo_types::{
            NewUser, OAuthUser, ProviderAccount, Role, TokenPurpose, User, VerificationToken,
        },
    },
    error::AppError,
    mailer::OutgoingMail,
    paths,
    state::AppState,
};

const VERIFICATION_TOKEN_TTL: Duration = Duration::hours(24);
const RESET_TOKEN_TTL: Duration = Duration::hours(1);

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Signed token pair plus the session it materializes to.
#[derive(Debug)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub session: Session,
}

#[derive(Debug)]
pub enum SignInOutcome {
    SignedIn(Box<IssuedTokens>),
    Redirect(String),
}

fn interrupted(decision: SignInDecision) -> Option<SignInOutcome> {
    match decision {
        SignInDecision::Continue => None,
        SignInDecision::Deny => Some(SignInOutcome::Redirect(format!(
            "{}?error=AccessDenied",
            paths::auth::AUTH_ERROR
        ))),
        SignInDecision::Redirect(to) => Some(SignInOutcome::Redirect(to)),
    }
}

/// Run the token enricher and sign an access/refresh pair for `user`.
pub async fn issue_tokens(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    user: &User,
) -> Result<IssuedTokens, AppError> {
    let access = callbacks::jwt(users, keys.claims_for(user, TokenKind::Access), Some(user)).await;
    let mut refresh = keys.claims_for(user, TokenKind::Refresh);
    refresh.role = access.role;

    Ok(IssuedTokens {
        access_token: keys.encode(&access)?,
        refresh_token: keys.encode(&refresh)?,
        session: session_from_claims(&access),
    })
}

pub async fn sign_in_with_credentials(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<SignInOutcome, AppError> {
    let users = state.users.as_ref();
    let user = authorize_credentials(users, email, password).await?;

    let account = ProviderAccount::credentials(&user.email);
    if let Some(outcome) =
        interrupted(callbacks::sign_in(users, Some(&user.email), Some(&account)).await)
    {
        return Ok(outcome);
    }

    let keys = JwtKeys::from(&state.config.jwt);
    let tokens = issue_tokens(users, &keys, &user).await?;
    info!(user_id = %user.id, "user signed in with credentials");
    Ok(SignInOutcome::SignedIn(Box::new(tokens)))
}

/// Finish an OAuth sign-in: link, resolve the local user, sync the profile, issue tokens.
pub async fn complete_oauth_sign_in(
    state: &AppState,
    profile: OAuthUser,
    account: ProviderAccount,
) -> Result<SignInOutcome, AppError> {
    let users = state.users.as_ref();
    let email = profile
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::OAuth("provider profile has no email".into()))?;

    if let Some(outcome) =
        interrupted(callbacks::sign_in(users, Some(&email), Some(&account)).await)
    {
        return Ok(outcome);
    }

    let user = resolve_oauth_user(users, &email, &profile, &account).await?;

    if let Err(e) = callbacks::google_sign_in_event(users, &profile, Some(&account)).await {
        error!(error = %e, user_id = %user.id, "google profile sync failed; continuing sign-in");
    }

    let keys = JwtKeys::from(&state.config.jwt);
    let tokens = issue_tokens(users, &keys, &user).await?;
    info!(user_id = %user.id, provider = %account.provider, "user signed in with oauth");
    Ok(SignInOutcome::SignedIn(Box::new(tokens)))
}

/// Local user for an OAuth identity: by linked account, else create user and link.
///
/// An existing email without the link means linking failed earlier in the
/// pipeline; that surfaces as `AccountNotLinked` rather than a second account.
async fn resolve_oauth_user(
    users: &dyn UserRepo,
    email: &str,
    profile: &OAuthUser,
    account: &ProviderAccount,
) -> Result<User, AppError> {
    if let Some(user) = users
        .find_by_account(&account.provider, &account.provider_account_id)
        .await?
    {
        return Ok(user);
    }
    if users.find_by_email(email).await?.is_some() {
        warn!(email = %email, provider = %account.provider, "oauth account not linked to existing user");
        return Err(AppError::AccountNotLinked);
    }
    let user = users
        .create_with_account(
            NewUser {
                email: email.to_string(),
                name: profile.name.clone(),
                image: profile.image.clone(),
                password_hash: None,
                role: Role::User,
                email_verified: None,
            },
            account,
        )
        .await?;
    info!(user_id = %user.id, provider = %account.provider, "user created from oauth profile");
    Ok(user)
}

pub async fn refresh_tokens(
    state: &AppState,
    refresh_token: &str,
) -> Result<IssuedTokens, AppError> {
    let keys = JwtKeys::from(&state.config.jwt);
    let claims = keys.verify_refresh(refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Unauthenticated
    })?;
    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    issue_tokens(state.users.as_ref(), &keys, &user).await
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<User, AppError> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::InvalidInput("Invalid email".into()));
    }
    check_policy(&req.password)?;
    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let user = state
        .users
        .create(NewUser {
            email,
            name: req
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            image: None,
            password_hash: Some(hash_password(&req.password)?),
            role: Role::User,
            email_verified: None,
        })
        .await?;
    info!(user_id = %user.id, "user registered");

    send_verification(state, &user.email).await?;
    Ok(user)
}

async fn issue_token(
    state: &AppState,
    identifier: &str,
    purpose: TokenPurpose,
    ttl: Duration,
) -> Result<String, AppError> {
    let token = VerificationToken {
        token: random_token(48),
        identifier: identifier.to_string(),
        purpose,
        expires_at: OffsetDateTime::now_utc() + ttl,
    };
    state.users.save_token(&token).await?;
    Ok(token.token)
}

async fn deliver(state: &AppState, mail: OutgoingMail) {
    let to = mail.to.clone();
    if let Err(e) = state.mailer.send(mail).await {
        error!(error = %e, to = %to, "mail delivery failed");
    }
}

async fn send_verification(state: &AppState, email: &str) -> Result<(), AppError> {
    let token = issue_token(
        state,
        email,
        TokenPurpose::EmailVerification,
        VERIFICATION_TOKEN_TTL,
    )
    .await?;
    let link = state.config.absolute_url(&format!(
        "{}?token={}",
        paths::api_auth::VERIFY_EMAIL,
        token
    ));
    deliver(
        state,
        OutgoingMail {
            to: email.to_string(),
            subject: "Verify your email address".into(),
            body: format!("Confirm your address by opening {link}"),
        },
    )
    .await;
    Ok(())
}

pub async fn verify_email(state: &AppState, token: &str) -> Result<(), AppError> {
    let stored = state
        .users
        .take_token(token.trim(), TokenPurpose::EmailVerification)
        .await?
        .filter(|t| !t.is_expired())
        .ok_or(AppError::InvalidToken)?;
    if !state
        .users
        .mark_email_verified(&stored.identifier, OffsetDateTime::now_utc())
        .await?
    {
        return Err(AppError::InvalidToken);
    }
    info!(email = %stored.identifier, "email verified");
    Ok(())
}

/// Re-send verification mail. Silent for unknown or already verified addresses.
pub async fn resend_verification(state: &AppState, email: &str) -> Result<(), AppError> {
    let email = normalize_email(email);
    match state.users.find_by_email(&email).await? {
        Some(user) if user.email_verified.is_none() => send_verification(state, &user.email).await,
        _ => Ok(()),
    }
}

/// Mail a reset link. Silent for unknown addresses and OAuth-only users.
pub async fn request_password_reset(state: &AppState, email: &str) -> Result<(), AppError> {
    let email = normalize_email(email);
    let Some(user) = state.users.find_by_email(&email).await? else {
        return Ok(());
    };
    if user.password_hash.is_none() {
        return Ok(());
    }
    let token =
        issue_token(state, &user.email, TokenPurpose::PasswordReset, RESET_TOKEN_TTL).await?;
    let link = state.config.absolute_url(&format!(
        "{}?token={}",
        paths::auth::RESET_PASSWORD,
        token
    ));
    deliver(
        state,
        OutgoingMail {
            to: user.email.clone(),
            subject: "Reset your password".into(),
            body: format!("Choose a new password at {link}"),
        },
    )
    .await;
    Ok(())
}

pub async fn reset_password(state: &AppState, token: &str, password: &str) -> Result<(), AppError> {
    check_policy(password)?;
    let stored = state
        .users
        .take_token(token.trim(), TokenPurpose::PasswordReset)
        .await?
        .filter(|t| !t.is_expired())
        .ok_or(AppError::InvalidToken)?;
    let user = state
        .users
        .find_by_email(&stored.identifier)
        .await?
        .ok_or(AppError::InvalidToken)?;

    state
        .users
        .set_password(user.id, &hash_password(password)?)
        .await?;
    // The reset link proves control of the mailbox.
    if user.email_verified.is_none() {
        state
            .users
            .mark_email_verified(&user.email, OffsetDateTime::now_utc())
            .await?;
    }
    info!(user_id = %user.id, "password reset");
    Ok(())
}
