use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::{
    auth::{
        csrf::{self, new_csrf_token, random_token, CSRF_COOKIE},
        dto::{
            AuthResponse, CredentialsRequest, CsrfResponse, EmailRequest, MessageResponse,
            OAuthCallbackQuery, PublicUser, RefreshRequest, RegisterRequest, RegisterResponse,
            ResetPasswordRequest, Session, SignOutRequest, TokenRequest,
        },
        extractors::{MaybeSession, REFRESH_COOKIE, SESSION_COOKIE},
        jwt::JwtKeys,
        providers::map_google_profile,
        services::{self, IssuedTokens, SignInOutcome},
    },
    config::AppConfig,
    error::AppError,
    paths::{self, api_auth},
    state::AppState,
};

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

const GENERIC_MAIL_REPLY: &str = "If the address is registered, an email is on its way";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(api_auth::CSRF, get(csrf_token))
        .route(api_auth::SIGNIN_CREDENTIALS, post(signin_credentials))
        .route(api_auth::SIGNIN_GOOGLE, get(signin_google))
        .route(api_auth::CALLBACK_GOOGLE, get(callback_google))
        .route(api_auth::SESSION, get(session))
        .route(api_auth::SIGNOUT, post(signout))
        .route(api_auth::REFRESH, post(refresh))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(api_auth::REGISTER, post(register))
        .route(
            api_auth::VERIFY_EMAIL,
            get(verify_email_link).post(verify_email),
        )
        .route(api_auth::RESEND_VERIFICATION_EMAIL, post(resend_verification))
        .route(api_auth::FORGOT_PASSWORD, post(forgot_password))
        .route(api_auth::RESET_PASSWORD, post(reset_password))
}

fn auth_cookie(
    name: &'static str,
    value: String,
    path: &'static str,
    max_age: std::time::Duration,
    config: &AppConfig,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies())
        .path(path)
        .max_age(time::Duration::seconds(max_age.as_secs() as i64))
        .build()
}

fn with_session_cookies(jar: CookieJar, tokens: &IssuedTokens, state: &AppState) -> CookieJar {
    let keys = JwtKeys::from(&state.config.jwt);
    jar.add(auth_cookie(
        SESSION_COOKIE,
        tokens.access_token.clone(),
        "/",
        keys.access_ttl,
        &state.config,
    ))
    .add(auth_cookie(
        REFRESH_COOKIE,
        tokens.refresh_token.clone(),
        paths::API_AUTH_ROUTE_PREFIX,
        keys.refresh_ttl,
        &state.config,
    ))
}

fn without_session_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path(paths::API_AUTH_ROUTE_PREFIX))
}

fn auth_error_redirect(err: &AppError) -> Redirect {
    Redirect::to(&format!("{}?error={}", paths::auth::AUTH_ERROR, err.code()))
}

impl From<IssuedTokens> for AuthResponse {
    fn from(tokens: IssuedTokens) -> Self {
        AuthResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            session: tokens.session,
        }
    }
}

#[instrument(skip(state, jar))]
pub async fn csrf_token(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let token = jar
        .get(CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(new_csrf_token);
    let cookie = Cookie::build((CSRF_COOKIE, token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.secure_cookies())
        .path("/")
        .build();
    (jar.add(cookie), Json(CsrfResponse { csrf_token: token }))
}

#[instrument(skip(state, jar, payload))]
pub async fn signin_credentials(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Response, AppError> {
    csrf::verify(&jar, payload.csrf_token.as_deref())?;

    match services::sign_in_with_credentials(&state, &payload.email, &payload.password).await? {
        SignInOutcome::SignedIn(tokens) => {
            let jar = with_session_cookies(jar, &tokens, &state);
            Ok((jar, Json(AuthResponse::from(*tokens))).into_response())
        }
        SignInOutcome::Redirect(to) => Ok(Redirect::to(&to).into_response()),
    }
}

#[instrument(skip(state, jar))]
pub async fn signin_google(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let google = state
        .google
        .as_ref()
        .ok_or(AppError::NotFound("google provider"))?;

    let oauth_state = random_token(32);
    let url = google.authorize_url(&oauth_state)?;
    let cookie = auth_cookie(
        OAUTH_STATE_COOKIE,
        oauth_state,
        paths::API_AUTH_ROUTE_PREFIX,
        std::time::Duration::from_secs(10 * 60),
        &state.config,
    );
    Ok((jar.add(cookie), Redirect::to(&url)))
}

#[instrument(skip(state, jar, query))]
pub async fn callback_google(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> Response {
    let expected_state = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(OAUTH_STATE_COOKIE).path(paths::API_AUTH_ROUTE_PREFIX));

    match google_callback(&state, expected_state, query).await {
        Ok(SignInOutcome::SignedIn(tokens)) => {
            let jar = with_session_cookies(jar, &tokens, &state);
            (jar, Redirect::to(paths::DEFAULT_LOGIN_REDIRECT_PATH)).into_response()
        }
        Ok(SignInOutcome::Redirect(to)) => (jar, Redirect::to(&to)).into_response(),
        Err(e) => {
            warn!(error = %e, "google callback failed");
            (jar, auth_error_redirect(&e)).into_response()
        }
    }
}

async fn google_callback(
    state: &AppState,
    expected_state: Option<String>,
    query: OAuthCallbackQuery,
) -> Result<SignInOutcome, AppError> {
    if let Some(error) = query.error {
        return Err(AppError::OAuth(error));
    }
    let google = state
        .google
        .as_ref()
        .ok_or(AppError::NotFound("google provider"))?;
    match (expected_state, query.state) {
        (Some(expected), Some(got)) if expected == got => {}
        _ => return Err(AppError::InvalidInput("oauth state mismatch".into())),
    }
    let code = query.code.ok_or(AppError::MissingInput("code"))?;

    let tokens = google
        .exchange_code(&code)
        .await
        .map_err(|e| AppError::OAuth(format!("{e:#}")))?;
    let profile = google
        .fetch_profile(&tokens.access_token)
        .await
        .map_err(|e| AppError::OAuth(format!("{e:#}")))?;
    if state.config.debug {
        debug!(sub = %profile.sub, email = ?profile.email, "google profile received");
    }

    let account = tokens.into_account(&profile.sub);
    services::complete_oauth_sign_in(state, map_google_profile(profile), account).await
}

pub async fn session(MaybeSession(session): MaybeSession) -> Json<Option<Session>> {
    Json(session)
}

#[instrument(skip(jar, payload))]
pub async fn signout(
    jar: CookieJar,
    Json(payload): Json<SignOutRequest>,
) -> Result<impl IntoResponse, AppError> {
    csrf::verify(&jar, payload.csrf_token.as_deref())?;
    Ok((
        without_session_cookies(jar),
        Json(json!({ "url": paths::DEFAULT_LOGOUT_REDIRECT_PATH })),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let token = payload
        .and_then(|Json(p)| p.refresh_token)
        .or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()))
        .ok_or(AppError::Unauthenticated)?;

    let tokens = services::refresh_tokens(&state, &token).await?;
    let jar = with_session_cookies(jar, &tokens, &state);
    Ok((jar, Json(AuthResponse::from(tokens))))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registered. Check your inbox to verify your email".into(),
            user: PublicUser {
                id: user.id,
                email: user.email,
                name: user.name,
            },
        }),
    ))
}

/// Target of the emailed link: lands on the login page or the auth error page.
#[instrument(skip(state, query))]
pub async fn verify_email_link(
    State(state): State<AppState>,
    Query(query): Query<TokenRequest>,
) -> Redirect {
    match services::verify_email(&state, &query.token).await {
        Ok(()) => Redirect::to(&format!("{}?verified=1", paths::auth::LOGIN)),
        Err(e) => auth_error_redirect(&e),
    }
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::verify_email(&state, &payload.token).await?;
    Ok(Json(MessageResponse::new("Email verified")))
}

#[instrument(skip(state, payload))]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::resend_verification(&state, &payload.email).await?;
    Ok(Json(MessageResponse::new(GENERIC_MAIL_REPLY)))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::request_password_reset(&state, &payload.email).await?;
    Ok(Json(MessageResponse::new(GENERIC_MAIL_REPLY)))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::reset_password(&state, &payload.token, &payload.password).await?;
    Ok(Json(MessageResponse::new("Password updated")))
}
