use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::{callbacks, claims::Claims, dto::Session, jwt::JwtKeys},
    error::AppError,
};

pub const SESSION_COOKIE: &str = "session_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Access token from `Authorization: Bearer` or, failing that, the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| {
            auth.strip_prefix("Bearer ")
                .or_else(|| auth.strip_prefix("bearer "))
        })
        .map(str::to_string);
    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
    })
}

/// Verified access-token claims for the request, if any.
pub fn request_claims(headers: &HeaderMap, keys: &JwtKeys) -> Option<Claims> {
    let token = session_token(headers)?;
    match keys.verify_access(&token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            warn!(error = %e, "invalid or expired token");
            None
        }
    }
}

/// Shape verified claims into the public session.
pub fn session_from_claims(claims: &Claims) -> Session {
    callbacks::session(Session::from_token_defaults(claims), claims)
}

/// Authenticated user id; rejects with 401 when there is no valid session.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        request_claims(&parts.headers, &keys)
            .map(|claims| AuthUser(claims.sub))
            .ok_or(AppError::Unauthenticated)
    }
}

/// Session if the request carries a valid token; never rejects.
pub struct MaybeSession(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        Ok(MaybeSession(
            request_claims(&parts.headers, &keys).map(|c| session_from_claims(&c)),
        ))
    }
}
