use std::collections::HashSet;

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    auth::{dto::PublicUser, extractors::AuthUser},
    contacts::dto::ContactResponse,
    error::AppError,
    paths::protected,
    state::AppState,
};

const OVERVIEW_CONTACT_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
pub struct ContactOverview {
    #[serde(flatten)]
    pub contact: ContactResponse,
    pub viewed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsOverview {
    pub user: PublicUser,
    pub contacts: Vec<ContactOverview>,
    pub viewed_count: usize,
}

pub fn router() -> Router<AppState> {
    Router::new().route(protected::SETTINGS_BASE, get(overview))
}

/// Weak validator over the rendered overview and the local revalidation
/// generation. Writes made outside this process still change the body hash.
pub fn etag_for(generation: u64, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(generation.to_be_bytes());
    hasher.update(body);
    format!("W/\"{:x}\"", hasher.finalize())
}

#[instrument(skip(state, headers))]
pub async fn overview(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    let viewed: HashSet<Uuid> = state
        .interactions
        .viewed_contact_ids(user_id)
        .await?
        .into_iter()
        .collect();
    let contacts: Vec<ContactOverview> = state
        .contacts
        .list_by_user(user_id, OVERVIEW_CONTACT_LIMIT, 0)
        .await?
        .into_iter()
        .map(|c| ContactOverview {
            viewed: viewed.contains(&c.id),
            contact: c.into(),
        })
        .collect();

    let body = SettingsOverview {
        user: PublicUser {
            id: user.id,
            email: user.email,
            name: user.name,
        },
        viewed_count: contacts.iter().filter(|c| c.viewed).count(),
        contacts,
    };
    let rendered = serde_json::to_vec(&body).context("serialize settings overview")?;
    let etag = etag_for(
        state.revalidator.generation(protected::SETTINGS_BASE),
        &rendered,
    );
    let cached = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);
    if cached {
        debug!(%user_id, "settings overview not modified");
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }
    Ok(([(header::ETAG, etag)], Json(body)).into_response())
}
