use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::MaybeSession,
    interactions::actions::{mark_contact_viewed, ActionResult},
    paths::api_app,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route(api_app::CONTACT_VIEWED, post(contact_viewed))
}

/// Always 200; the body says whether the view was recorded.
#[instrument(skip(state, session))]
pub async fn contact_viewed(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    Path(id): Path<String>,
) -> Json<ActionResult> {
    Json(
        mark_contact_viewed(
            state.interactions.as_ref(),
            &state.revalidator,
            session.as_ref(),
            &id,
        )
        .await,
    )
}
