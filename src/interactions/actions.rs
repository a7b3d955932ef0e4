use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::dto::Session,
    error::AppError,
    interactions::repo::InteractionRepo,
    paths::protected,
    revalidate::Revalidator,
};

const NOT_AUTHENTICATED: &str = "You need to be signed in.";
const MISSING_CONTACT_ID: &str = "Contact id is missing.";
const MARK_FAILED: &str = "Could not mark the contact as viewed. Please try again.";

/// Result of a UI action; failures carry a message fit for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

impl From<&AppError> for ActionResult {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::Unauthenticated => Self::failed(NOT_AUTHENTICATED),
            AppError::MissingInput(_) => Self::failed(MISSING_CONTACT_ID),
            _ => Self::failed(MARK_FAILED),
        }
    }
}

async fn record_view(
    repo: &dyn InteractionRepo,
    session: Option<&Session>,
    contact_id: &str,
) -> Result<(), AppError> {
    let Some(user_id) = session.and_then(|s| s.user.id) else {
        error!("user not authenticated to mark contact as viewed");
        return Err(AppError::Unauthenticated);
    };
    let contact_id = contact_id.trim();
    if contact_id.is_empty() {
        warn!(%user_id, "contact id is required to mark as viewed");
        return Err(AppError::MissingInput("contactId"));
    }
    let contact_id = Uuid::parse_str(contact_id).map_err(|_| AppError::NotFound("contact"))?;

    if !repo.upsert_viewed(user_id, contact_id).await? {
        warn!(%user_id, %contact_id, "no such contact for user");
        return Err(AppError::NotFound("contact"));
    }
    info!(%user_id, %contact_id, "contact marked as viewed");
    Ok(())
}

/// Record that the session user viewed `contact_id`, then revalidate the settings area.
///
/// Never fails: every error becomes `success: false` with a message.
pub async fn mark_contact_viewed(
    repo: &dyn InteractionRepo,
    revalidator: &Revalidator,
    session: Option<&Session>,
    contact_id: &str,
) -> ActionResult {
    match record_view(repo, session, contact_id).await {
        Ok(()) => {
            revalidator.revalidate_path(protected::SETTINGS_BASE);
            ActionResult::ok()
        }
        Err(e) => {
            if !matches!(e, AppError::Unauthenticated | AppError::MissingInput(_)) {
                error!(error = %e, "error marking contact as viewed");
            }
            ActionResult::from(&e)
        }
    }
}
