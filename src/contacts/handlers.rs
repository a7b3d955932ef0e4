use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{extractors::AuthUser, services::is_valid_email},
    contacts::{
        dto::{ContactResponse, CreateContactRequest, Pagination, UpdateContactRequest},
        repo_types::{ContactPatch, NewContact},
    },
    error::AppError,
    paths::{self, api_app, protected},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route(api_app::CONTACTS_BASE, get(list_contacts))
        .route(api_app::CONTACT_BY_ID, get(get_contact))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route(api_app::CONTACTS_BASE, axum::routing::post(create_contact))
        .route(
            api_app::CONTACT_BY_ID,
            axum::routing::put(update_contact).delete(delete_contact),
        )
}

fn required(value: String, field: &'static str) -> Result<String, AppError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::MissingInput(field));
    }
    Ok(value)
}

fn checked_email(email: String) -> Result<String, AppError> {
    let email = required(email, "email")?.to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid contact email");
        return Err(AppError::InvalidInput("Invalid email".into()));
    }
    Ok(email)
}

fn optional_phone(phone: Option<String>) -> Option<String> {
    phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty())
}

#[instrument(skip(state))]
pub async fn list_contacts(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<ContactResponse>>, AppError> {
    let (limit, offset) = p.clamped();
    let contacts = state.contacts.list_by_user(user_id, limit, offset).await?;
    Ok(Json(contacts.into_iter().map(ContactResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_contact(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ContactResponse>, AppError> {
    state
        .contacts
        .get(user_id, id)
        .await?
        .map(|c| Json(c.into()))
        .ok_or(AppError::NotFound("contact"))
}

#[instrument(skip(state, payload))]
pub async fn create_contact(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateContactRequest>,
) -> Result<impl IntoResponse, AppError> {
    let new = NewContact {
        first_name: required(payload.first_name, "firstName")?,
        last_name: required(payload.last_name, "lastName")?,
        email: checked_email(payload.email)?,
        phone: optional_phone(payload.phone),
        contact_type: payload.contact_type,
        created_at: None,
    };
    let contact = state.contacts.create(user_id, new).await?;
    state.revalidator.revalidate_path(protected::SETTINGS_BASE);
    info!(%user_id, contact_id = %contact.id, "contact created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, paths::contact_by_id(contact.id))],
        Json(ContactResponse::from(contact)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_contact(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateContactRequest>,
) -> Result<Json<ContactResponse>, AppError> {
    let patch = ContactPatch {
        first_name: payload
            .first_name
            .map(|v| required(v, "firstName"))
            .transpose()?,
        last_name: payload
            .last_name
            .map(|v| required(v, "lastName"))
            .transpose()?,
        email: payload.email.map(checked_email).transpose()?,
        phone: payload.phone.map(optional_phone),
        contact_type: payload.contact_type,
    };
    let contact = state
        .contacts
        .update(user_id, id, patch)
        .await?
        .ok_or(AppError::NotFound("contact"))?;
    state.revalidator.revalidate_path(protected::SETTINGS_BASE);
    Ok(Json(contact.into()))
}

#[instrument(skip(state))]
pub async fn delete_contact(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.contacts.delete(user_id, id).await? {
        return Err(AppError::NotFound("contact"));
    }
    state.revalidator.revalidate_path(protected::SETTINGS_BASE);
    info!(%user_id, contact_id = %id, "contact deleted");
    Ok(StatusCode::NO_CONTENT)
}
