//! Navigation model.
//!
//! The navbar is rendered by the client; this module decides which links it
//! shows for a given path and session and serves that as JSON.

use axum::{
    extract::Query,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    auth::{dto::Session, extractors::MaybeSession, repo_types::Role},
    paths::{self, api_app, api_auth, auth, protected, site},
    state::AppState,
};

const FALLBACK_DISPLAY_NAME: &str = "User";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub href: String,
    pub label: String,
    pub active: bool,
    pub enabled: bool,
}

impl NavLink {
    fn new(href: &str, label: &str, pathname: &str) -> Self {
        Self {
            href: href.to_string(),
            label: label.to_string(),
            active: is_active_link(pathname, href),
            enabled: true,
        }
    }

    fn disabled(label: &str) -> Self {
        Self {
            href: String::new(),
            label: label.to_string(),
            active: false,
            enabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavUser {
    /// Name, else email, first letter capitalized.
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_initial: char,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavModel {
    /// False on pages rendered with the minimal layout.
    pub visible: bool,
    pub items: Vec<NavLink>,
    pub user: Option<NavUser>,
    /// Dropdown entries for a signed-in user.
    pub menu: Vec<NavLink>,
    pub login: Option<NavLink>,
}

pub fn public_nav_items(pathname: &str) -> Vec<NavLink> {
    [(site::ABOUT, "About us"), (site::CONTACT, "Contact us")]
        .into_iter()
        .map(|(href, label)| NavLink::new(href, label, pathname))
        .collect()
}

pub fn capitalize_first_letter(s: Option<&str>) -> String {
    let Some(s) = s else {
        return String::new();
    };
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn is_active_link(pathname: &str, href: &str) -> bool {
    pathname == href || (href != paths::ROOT_PATH && pathname.starts_with(href))
}

fn nav_user(session: &Session) -> NavUser {
    let name = session.user.name.as_deref().filter(|n| !n.is_empty());
    let display_name = capitalize_first_letter(name.or(session.user.email.as_deref()));
    NavUser {
        display_name: if display_name.is_empty() {
            FALLBACK_DISPLAY_NAME.to_string()
        } else {
            display_name
        },
        email: session.user.email.clone(),
        avatar_initial: session
            .user
            .email
            .as_deref()
            .and_then(|e| e.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('U'),
    }
}

pub fn build_nav(pathname: &str, session: Option<&Session>) -> NavModel {
    let items = public_nav_items(pathname);
    let visible = !paths::uses_isolated_layout(pathname);

    let Some(session) = session.filter(|s| s.user.id.is_some()) else {
        return NavModel {
            visible,
            items,
            user: None,
            menu: Vec::new(),
            login: Some(NavLink::new(auth::LOGIN, "Log in", pathname)),
        };
    };

    let mut menu = Vec::new();
    if session.user.role == Some(Role::User) {
        menu.push(NavLink::new(protected::SETTINGS_BASE, "My pages", pathname));
    }
    menu.push(NavLink::disabled("Settings"));
    menu.push(NavLink::disabled("FAQ"));
    menu.push(NavLink::new(api_auth::SIGNOUT, "Log out", pathname));

    NavModel {
        visible,
        items,
        user: Some(nav_user(session)),
        menu,
        login: None,
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route(api_app::NAVIGATION, get(navigation))
}

#[derive(Debug, Deserialize)]
pub struct NavQuery {
    #[serde(default = "root_path")]
    pub path: String,
}
fn root_path() -> String { paths::ROOT_PATH.to_string() }

#[instrument(skip(session))]
pub async fn navigation(
    MaybeSession(session): MaybeSession,
    Query(q): Query<NavQuery>,
) -> Json<NavModel> {
    Json(build_nav(&q.path, session.as_ref()))
}
