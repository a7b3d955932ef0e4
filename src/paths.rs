//! Route table.
//!
//! Every path the service registers, redirects to or documents is declared here.
//! Handlers, middleware, the navigation model and the request-collection
//! generator all resolve paths through these constants.

use uuid::Uuid;

/// Site-wide public pages.
pub mod site {
    pub const HOME: &str = "/";
    pub const ABOUT: &str = "/about-us";
    pub const CONTACT: &str = "/contact-us";
    pub const TERMS: &str = "/terms-of-service";
    pub const PRIVACY: &str = "/privacy-policy";
    pub const HEALTH: &str = "/health";
}

/// Authentication pages.
pub mod auth {
    pub const LOGIN: &str = "/auth/login";
    pub const REGISTER: &str = "/auth/register";
    pub const FORGOT_PASSWORD: &str = "/auth/forgot-password";
    pub const RESET_PASSWORD: &str = "/auth/reset-password";
    /// Shown while email verification is pending.
    pub const VERIFY_EMAIL_INFO_PAGE: &str = "/auth/verify-email";
    pub const AUTH_ERROR: &str = "/auth/error";
    pub const UNAUTHORIZED: &str = "/auth/unauthorized";

    pub const ALL: [&str; 7] = [
        LOGIN,
        REGISTER,
        FORGOT_PASSWORD,
        RESET_PASSWORD,
        VERIFY_EMAIL_INFO_PAGE,
        AUTH_ERROR,
        UNAUTHORIZED,
    ];
}

/// Pages that require a session.
pub mod protected {
    pub const SETTINGS_BASE: &str = "/settings";

    pub const ALL: [&str; 1] = [SETTINGS_BASE];
}

/// Authentication API.
pub mod api_auth {
    pub const REGISTER: &str = "/api/auth/register";
    pub const VERIFY_EMAIL: &str = "/api/auth/verify-email";
    pub const RESEND_VERIFICATION_EMAIL: &str = "/api/auth/resend-verification";
    pub const FORGOT_PASSWORD: &str = "/api/auth/forgot-password";
    pub const RESET_PASSWORD: &str = "/api/auth/reset-password";

    pub const CSRF: &str = "/api/auth/csrf";
    pub const SIGNIN_CREDENTIALS: &str = "/api/auth/signin/credentials";
    pub const SIGNIN_GOOGLE: &str = "/api/auth/signin/google";
    pub const CALLBACK_GOOGLE: &str = "/api/auth/callback/google";
    pub const SESSION: &str = "/api/auth/session";
    pub const SIGNOUT: &str = "/api/auth/signout";
    pub const REFRESH: &str = "/api/auth/refresh";
}

/// Application API.
pub mod api_app {
    pub const CONTACTS_BASE: &str = "/api/contacts";
    /// Router pattern; build concrete paths with [`super::contact_by_id`].
    pub const CONTACT_BY_ID: &str = "/api/contacts/:id";
    pub const CONTACT_VIEWED: &str = "/api/contacts/:id/viewed";
    pub const NAVIGATION: &str = "/api/navigation";
}

pub const DEFAULT_LOGIN_REDIRECT_PATH: &str = protected::SETTINGS_BASE;
pub const DEFAULT_LOGOUT_REDIRECT_PATH: &str = site::HOME;

/// Page paths reachable without a session.
///
/// API routes are not listed; `/api/auth` is matched by prefix and the
/// application API authenticates per handler.
pub const PUBLIC_ROUTE_PATTERNS: [&str; 11] = [
    site::HOME,
    site::ABOUT,
    site::TERMS,
    site::PRIVACY,
    site::HEALTH,
    auth::LOGIN,
    auth::REGISTER,
    auth::FORGOT_PASSWORD,
    auth::RESET_PASSWORD,
    auth::VERIFY_EMAIL_INFO_PAGE,
    auth::AUTH_ERROR,
];

pub const API_ROUTE_PREFIX: &str = "/api";
pub const API_AUTH_ROUTE_PREFIX: &str = "/api/auth";

pub const ROOT_PATH: &str = "/";

/// Paths rendered with the minimal layout (no navbar).
pub const ISOLATED_LAYOUT_PATHS: [&str; 8] = [
    auth::LOGIN,
    auth::REGISTER,
    auth::FORGOT_PASSWORD,
    auth::RESET_PASSWORD,
    auth::VERIFY_EMAIL_INFO_PAGE,
    auth::AUTH_ERROR,
    auth::UNAUTHORIZED,
    "/signup/:path*",
];

pub fn contact_by_id(id: Uuid) -> String {
    format!("{}/{}", api_app::CONTACTS_BASE, id)
}

pub fn contact_viewed(id: Uuid) -> String {
    format!("{}/{}/viewed", api_app::CONTACTS_BASE, id)
}

/// `/signup/:path*` style patterns match the prefix and anything below it.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    match pattern.strip_suffix("/:path*") {
        Some(prefix) => path == prefix || path.starts_with(&format!("{}/", prefix)),
        None => pattern == path,
    }
}

fn has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix || path.starts_with(&format!("{}/", prefix))
}

pub fn is_public_route(path: &str) -> bool {
    PUBLIC_ROUTE_PATTERNS
        .iter()
        .any(|pattern| pattern_matches(pattern, path))
}

pub fn is_api_route(path: &str) -> bool {
    has_prefix(path, API_ROUTE_PREFIX)
}

pub fn is_api_auth_route(path: &str) -> bool {
    has_prefix(path, API_AUTH_ROUTE_PREFIX)
}

pub fn is_auth_page(path: &str) -> bool {
    auth::ALL.contains(&path)
}

pub fn is_protected_route(path: &str) -> bool {
    protected::ALL.iter().any(|base| has_prefix(path, base))
}

pub fn uses_isolated_layout(path: &str) -> bool {
    ISOLATED_LAYOUT_PATHS
        .iter()
        .any(|pattern| pattern_matches(pattern, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_public_pattern_is_public() {
        for p in PUBLIC_ROUTE_PATTERNS {
            assert!(is_public_route(p), "{p} should be public");
        }
        assert!(!is_public_route(protected::SETTINGS_BASE));
        assert!(!is_public_route("/settings/profile"));
        assert!(!is_public_route(auth::UNAUTHORIZED));
    }

    #[test]
    fn api_prefixes_do_not_match_lookalikes() {
        assert!(is_api_auth_route(api_auth::SESSION));
        assert!(is_api_auth_route(API_AUTH_ROUTE_PREFIX));
        assert!(!is_api_auth_route("/api/authors"));
        assert!(is_api_route(api_app::CONTACTS_BASE));
        assert!(!is_api_route("/apiary"));
    }

    #[test]
    fn protected_covers_sub_paths() {
        assert!(is_protected_route("/settings"));
        assert!(is_protected_route("/settings/contacts"));
        assert!(!is_protected_route("/settingsx"));
    }

    #[test]
    fn isolated_layout_matches_signup_tree() {
        assert!(uses_isolated_layout(auth::LOGIN));
        assert!(uses_isolated_layout("/signup"));
        assert!(uses_isolated_layout("/signup/abc/tack"));
        assert!(!uses_isolated_layout("/signupx"));
        assert!(!uses_isolated_layout(site::HOME));
    }

    #[test]
    fn dynamic_contact_paths() {
        let id = Uuid::nil();
        assert_eq!(
            contact_by_id(id),
            "/api/contacts/00000000-0000-0000-0000-000000000000"
        );
        assert!(contact_viewed(id).ends_with("/viewed"));
        assert_eq!(DEFAULT_LOGIN_REDIRECT_PATH, "/settings");
        assert_eq!(DEFAULT_LOGOUT_REDIRECT_PATH, ROOT_PATH);
    }
}
