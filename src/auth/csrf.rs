use axum_extra::extract::cookie::CookieJar;
use rand::{distributions::Alphanumeric, Rng};

use crate::error::AppError;

pub const CSRF_COOKIE: &str = "csrf_token";

pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn new_csrf_token() -> String {
    random_token(48)
}

/// Double-submit check: the submitted token must equal the CSRF cookie.
pub fn verify(jar: &CookieJar, submitted: Option<&str>) -> Result<(), AppError> {
    let cookie = jar.get(CSRF_COOKIE).map(|c| c.value());
    match (cookie, submitted) {
        (Some(expected), Some(got)) if !expected.is_empty() && constant_time_eq(expected, got) => {
            Ok(())
        }
        (_, None) => Err(AppError::MissingInput("csrfToken")),
        _ => Err(AppError::InvalidInput("csrf token mismatch".into())),
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}
