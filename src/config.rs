use serde::Deserialize;

use crate::paths;

pub const APP_NAME: &str = "Contact Hub";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// Public origin, used for mail links and the default OAuth redirect.
    pub base_url: String,
    pub google: Option<GoogleConfig>,
    pub debug: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "contacthub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "contacthub-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let base_url = std::env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".into())
            .trim_end_matches('/')
            .to_string();

        let google = match (
            std::env::var("GOOGLE_CLIENT_ID").ok().filter(|v| !v.is_empty()),
            std::env::var("GOOGLE_CLIENT_SECRET").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(client_id), Some(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_url: std::env::var("GOOGLE_REDIRECT_URL").unwrap_or_else(|_| {
                    format!("{}{}", base_url, paths::api_auth::CALLBACK_GOOGLE)
                }),
            }),
            _ => {
                tracing::info!("GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET not set; google sign-in disabled");
                None
            }
        };

        let debug = std::env::var("APP_ENV")
            .map(|v| v == "development")
            .unwrap_or(false);

        Ok(Self {
            database_url,
            jwt,
            base_url,
            google,
            debug,
        })
    }

    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Absolute URL for a path from the route table.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
