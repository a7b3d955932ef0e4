//! Google OAuth 2.0 authorization-code flow.
//!
//! [`GoogleOAuth::authorize_url`] builds the consent URL for a caller-supplied
//! CSRF `state`; the callback hands the returned `code` to
//! [`GoogleOAuth::exchange_code`] and then loads the OpenID profile with
//! [`GoogleOAuth::fetch_profile`].

use anyhow::Context;
use reqwest::{Client, Url};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    auth::repo_types::{ProviderAccount, GOOGLE_PROVIDER},
    config::GoogleConfig,
};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

/// OpenID Connect userinfo response.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
    pub email_verified: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Provider account for `subject`, copying every token field.
    pub fn into_account(self, subject: &str) -> ProviderAccount {
        let expires_at = self
            .expires_in
            .map(|secs| OffsetDateTime::now_utc().unix_timestamp() + secs);
        ProviderAccount {
            provider_type: "oauth".into(),
            provider: GOOGLE_PROVIDER.into(),
            provider_account_id: subject.to_string(),
            access_token: Some(self.access_token),
            expires_at,
            refresh_token: self.refresh_token,
            id_token: self.id_token,
            scope: self.scope,
            session_state: None,
            token_type: self.token_type,
        }
    }
}

pub struct GoogleOAuth {
    config: GoogleConfig,
    http: Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build http client")?;
        Ok(Self { config, http })
    }

    pub fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        let url = Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .context("build google authorize url")?;
        Ok(url.into())
    }

    pub async fn exchange_code(&self, code: &str) -> anyhow::Result<TokenResponse> {
        let res = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("google token request")?
            .error_for_status()
            .context("google token exchange rejected")?;
        res.json::<TokenResponse>()
            .await
            .context("decode google token response")
    }

    pub async fn fetch_profile(&self, access_token: &str) -> anyhow::Result<GoogleProfile> {
        self.http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .context("google userinfo request")?
            .error_for_status()
            .context("google userinfo rejected")?
            .json::<GoogleProfile>()
            .await
            .context("decode google profile")
    }
}
