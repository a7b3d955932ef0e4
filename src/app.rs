use std::net::SocketAddr;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

use crate::{
    auth::{self, extractors::request_claims, jwt::JwtKeys},
    contacts, interactions, nav,
    paths::{self, site},
    settings,
    state::AppState,
};

/// Page-level access control.
///
/// API routes pass through; their handlers authenticate per request. Signed-in
/// users are bounced off the auth pages, anonymous users off everything that
/// is not public.
pub async fn access_control(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if paths::is_api_route(&path) {
        return next.run(req).await;
    }

    let keys = JwtKeys::from(&state.config.jwt);
    let signed_in = request_claims(req.headers(), &keys).is_some();

    if paths::is_auth_page(&path) {
        if signed_in {
            return Redirect::to(paths::DEFAULT_LOGIN_REDIRECT_PATH).into_response();
        }
        return next.run(req).await;
    }
    if signed_in || paths::is_public_route(&path) {
        return next.run(req).await;
    }

    debug!(%path, "anonymous request to protected page; redirecting to login");
    let target = match req.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };
    Redirect::to(&format!(
        "{}?callbackUrl={}",
        paths::auth::LOGIN,
        urlencoding::encode(&target)
    ))
    .into_response()
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(contacts::router())
        .merge(interactions::router())
        .merge(nav::router())
        .merge(settings::router())
        .route(site::HEALTH, get(|| async { "ok" }))
        .layer(middleware::from_fn_with_state(state.clone(), access_control))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown signal received");
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{password::hash_password, services::issue_tokens},
        memory::{MemoryStore, RecordingMailer},
        paths::{api_app, api_auth},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request as HttpRequest, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn fixture() -> (Router, AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::fake_with(store.clone(), Arc::new(RecordingMailer::default()));
        (build_app(state.clone()), state, store)
    }

    async fn bearer_for(
        state: &AppState,
        store: &MemoryStore,
        email: &str,
    ) -> (String, uuid::Uuid) {
        let user = store.insert_user(email, None, true);
        let keys = JwtKeys::from(&state.config.jwt);
        let tokens = issue_tokens(store, &keys, &user).await.unwrap();
        (format!("Bearer {}", tokens.access_token), user.id)
    }

    async fn body_json(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _, _) = fixture();
        let res = app.oneshot(get(site::HEALTH)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn anonymous_settings_redirects_to_login() {
        let (app, _, _) = fixture();
        let res = app.oneshot(get(paths::protected::SETTINGS_BASE)).await.unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers()[header::LOCATION],
            "/auth/login?callbackUrl=%2Fsettings"
        );
    }

    #[tokio::test]
    async fn signed_in_user_gets_settings_with_etag() {
        let (app, state, store) = fixture();
        let (bearer, user_id) = bearer_for(&state, &store, "a@x.com").await;
        store.insert_contact(user_id, "c@x.com");

        let res = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri(paths::protected::SETTINGS_BASE)
                    .header(header::AUTHORIZATION, &bearer)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let etag = res.headers()[header::ETAG].to_str().unwrap().to_string();
        let body = body_json(res).await;
        assert_eq!(body["contacts"].as_array().unwrap().len(), 1);
        assert_eq!(body["contacts"][0]["viewed"], false);

        let res = app
            .oneshot(
                HttpRequest::builder()
                    .uri(paths::protected::SETTINGS_BASE)
                    .header(header::AUTHORIZATION, &bearer)
                    .header(header::IF_NONE_MATCH, &etag)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn settings_etag_changes_after_direct_store_write() {
        let (app, state, store) = fixture();
        let (bearer, user_id) = bearer_for(&state, &store, "a@x.com").await;
        let settings = |etag: Option<&str>| {
            let mut req = HttpRequest::builder()
                .uri(paths::protected::SETTINGS_BASE)
                .header(header::AUTHORIZATION, &bearer);
            if let Some(etag) = etag {
                req = req.header(header::IF_NONE_MATCH, etag);
            }
            req.body(Body::empty()).unwrap()
        };

        let res = app.clone().oneshot(settings(None)).await.unwrap();
        let etag = res.headers()[header::ETAG].to_str().unwrap().to_string();

        // Written without going through a handler, so nothing is revalidated.
        store.insert_contact(user_id, "seeded@seed.faker");
        let res = app.oneshot(settings(Some(&etag))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_ne!(res.headers()[header::ETAG].to_str().unwrap(), etag);
        let body = body_json(res).await;
        assert_eq!(body["contacts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn signed_in_user_is_bounced_off_login_page() {
        let (app, state, store) = fixture();
        let (bearer, _) = bearer_for(&state, &store, "a@x.com").await;
        let res = app
            .oneshot(
                HttpRequest::builder()
                    .uri(paths::auth::LOGIN)
                    .header(header::AUTHORIZATION, bearer)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers()[header::LOCATION],
            paths::DEFAULT_LOGIN_REDIRECT_PATH
        );
    }

    #[tokio::test]
    async fn contacts_api_requires_session() {
        let (app, _, _) = fixture();
        let res = app.oneshot(get(api_app::CONTACTS_BASE)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["error"], "Unauthenticated");
    }

    #[tokio::test]
    async fn create_contact_returns_location() {
        let (app, state, store) = fixture();
        let (bearer, user_id) = bearer_for(&state, &store, "a@x.com").await;
        let res = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri(api_app::CONTACTS_BASE)
                    .header(header::AUTHORIZATION, bearer)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({
                            "firstName": "Ada",
                            "lastName": "Lovelace",
                            "email": "ada@x.com",
                            "type": "CUSTOMER"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let id = store.contacts_of(user_id)[0].id;
        assert_eq!(res.headers()[header::LOCATION], paths::contact_by_id(id));
        assert_eq!(body_json(res).await["type"], "CUSTOMER");
    }

    #[tokio::test]
    async fn viewed_endpoint_without_session_reports_failure() {
        let (app, _, store) = fixture();
        let owner = store.insert_user("a@x.com", None, true);
        let contact = store.insert_contact(owner.id, "c@x.com");
        let res = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri(paths::contact_viewed(contact.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["success"], false);
        assert_eq!(store.interaction_count(), 0);
    }

    #[tokio::test]
    async fn session_endpoint_is_null_when_anonymous() {
        let (app, _, _) = fixture();
        let res = app.oneshot(get(api_auth::SESSION)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, Value::Null);
    }

    #[tokio::test]
    async fn credentials_sign_in_flow() {
        let (app, _, store) = fixture();
        store.insert_user("a@x.com", Some(&hash_password("password1234").unwrap()), true);

        let res = app.clone().oneshot(get(api_auth::CSRF)).await.unwrap();
        let cookie = res.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        let csrf = body_json(res).await["csrfToken"].as_str().unwrap().to_string();

        let sign_in = |password: &str| {
            HttpRequest::builder()
                .method("POST")
                .uri(api_auth::SIGNIN_CREDENTIALS)
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": "A@x.com", "password": password, "csrfToken": csrf })
                        .to_string(),
                ))
                .unwrap()
        };

        let res = app.clone().oneshot(sign_in("wrong-password")).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["error"], "CredentialsSignin");

        let res = app.oneshot(sign_in("password1234")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let cookies: Vec<_> = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert!(cookies.iter().any(|c| c.starts_with("session_token=")));
        let body = body_json(res).await;
        assert_eq!(body["session"]["user"]["role"], "USER");
        assert_eq!(body["session"]["user"]["email"], "a@x.com");
    }

    #[tokio::test]
    async fn sign_in_without_csrf_is_rejected() {
        let (app, _, store) = fixture();
        store.insert_user("a@x.com", Some(&hash_password("password1234").unwrap()), true);
        let res = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri(api_auth::SIGNIN_CREDENTIALS)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "email": "a@x.com", "password": "password1234" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn google_sign_in_disabled_without_config() {
        let (app, _, _) = fixture();
        let res = app.oneshot(get(api_auth::SIGNIN_GOOGLE)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn login_redirect_keeps_query_string() {
        let (app, _, _) = fixture();
        let res = app.oneshot(get("/settings?tab=x")).await.unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers()[header::LOCATION],
            "/auth/login?callbackUrl=%2Fsettings%3Ftab%3Dx"
        );
    }
}
