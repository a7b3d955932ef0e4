use std::sync::Arc;

use contacthub::{app, config::AppConfig, db, state::AppState, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing("contacthub=debug,axum=info,tower_http=info");

    let config = Arc::new(AppConfig::from_env()?);
    let pool = db::connect(&config.database_url).await?;
    db::migrate(&pool).await?;

    let state = AppState::from_pool(pool.clone(), config)?;
    app::serve(app::build_app(state)).await?;

    pool.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}
