use anyhow::Context;
use clap::Parser;
use contacthub::{
    auth::repo::PgUserRepo,
    contacts::repo::PgContactRepo,
    db,
    seed::{self, SeedArgs, SeedError},
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing("contacthub=info,seed=info");
    let args = SeedArgs::parse();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let pool = db::connect(&database_url).await?;
    let users = PgUserRepo::new(pool.clone());
    let contacts = PgContactRepo::new(pool.clone());

    let result = seed::run(&users, &contacts, &args.email, &mut rand::thread_rng()).await;
    pool.close().await;

    match result {
        Ok(report) => {
            tracing::info!(created = report.created, deleted = report.deleted, "done");
            Ok(())
        }
        Err(SeedError::UserNotFound(email)) => {
            tracing::error!(%email, "user not found; create the user first");
            std::process::exit(1);
        }
        Err(SeedError::Storage(e)) => Err(e.context("seeding failed")),
    }
}
