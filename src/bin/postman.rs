use std::path::PathBuf;

use clap::Parser;
use contacthub::{postman, telemetry};

#[derive(Parser, Debug)]
#[clap(name = "postman", about = "Generate the Postman collection and environment for the API")]
struct Cli {
    /// Directory the two JSON files are written to
    #[clap(long, default_value = "postman")]
    out_dir: PathBuf,

    /// Value of the `baseUrl` environment variable
    #[clap(long, default_value = "http://localhost:8080")]
    base_url: String,
}

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("contacthub=info,postman=info");
    let cli = Cli::parse();

    let (collection, environment) = postman::write_files(&cli.out_dir, &cli.base_url)?;
    tracing::info!(path = %collection.display(), "postman collection saved");
    tracing::info!(path = %environment.display(), "postman environment saved");
    tracing::info!("import both files in Postman, select the environment, then follow the README folder");
    Ok(())
}
