use anyhow::Result;
use clap::Parser;

use blob_walkthrough::cli::{self, Cli};
use blob_walkthrough::{config, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_telemetry(cli.log_json)?;
    // A malformed .env should not stop the walkthrough; settings validation reports what is missing.
    if let Err(e) = config::load_env_file() {
        tracing::warn!("Ignoring .env file: {}", e);
    }

    cli::execute(cli).await
}
