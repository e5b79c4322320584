use std::path::Path;

use anyhow::Context;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

use bookhive::App;
use bookhive::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (logs). Respect RUST_LOG if set, default to info for
    // our crate and warn for deps.
    let default_filter = format!(
        "{}=info,reqwest=warn,h2=warn,sqlx=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting bookhive engine"
    );

    // Load environment variables from .env files
    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load();
    match config.validate() {
        Ok(_) => {}
        Err(e) => {
            return Err(anyhow::anyhow!(e));
        }
    }

    let mut app = App::build(&config).await?;
    app.start();

    tokio::signal::ctrl_c()
        .await
        .with_context(|| "Failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received");
    app.stop();
    Ok(())
}
