mod api;
mod booking;
mod bootstrap;
mod config;
mod error;
mod middleware;
mod notifications;
mod payments;
mod reconcile;
mod server;

#[cfg(test)]
mod testing;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,booking_backend=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    info!("🚀 Starting booking backend");

    let config = config::Config::from_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let app = bootstrap::initialize_app(&config)
        .await
        .context("failed to initialize application")?;

    let _poller = app.poller.clone().start();

    let router = server::create_app(app.state, &config).context("failed to build router")?;
    server::run_server(router, &config.bind_address)
        .await
        .with_context(|| format!("server on {} failed", config.bind_address))?;

    Ok(())
}
