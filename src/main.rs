use heyspruce_api::config;
use heyspruce_api::server::{self, AppState, Backends};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up SUPABASE_URL, STRIPE_WEBHOOK_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    config.validate()?;
    tracing::info!("Starting Hey Spruce API in {:?} mode", config.environment);

    let backends = Backends::from_config(config)?;
    let state = AppState::new(config, backends)?;

    server::serve(state, config.server.port).await
}
