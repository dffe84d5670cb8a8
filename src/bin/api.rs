use teller_agent::{api::start_server, config::AppConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    let config = AppConfig::from_env()?;

    info!("Teller Agent - API Server");
    info!(
        port = config.port,
        max_verification_attempts = config.max_verification_attempts,
        origins = ?config.allowed_origins,
        "Configuration loaded"
    );

    start_server(config).await?;

    Ok(())
}
