//! weighstation-relay - appends kiosk rows to a Google Sheet.

mod config;
mod error;
mod routes;
mod sheets;

use std::sync::Arc;

use config::AppConfig;
use routes::{app_router, AppState};
use sheets::GoogleSheetsClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("weighstation_relay=info".parse()?),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting weighstation-relay with config: {:?}", config);

    let sheet = GoogleSheetsClient::new(config.clone())?;
    let router = app_router(AppState::new(Arc::new(sheet)));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("weighstation-relay listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
