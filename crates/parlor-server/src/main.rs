use std::sync::Arc;

use tracing::info;

use parlor_api::auth::{AppState, AppStateInner};
use parlor_api::tokens::TokenKeys;
use parlor_db::Database;
use parlor_gateway::hub::Hub;
use parlor_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parlor=debug,parlor_server=debug,parlor_api=debug,parlor_gateway=debug,parlor_db=debug,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.database_path)?);

    // Shared state
    let tokens = TokenKeys::new(&config.jwt_secret, config.jwt_ttl);
    let app_state: AppState = Arc::new(AppStateInner::new(db.clone(), tokens));
    let hub = Hub::new(db);

    let app = parlor_server::router(app_state, hub);

    let addr = config.addr()?;
    info!("Parlor server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
