use std::sync::Arc;

use anyhow::{Context, Result};
use persistence::{MemoryTableStore, PgTableStore, SharedStore};
use tracing::info;

use retreat_portal_api::app::{create_app, AppState};
use retreat_portal_api::config::Config;
use retreat_portal_api::middleware::{init_metrics, logging::init_logging};
use retreat_portal_api::services::email::build_email_transport;
use retreat_portal_api::services::whatsapp::CloudApiWhatsAppTransport;

/// Opens the configured store and its privilege-elevated counterpart.
async fn open_stores(config: &Config) -> Result<(SharedStore, SharedStore)> {
    if config.store.is_postgres() {
        let pool_config = config.database.pool_config();
        let pool = persistence::db::create_pool(&pool_config)
            .await
            .context("connecting to database")?;

        info!("Running database migrations...");
        persistence::db::run_migrations(&pool).await?;
        info!("Migrations completed");

        let store: SharedStore = Arc::new(PgTableStore::new(pool));
        let elevated_url = config.database.elevated_url.trim();
        if elevated_url.is_empty() {
            return Ok((store.clone(), store));
        }

        let elevated_pool = persistence::db::create_pool(&pool_config.with_url(elevated_url))
            .await
            .context("connecting to elevated database")?;
        return Ok((store, Arc::new(PgTableStore::new(elevated_pool))));
    }

    let data_file = config.store.data_file.trim();
    let memory = if data_file.is_empty() {
        info!("Using in-process memory store");
        MemoryTableStore::new()
    } else {
        info!(path = %data_file, "Using file-backed memory store");
        MemoryTableStore::open(data_file)
            .await
            .with_context(|| format!("opening {}", data_file))?
    };
    let elevated = memory.elevated();
    Ok((Arc::new(memory), Arc::new(elevated)))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    init_logging(&config.logging)?;
    init_metrics()?;

    info!("Starting Retreat Portal API v{}", env!("CARGO_PKG_VERSION"));

    let (store, elevated_store) = open_stores(&config).await?;

    let email = build_email_transport(&config.email);
    let whatsapp = Arc::new(CloudApiWhatsAppTransport::new(config.whatsapp.clone())?);
    let addr = config.socket_addr()?;

    let state = AppState::new(config, store, elevated_store, email, whatsapp)?;
    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
