use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use planetarium::{
    build_router,
    config::{Config, LogFormat, StorageKind},
    database::Database,
    store::{MemoryStore, PlanetariumStore},
    AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.app.rust_log)
        .unwrap_or_else(|_| EnvFilter::new("planetarium=info,tower_http=info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn PlanetariumStore>> {
    match config.app.storage {
        StorageKind::Memory => {
            info!("Using in-memory storage");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageKind::Postgres => {
            let db = Database::from_config(&config.database)
                .await
                .context("failed to connect to database")?
                .context("DATABASE_URL is not configured")?;
            info!("Database connected");
            db.run_migrations()
                .await
                .context("failed to run migrations")?;
            Ok(Arc::new(db.store()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config);

    info!(environment = %config.app.environment, "Starting Planetarium API");

    let store = open_store(&config).await?;
    let state = AppState::new(config.clone(), store);

    if let (Some(email), Some(password)) = (&config.auth.staff_email, &config.auth.staff_password) {
        state
            .ensure_staff_account(email, password)
            .await
            .context("failed to provision staff account")?;
    }

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("HOST/PORT do not form a socket address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
