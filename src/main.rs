//! eventlog server binary

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eventlog::api::{self, AppState};
use eventlog::config::{AppConfig, LogFormat};
use eventlog::pubsub::PubSubBus;
use eventlog::store::NamespaceStoreManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging);

    tracing::info!(
        data_dir = %config.storage.data_dir,
        durability = ?config.storage.durability,
        "starting eventlog"
    );

    let store = std::sync::Arc::new(NamespaceStoreManager::open(
        config.storage.data_dir.clone().into(),
        config.storage.durability,
    )?);
    let bus = PubSubBus::new();

    let state = AppState {
        store,
        bus,
        compress: true,
    };
    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(logging: &eventlog::config::LoggingSection) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("eventlog={},tower_http=info", logging.level).into());

    match logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
