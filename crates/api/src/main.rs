use std::sync::Arc;

use anyhow::Context;

use brewline_infra::{AppConfig, MemoryStore, PgStore, Services, Storage, StorageBackend, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    brewline_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let store: Arc<dyn Storage> = match config.storage {
        StorageBackend::Postgres => {
            let pool = db::connect(&config.database)
                .await
                .context("failed to connect to postgres")?;
            db::apply_schema(&pool).await.context("failed to apply schema")?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("BREWLINE_STORAGE=memory; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let services = Arc::new(Services::new(store, config.settlement_timeout));
    let app = brewline_api::app::build_app(services);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
