use product_service::config::ProductConfig;
use product_service::services::{init_metrics, MongoDb};
use product_service::startup::Application;
use service_core::error::AppError;
use service_core::observability::init_tracing;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize metrics recorder (must be before any metrics are recorded)
    init_metrics();

    init_tracing("product-service", "info");

    let config = ProductConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    tracing::info!(uri = %config.mongodb.uri, "Attempting to connect to MongoDB");

    let db = MongoDb::new(&config.mongodb.uri, &config.mongodb.database).await?;

    // The listener comes up before the connection is established; /health
    // reports 503 until the bootstrap below succeeds.
    let app = Application::build(config.clone(), db.clone()).await?;
    let server = tokio::spawn(app.run_until_stopped());

    db.establish(
        config.mongodb.connect_max_attempts,
        Duration::from_millis(config.mongodb.connect_retry_delay_ms),
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to connect to database: {}", e);
        e
    })?;

    db.initialize_indexes().await.map_err(|e| {
        tracing::error!("Failed to initialize database indexes: {}", e);
        e
    })?;

    tokio::select! {
        result = server => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Server error: {}", e),
                Err(e) => tracing::error!("Server task failed: {}", e),
            }
        }
        _ = shutdown_signal() => {}
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
