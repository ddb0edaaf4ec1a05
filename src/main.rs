use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use ldn_outbox::config::Settings;
use ldn_outbox::delivery::HttpDeliveryClient;
use ldn_outbox::message::InMemoryResourceStore;
use ldn_outbox::postgres::PostgresPool;
use ldn_outbox::server::{create_app, AppState};
use ldn_outbox::tasks::{QueueDrainTask, TimeoutReaperTask};
use ldn_outbox::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new().context("Failed to load configuration")?;

    let _telemetry = init_telemetry(&settings.log, &settings.otel)?;
    tracing::info!("Configuration loaded");

    let postgres_pool = match &settings.database {
        Some(db) => {
            let pool = PostgresPool::new(db)
                .await
                .context("Failed to connect to PostgreSQL")?;
            if db.run_migrations {
                pool.run_migrations().await?;
            }
            Some(pool)
        }
        None => None,
    };

    let delivery = Arc::new(HttpDeliveryClient::new(&settings.delivery)?);
    // Standalone deployments have no repository attached; the embedding
    // application supplies its own resolver through AppState::new.
    let resources = Arc::new(InMemoryResourceStore::new());

    let state = AppState::new(settings.clone(), postgres_pool.clone(), resources, delivery)?;
    tracing::info!("Application state initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let drain_task = QueueDrainTask::new(
        &settings.queue,
        state.queue_manager.clone(),
        shutdown_tx.subscribe(),
    );
    let drain_handle = tokio::spawn(drain_task.run());

    let reaper_task = TimeoutReaperTask::new(
        &settings.queue,
        state.reaper.clone(),
        shutdown_tx.subscribe(),
    );
    let reaper_handle = tokio::spawn(reaper_task.run());

    let app = create_app(state);

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    tracing::info!("Waiting for background tasks to finish...");
    let _ = tokio::join!(drain_handle, reaper_handle);

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop drain and reaper tasks
    let _ = shutdown_tx.send(());
}
