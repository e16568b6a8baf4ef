//! TaskHub Server: due-date reminders and periodic cleanup.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt};

use taskhub_api::{AppState, build_router};
use taskhub_core::config::{AppConfig, BrokerBackend, LogFormat};
use taskhub_core::error::AppError;
use taskhub_core::traits::{Clock, SystemClock};
use taskhub_database::DatabasePool;
use taskhub_database::migration::run_migrations;
use taskhub_database::repositories::{JobRepository, NotificationRepository, RecordRepository};
use taskhub_entity::job::QueueName;
use taskhub_worker::jobs::{CleanupJobHandler, ReminderJobHandler};
use taskhub_worker::{
    CleanupScheduler, EventPublisher, InMemoryBroker, JobBroker, JobExecutor,
    LifecycleEventBridge, PgBroker, PgRecordStore, PgReminderDelivery, QueueClient, RecordStore,
    ReminderDelivery, ReminderScheduler, RetentionSweeper, WorkerPool, WorkerPoolConfig,
};

/// Lifecycle events buffered between the HTTP ingest and the bridge.
const EVENT_BUFFER: usize = 1024;

#[tokio::main]
async fn main() {
    let env = std::env::var("TASKHUB_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting TaskHub v{}", env!("CARGO_PKG_VERSION"));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // ── Step 1: Database connection + migrations ─────────────────
    let db = DatabasePool::connect(&config.database).await?;
    if !db.health_check().await? {
        return Err(AppError::service_unavailable(
            "Database did not answer the connectivity check",
        ));
    }
    run_migrations(db.pool()).await?;
    let pg = db.pool().clone();

    // ── Step 2: Broker and collaborators ─────────────────────────
    let broker: Arc<dyn JobBroker> = match config.broker.backend {
        BrokerBackend::Postgres => Arc::new(PgBroker::new(
            Arc::new(JobRepository::new(pg.clone())),
            Arc::clone(&clock),
        )),
        BrokerBackend::Memory => {
            tracing::warn!("Using the in-memory broker: jobs are lost on restart");
            Arc::new(InMemoryBroker::new(Arc::clone(&clock)))
        }
    };
    tracing::info!(backend = ?config.broker.backend, "Job broker ready");

    let records: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(
        Arc::new(RecordRepository::new(pg.clone())),
        Arc::clone(&clock),
    ));
    let delivery: Arc<dyn ReminderDelivery> = Arc::new(PgReminderDelivery::new(
        Arc::new(NotificationRepository::new(pg.clone())),
        Arc::clone(&clock),
    ));

    let reminder_queue = QueueClient::new(QueueName::Reminder, Arc::clone(&broker), Arc::clone(&clock));
    let cleanup_queue = QueueClient::new(QueueName::Cleanup, Arc::clone(&broker), Arc::clone(&clock));

    // ── Step 3: Shutdown channel, event bridge, workers ──────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    let (events, event_rx) = EventPublisher::channel(EVENT_BUFFER);
    let bridge = LifecycleEventBridge::new(
        ReminderScheduler::new(reminder_queue.clone()),
        Arc::clone(&records),
    );
    tasks.push(tokio::spawn(bridge.run(event_rx, shutdown_rx.clone())));

    if config.worker.enabled {
        let worker_id = format!("worker-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);

        let mut executor = JobExecutor::new();
        executor.register(Arc::new(ReminderJobHandler::new(
            Arc::clone(&records),
            delivery,
        )));
        executor.register(Arc::new(CleanupJobHandler::new(Arc::clone(&records))));
        let executor = Arc::new(executor);

        for queue in QueueName::ALL {
            let pool = WorkerPool::new(
                queue,
                Arc::clone(&broker),
                Arc::clone(&executor),
                Arc::clone(&clock),
                WorkerPoolConfig::for_queue(queue, &config.worker, &config.broker),
                format!("{worker_id}-{queue}"),
            );
            tasks.push(tokio::spawn(pool.run(shutdown_rx.clone())));
        }

        let sweeper = RetentionSweeper::new(Arc::clone(&broker), Arc::clone(&clock), &config.broker);
        tasks.push(tokio::spawn(sweeper.run(shutdown_rx.clone())));
    } else {
        tracing::warn!("Workers disabled: jobs are enqueued but not processed by this process");
    }

    // ── Step 4: Cleanup trigger ──────────────────────────────────
    let cleanup = Arc::new(CleanupScheduler::new(cleanup_queue.clone(), config.cleanup.clone()).await?);
    cleanup.start().await?;
    if let Ok(Some(next)) = cleanup.next_fire().await {
        tracing::info!(next_fire = %next, "Next scheduled cleanup");
    }

    // ── Step 5: HTTP server ──────────────────────────────────────
    let state = AppState {
        reminder_queue,
        cleanup_queue,
        cleanup: Arc::clone(&cleanup),
        events,
        clock,
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("TaskHub server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    // ── Step 6: Drain background tasks ───────────────────────────
    if let Err(e) = cleanup.shutdown().await {
        tracing::warn!(error = %e, "Cleanup scheduler did not shut down cleanly");
    }

    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let drain = drain_tasks(tasks);
    if tokio::time::timeout(grace, drain).await.is_err() {
        tracing::warn!("Background tasks still running after the shutdown grace period");
    }

    db.close().await;
    tracing::info!("TaskHub stopped");
    Ok(())
}

async fn drain_tasks(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task panicked");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
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
}
