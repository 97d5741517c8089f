mod consumer;
mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use engine::config::app_config;
use engine::crypto::Crypto;
use engine::pool::SmtpPool;
use engine::queue::JobQueue;
use engine::store::Store;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;

#[tokio::main]
async fn main() {
    engine::tracer::init();

    let config = app_config();

    let db = Database::connect(&config.database_url)
        .await
        .unwrap_or_else(|e| panic!("[DB] failed to connect: {e}"));

    tracing::info!("[DB] running migrations");
    Migrator::up(&db, None)
        .await
        .unwrap_or_else(|e| panic!("[DB] failed to run migrations: {e}"));

    let store = Store::new(db);

    let crypto = Arc::new(Crypto::from_base64_key(&config.encryption_key_base64).expect("invalid encryption key"));
    let pool = Arc::new(SmtpPool::new(config, crypto));

    let queue = JobQueue::connect(&config.rmq_uri, config.rmq_tick_queue.clone(), config.rmq_send_queue.clone())
        .await
        .unwrap_or_else(|e| panic!("[RMQ] failed to connect: {e}"));

    let shutdown_state = shutdown::Shutdown::new();
    shutdown::install(shutdown_state.clone());

    let tick_handle = tokio::spawn(consumer::run_tick_consumer(store.clone(), queue.clone(), config, shutdown_state.clone()));
    let send_handle = tokio::spawn(consumer::run_send_consumer(
        store.clone(),
        queue.clone(),
        pool.clone(),
        config,
        shutdown_state.clone(),
    ));
    let background_handle = tokio::spawn(consumer::run_background_ticks(
        store.clone(),
        queue.clone(),
        pool.clone(),
        shutdown_state.clone(),
    ));

    while !shutdown_state.requested() {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    tracing::info!("shutdown requested, waiting for in-flight jobs to drain");
    shutdown_state.wait_for_drain(Duration::from_secs(30)).await;

    let _ = tokio::join!(tick_handle, send_handle, background_handle);

    if let Err(e) = store.connection().clone().close().await {
        tracing::error!(error = %e, "failed to close postgres connection cleanly");
    }

    tracing::info!("worker shut down");
}
