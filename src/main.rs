use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use lessonbook::audit::TracingAuditSink;
use lessonbook::booking::BookingService;
use lessonbook::clock::SystemClock;
use lessonbook::config::Config;
use lessonbook::escalation::EscalationScheduler;
use lessonbook::notify::NotifyHub;
use lessonbook::store::{run_compactor, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    lessonbook::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(Store::open(config.wal_path())?);
    let clock = Arc::new(SystemClock);
    let service = Arc::new(BookingService::new(
        store.clone(),
        Arc::new(TracingAuditSink),
        Arc::new(NotifyHub::new()),
        clock.clone(),
    ));
    let scheduler = Arc::new(EscalationScheduler::new(
        service,
        store.clone(),
        clock,
        config.escalation,
    ));

    info!("lessonbook started");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  escalation threshold: {}h", config.escalation.threshold / lessonbook::model::HOUR_MS);
    info!("  escalation interval: {}ms", config.escalation.interval.as_millis());
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx.clone()));
    let compactor_task = tokio::spawn(run_compactor(store, config.compact_threshold, shutdown_rx));

    // Graceful shutdown on SIGTERM/ctrl-c
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    info!("shutdown signal received, stopping background tasks");
    let _ = shutdown_tx.send(true);

    let drain = async {
        let _ = scheduler_task.await;
        let _ = compactor_task.await;
    };
    if tokio::time::timeout(Duration::from_secs(10), drain).await.is_err() {
        tracing::warn!("background tasks did not stop within 10s");
    }

    info!("lessonbook stopped");
    Ok(())
}
