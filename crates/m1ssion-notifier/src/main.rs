//! M1SSION notifier entry point.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use m1ssion_core::clock::{Clock, SystemClock};
use m1ssion_notifications::application::queue::QueueService;
use m1ssion_notifications::application::runtime::QueueRuntime;
use m1ssion_notifications::config::QueueConfig;
use m1ssion_notifier::error::AppError;
use m1ssion_notifier::scenario::{self, Scenario};
use m1ssion_notifier::subscriber::LoggingSubscriber;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting M1SSION notifier");

    run().await.map_err(|e| {
        tracing::error!(error = %e, "notifier failed");
        e.into()
    })
}

async fn run() -> Result<(), AppError> {
    // Read configuration from arguments and environment.
    let scenario_path: PathBuf = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("M1SSION_SCENARIO").ok())
        .map(PathBuf::from)
        .ok_or_else(|| {
            AppError::Config(
                "pass a scenario path as the first argument or set M1SSION_SCENARIO".to_owned(),
            )
        })?;
    let settle_timeout_ms: u64 = std::env::var("M1SSION_SETTLE_TIMEOUT_MS")
        .unwrap_or_else(|_| "30000".to_owned())
        .parse()
        .map_err(|e| AppError::Config(format!("M1SSION_SETTLE_TIMEOUT_MS must be a u64: {e}")))?;

    let scenario = Scenario::load(&scenario_path)?;
    let config = scenario.queue_config(QueueConfig::from_env()?);
    tracing::info!(?config, path = %scenario_path.display(), "scenario loaded");

    // Build the queue and hand it to its runtime task.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = QueueService::new(config, clock)?;
    let (handle, task) = QueueRuntime::spawn(service);
    handle
        .subscribe(Box::new(LoggingSubscriber::new()))
        .await?;

    let outcome = scenario::play(
        &scenario,
        &handle,
        Duration::from_millis(settle_timeout_ms),
    )
    .await?;
    tracing::info!(
        idle = outcome.is_idle(),
        pending = outcome.pending.len(),
        "scenario finished"
    );

    handle.shutdown();
    if let Err(e) = task.await {
        tracing::warn!(error = %e, "queue runtime did not shut down cleanly");
    }

    Ok(())
}
