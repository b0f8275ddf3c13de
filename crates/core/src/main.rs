use std::sync::Arc;

use anyhow::Context;
use powerguard_core::alert::{AlertSink, ConsoleAlerts};
use powerguard_core::config::GuardCfg;
use powerguard_core::io::console;
use powerguard_core::runtime::{self, Runtime};
use powerguard_core::shutdown::{DryRunShutdown, ShutdownSink, SystemShutdown};
use powerguard_sensor::SampleSource;
use powerguard_sensor::http::{HttpSampleSource, RetryPolicy};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = GuardCfg::from_env();
    init_tracing(cfg.log_json);

    cfg.validate().context("invalid powerguard configuration")?;
    let thresholds = cfg.thresholds();

    let http = HttpSampleSource::new(
        cfg.sensor_url.clone(),
        cfg.request_timeout(),
        RetryPolicy::new(cfg.sensor_retries, cfg.retry_backoff()),
    )
    .context("failed to build sensor client")?;
    let sensor_url = http.url().to_owned();
    let source: Arc<dyn SampleSource> = Arc::new(http);
    let alerts: Arc<dyn AlertSink> = Arc::new(ConsoleAlerts::spawn(cfg.snooze_secs));
    let shutdown: Arc<dyn ShutdownSink> = if cfg.dry_run {
        Arc::new(DryRunShutdown)
    } else {
        Arc::new(SystemShutdown::new(cfg.os_grace_secs))
    };

    tracing::debug!(config = %serde_json::to_string(&cfg)?, "effective configuration");
    tracing::info!(
        sensor = %sensor_url,
        low = cfg.low_battery_percent,
        shutdown = cfg.shutdown_percent,
        dry_run = cfg.dry_run,
        "monitoring started"
    );

    let (mut runtime, event_tx, status_rx) = Runtime::new(thresholds, alerts, shutdown);
    let token = runtime.token();

    let poller = runtime::poll_loop::spawn(
        source,
        event_tx.clone(),
        status_rx.clone(),
        thresholds,
        token.clone(),
    );
    console::spawn_input_thread(event_tx, status_rx, token.clone());

    let outcome = runtime.run().await;
    token.cancel();
    let _ = poller.await;

    outcome
        .into_result()
        .context("countdown expired but host shutdown failed")
}

/// Logs go to stderr so stdout stays free for the countdown surface.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
