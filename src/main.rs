//! # Modem Webhook
//!
//! Read modem telemetry over AT commands and post it to a webhook.
//!
//! The pipeline runs on a fixed interval and whenever the process receives
//! `SIGUSR1`, until Ctrl+C.

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use modem_webhook::config::{Config, LoggingConfig};
use modem_webhook::dispatcher::{Activation, TriggerDispatcher};
use modem_webhook::modem::SerialModem;
use modem_webhook::pipeline::{LoggingPeripheral, Pipeline};
use modem_webhook::webhook::TcpConnector;

/// Configuration path used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Log file name prefix inside `log_dir`
const LOG_FILE_PREFIX: &str = "modem-webhook.log";

/// Main entry point for Modem Webhook
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging with tracing subscriber
///    - Open the modem serial port
///    - Spawn the dispatcher worker
///
/// 2. **Main Loop**
///    - Activate on every interval tick (if enabled)
///    - Activate on `SIGUSR1`
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Stop accepting activations
///    - Wait for the in-flight run to finish
///
/// # Errors
///
/// Returns error if:
/// - Configuration cannot be loaded or is invalid
/// - The modem serial port cannot be opened
/// - Signal handlers cannot be installed
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// kill -USR1 $(pidof modem-webhook)
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging)?;

    info!("Modem Webhook v{} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Configuration: {:?}", config);

    let modem = SerialModem::open(&config.modem)?;

    let pipeline = Pipeline::new(
        modem,
        TcpConnector,
        LoggingPeripheral::new(config.modem.port.clone()),
        config.webhook.credentials(),
        config.webhook.session_settings(),
    );

    let (dispatcher, worker) = TriggerDispatcher::spawn(pipeline, config.trigger.busy_policy);

    let mut ticker = config.trigger.interval().map(|period| {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });
    let mut manual = ManualTrigger::new()?;

    match config.trigger.interval() {
        Some(period) => info!("Posting to {} every {}s", config.webhook.host, period.as_secs()),
        None => info!("Periodic posting disabled"),
    }
    info!("Send SIGUSR1 to post now, Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = next_tick(&mut ticker) => {
                report("interval", dispatcher.activate());
            }

            _ = manual.recv() => {
                report("signal", dispatcher.activate());
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    drop(dispatcher);
    worker.await.context("Dispatcher worker panicked")?;

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. With a `log_dir` the output
/// goes to a daily-rotated file; the returned guard must be held until exit.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level {:?}", config.level))?;

    if config.log_dir.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn report(source: &str, activation: Activation) {
    match activation {
        Activation::Queued => info!("Run queued ({})", source),
        Activation::Coalesced => debug!("Run already pending ({})", source),
        Activation::Dropped => warn!("Run in progress, {} activation dropped", source),
        Activation::Closed => warn!("Dispatcher stopped, {} activation ignored", source),
    }
}

/// On-demand activation via `SIGUSR1`
#[cfg(unix)]
struct ManualTrigger(tokio::signal::unix::Signal);

#[cfg(unix)]
impl ManualTrigger {
    fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let usr1 = signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;
        Ok(Self(usr1))
    }

    async fn recv(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
struct ManualTrigger;

#[cfg(not(unix))]
impl ManualTrigger {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}
