//! # Pipeline
//!
//! One invocation of the telemetry pipeline:
//!
//! ```text
//! enable peripheral
//!   -> read temperature, voltage, clock
//!   -> format JSON body
//!   -> build HTTP frame
//!   -> deliver
//! disable peripheral
//! ```
//!
//! Any failure before delivery aborts the run; nothing partial is sent.
//! The peripheral is disabled on every path once it has been enabled.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::modem::CommandInterface;
use crate::telemetry::reader::TelemetryReader;
use crate::webhook::{
    build_request, Connector, SessionSettings, TransportOutcome, TransportSession,
    WebhookCredentials, WebhookPayload,
};

/// Power control for the hardware the pipeline talks through
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Peripheral: Send {
    async fn enable_peripheral(&mut self) -> Result<()>;

    async fn disable_peripheral(&mut self) -> Result<()>;
}

/// Peripheral with no power control; records the bracket in the log
#[derive(Debug, Clone)]
pub struct LoggingPeripheral {
    name: String,
}

impl LoggingPeripheral {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Peripheral for LoggingPeripheral {
    async fn enable_peripheral(&mut self) -> Result<()> {
        debug!("Peripheral {} enabled", self.name);
        Ok(())
    }

    async fn disable_peripheral(&mut self) -> Result<()> {
        debug!("Peripheral {} disabled", self.name);
        Ok(())
    }
}

/// Everything one invocation needs, owned across invocations
pub struct Pipeline<M, C, P>
where
    M: CommandInterface,
    C: Connector,
    P: Peripheral,
{
    modem: M,
    connector: C,
    peripheral: P,
    credentials: WebhookCredentials,
    settings: SessionSettings,
}

impl<M, C, P> Pipeline<M, C, P>
where
    M: CommandInterface,
    C: Connector,
    P: Peripheral,
{
    pub fn new(
        modem: M,
        connector: C,
        peripheral: P,
        credentials: WebhookCredentials,
        settings: SessionSettings,
    ) -> Self {
        Self {
            modem,
            connector,
            peripheral,
            credentials,
            settings,
        }
    }

    /// Run the pipeline once
    ///
    /// # Returns
    ///
    /// * `Ok(TransportOutcome)` - A request was built and a delivery attempted
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The peripheral cannot be enabled
    /// - A telemetry query fails or its reply has the wrong shape
    /// - Payload or request rendering disagrees with its computed length
    pub async fn run_once(&mut self) -> Result<TransportOutcome> {
        self.peripheral.enable_peripheral().await?;

        let result = self.read_and_deliver().await;

        if let Err(e) = self.peripheral.disable_peripheral().await {
            warn!("Failed to disable peripheral: {}", e);
        }

        match &result {
            Ok(outcome) => info!("Webhook {}", outcome),
            Err(e) => warn!("Run aborted before delivery: {}", e),
        }

        result
    }

    async fn read_and_deliver(&mut self) -> Result<TransportOutcome> {
        let reading = TelemetryReader::new(&mut self.modem).read_all().await?;
        info!(
            "Read temperature {} voltage {} clock {}",
            reading.temperature, reading.voltage, reading.timestamp
        );

        let payload = WebhookPayload::format(&reading)?;
        debug!("Payload: {}", payload);

        let frame = build_request(&self.settings.host, &self.credentials, &payload)?;

        let session = TransportSession::new(&self.connector, &self.settings);
        Ok(session.deliver(&frame).await)
    }
}
