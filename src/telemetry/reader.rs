//! # Telemetry Reader
//!
//! Queries the modem and extracts fixed-width fields from its replies.

use tracing::{debug, warn};

use super::{FixedField, TelemetryReading, Temperature, Timestamp, Voltage};
use super::{TEMPERATURE_WIDTH, TIMESTAMP_WIDTH, VOLTAGE_WIDTH};
use crate::error::{Result, WebhookError};
use crate::modem::CommandInterface;

/// One command-interface query and the shape of its reply.
///
/// A reply looks like `<tag><separator><field>...`; `prefix` is the tag plus
/// separator, and the field is the `width` characters that follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryQuery {
    pub command: &'static str,
    pub tag: &'static str,
    pub prefix: &'static str,
    pub width: usize,
}

/// Internal die temperature
pub const TEMPERATURE_QUERY: TelemetryQuery = TelemetryQuery {
    command: "AT%XTEMP?",
    tag: "%XTEMP:",
    prefix: "%XTEMP: ",
    width: TEMPERATURE_WIDTH,
};

/// Supply voltage
pub const VOLTAGE_QUERY: TelemetryQuery = TelemetryQuery {
    command: "AT%XVBAT",
    tag: "%XVBAT:",
    prefix: "%XVBAT: ",
    width: VOLTAGE_WIDTH,
};

/// Network clock, quoted in the reply
pub const CLOCK_QUERY: TelemetryQuery = TelemetryQuery {
    command: "AT+CCLK?",
    tag: "+CCLK:",
    prefix: "+CCLK: \"",
    width: TIMESTAMP_WIDTH,
};

/// Strip the tag from a reply and return exactly `query.width` characters.
///
/// The reply may carry unsolicited result codes (e.g. `+CEREG: 5`) next to
/// the answer; only the first line starting with `query.tag` is inspected.
///
/// # Errors
///
/// Returns `ProtocolMismatch` if:
/// - no line of the reply starts with `query.tag`
/// - the tagged line is the bare tag (the modem has no value to report)
/// - the tagged line does not start with `query.prefix`
/// - fewer than `query.width` characters follow the prefix
///
/// # Examples
///
/// ```
/// use modem_webhook::telemetry::reader::{extract_field, VOLTAGE_QUERY};
///
/// assert_eq!(extract_field(&VOLTAGE_QUERY, "%XVBAT: 3700").unwrap(), "3700");
/// assert_eq!(extract_field(&VOLTAGE_QUERY, "+CEREG: 5\n%XVBAT: 3700").unwrap(), "3700");
/// assert!(extract_field(&VOLTAGE_QUERY, "%XVBAT:").is_err());
/// ```
pub fn extract_field<'r>(query: &TelemetryQuery, response: &'r str) -> Result<&'r str> {
    let line = response
        .lines()
        .map(|line| line.trim_end_matches(|c| c == '\r' || c == '\n'))
        .find(|line| line.starts_with(query.tag))
        .ok_or_else(|| {
            WebhookError::ProtocolMismatch(format!(
                "no {} line in {:?}",
                query.tag, response
            ))
        })?;

    if line == query.tag {
        return Err(WebhookError::ProtocolMismatch(format!(
            "{} reported no value",
            query.tag
        )));
    }

    let rest = line.strip_prefix(query.prefix).ok_or_else(|| {
        WebhookError::ProtocolMismatch(format!(
            "expected {:?} prefix, got {:?}",
            query.prefix, line
        ))
    })?;

    rest.get(..query.width).ok_or_else(|| {
        WebhookError::ProtocolMismatch(format!(
            "expected {} characters after {:?}, got {:?}",
            query.width, query.prefix, rest
        ))
    })
}

/// Reads telemetry fields over a borrowed command interface.
pub struct TelemetryReader<'a, M: CommandInterface + ?Sized> {
    modem: &'a mut M,
}

impl<'a, M: CommandInterface + ?Sized> TelemetryReader<'a, M> {
    pub fn new(modem: &'a mut M) -> Self {
        Self { modem }
    }

    pub async fn read_temperature(&mut self) -> Result<Temperature> {
        self.read_field(&TEMPERATURE_QUERY).await
    }

    pub async fn read_voltage(&mut self) -> Result<Voltage> {
        self.read_field(&VOLTAGE_QUERY).await
    }

    /// Read the network clock.
    ///
    /// On top of the width check the value must parse as
    /// `yy/MM/dd,hh:mm:ss±zz`.
    pub async fn read_timestamp(&mut self) -> Result<Timestamp> {
        let timestamp: Timestamp = self.read_field(&CLOCK_QUERY).await?;
        let parsed = timestamp.to_datetime()?;
        debug!("Modem clock: {}", parsed.to_rfc3339());
        Ok(timestamp)
    }

    /// Read temperature, voltage and clock, stopping at the first failure.
    pub async fn read_all(&mut self) -> Result<TelemetryReading> {
        let temperature = self.read_temperature().await?;
        let voltage = self.read_voltage().await?;
        let timestamp = self.read_timestamp().await?;

        Ok(TelemetryReading {
            temperature,
            voltage,
            timestamp,
        })
    }

    async fn read_field<const WIDTH: usize>(
        &mut self,
        query: &TelemetryQuery,
    ) -> Result<FixedField<WIDTH>> {
        let response = self.modem.query(query.command).await.map_err(|e| {
            warn!("{} failed: {}", query.command, e);
            e
        })?;

        let raw = extract_field(query, &response).map_err(|e| {
            warn!("Unexpected response to {}: {:?}", query.command, response);
            e
        })?;

        FixedField::new(raw).map_err(|e| match e {
            WebhookError::InvalidReading(msg) => {
                warn!("Unexpected response to {}: {:?}", query.command, response);
                WebhookError::ProtocolMismatch(msg)
            }
            other => other,
        })
    }
}
