//! # Payload Formatter
//!
//! Renders a [`TelemetryReading`] into the fixed-shape webhook JSON body.

use std::fmt;

use crate::error::{Result, WebhookError};
use crate::telemetry::{TelemetryReading, TEMPERATURE_WIDTH, TIMESTAMP_WIDTH, VOLTAGE_WIDTH};

use super::template::Template;

/// JSON body template, one placeholder per telemetry field
pub const PAYLOAD_TEMPLATE: Template =
    Template::new(r#"{"value1":"%s","value2":"%s","value3":"%s"}"#);

/// Body length for readings at their declared field widths
pub const PAYLOAD_LEN: usize =
    PAYLOAD_TEMPLATE.fixed_len() + TEMPERATURE_WIDTH + VOLTAGE_WIDTH + TIMESTAMP_WIDTH;

/// Body length computed from field lengths alone
pub fn payload_len(temperature: usize, voltage: usize, timestamp: usize) -> usize {
    PAYLOAD_TEMPLATE.rendered_len(&[temperature, voltage, timestamp])
}

/// Formatted webhook body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookPayload {
    body: String,
}

impl WebhookPayload {
    /// Format a reading into the webhook body
    ///
    /// # Returns
    ///
    /// * `Result<WebhookPayload>` - Body of exactly
    ///   [`payload_len`] bytes for the reading's field lengths
    ///
    /// # Errors
    ///
    /// Returns `InternalSizeMismatch` if the rendered body length disagrees
    /// with the computed one.
    ///
    /// # Examples
    ///
    /// ```
    /// use modem_webhook::telemetry::TelemetryReading;
    /// use modem_webhook::webhook::payload::WebhookPayload;
    ///
    /// let reading = TelemetryReading::new("25", "3700", "20/01/01,00:00:00+00")?;
    /// let payload = WebhookPayload::format(&reading)?;
    /// assert_eq!(
    ///     payload.as_str(),
    ///     r#"{"value1":"25","value2":"3700","value3":"20/01/01,00:00:00+00"}"#
    /// );
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn format(reading: &TelemetryReading) -> Result<Self> {
        let expected = payload_len(
            reading.temperature.len(),
            reading.voltage.len(),
            reading.timestamp.len(),
        );

        let bytes = PAYLOAD_TEMPLATE.render_exact(
            &[
                reading.temperature.as_str().as_bytes(),
                reading.voltage.as_str().as_bytes(),
                reading.timestamp.as_str().as_bytes(),
            ],
            expected,
        )?;

        let body = String::from_utf8(bytes)
            .map_err(|e| WebhookError::InvalidReading(format!("payload is not UTF-8: {}", e)))?;

        Ok(Self { body })
    }

    pub fn as_str(&self) -> &str {
        &self.body
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.body.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

impl fmt::Display for WebhookPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}
