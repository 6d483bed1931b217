//! # Telemetry Module
//!
//! Typed telemetry fields read from the modem.
//!
//! This module handles:
//! - Fixed-width field types (temperature, voltage, timestamp)
//! - Field validation (width, printable ASCII, JSON-safe)
//! - Reading the fields over the command interface (see [`reader`])

pub mod reader;

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime};

use crate::error::{Result, WebhookError};

/// Temperature field width (`%XTEMP: 25`)
pub const TEMPERATURE_WIDTH: usize = 2;

/// Battery voltage field width in millivolts (`%XVBAT: 3700`)
pub const VOLTAGE_WIDTH: usize = 4;

/// Timestamp field width, the length of `18/12/06,22:10:00+08`
pub const TIMESTAMP_WIDTH: usize = "18/12/06,22:10:00+08".len();

/// A string of exactly `WIDTH` printable ASCII characters.
///
/// Quote and backslash are rejected so a field can be dropped into a JSON
/// string literal without escaping.
///
/// # Examples
///
/// ```
/// use modem_webhook::telemetry::FixedField;
///
/// let field = FixedField::<2>::new("25").unwrap();
/// assert_eq!(field.as_str(), "25");
/// assert!(FixedField::<2>::new("5").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedField<const WIDTH: usize>(String);

impl<const WIDTH: usize> FixedField<WIDTH> {
    /// Validate and wrap a field value
    ///
    /// # Errors
    ///
    /// Returns `InvalidReading` if the value is not exactly `WIDTH` bytes of
    /// printable ASCII, or contains `"` or `\`.
    pub fn new(value: &str) -> Result<Self> {
        if value.len() != WIDTH {
            return Err(WebhookError::InvalidReading(format!(
                "expected {} characters, got {} in {:?}",
                WIDTH,
                value.len(),
                value
            )));
        }

        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_graphic() || *c == '"' || *c == '\\')
        {
            return Err(WebhookError::InvalidReading(format!(
                "illegal character {:?} in {:?}",
                c, value
            )));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const WIDTH: usize> fmt::Display for FixedField<WIDTH> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Modem temperature in degrees Celsius
pub type Temperature = FixedField<TEMPERATURE_WIDTH>;

/// Battery voltage in millivolts
pub type Voltage = FixedField<VOLTAGE_WIDTH>;

/// Network clock, `yy/MM/dd,hh:mm:ss±zz`
pub type Timestamp = FixedField<TIMESTAMP_WIDTH>;

impl Timestamp {
    /// Parse the modem clock into a timezone-aware date.
    ///
    /// The zone suffix counts quarter hours (3GPP TS 27.007 `+CCLK`).
    ///
    /// # Errors
    ///
    /// Returns `ProtocolMismatch` if the field is not shaped like
    /// `18/12/06,22:10:00+08`.
    pub fn to_datetime(&self) -> Result<DateTime<FixedOffset>> {
        let mismatch = || {
            WebhookError::ProtocolMismatch(format!("malformed modem clock {:?}", self.0))
        };

        let (local, zone) = self.0.split_at(17);
        let naive =
            NaiveDateTime::parse_from_str(local, "%y/%m/%d,%H:%M:%S").map_err(|_| mismatch())?;

        let (sign, quarters) = zone.split_at(1);
        if quarters.len() != 2 || !quarters.bytes().all(|b| b.is_ascii_digit()) {
            return Err(mismatch());
        }
        let quarters: i32 = quarters.parse().map_err(|_| mismatch())?;
        let seconds = quarters * 15 * 60;
        let offset = match sign {
            "+" => FixedOffset::east_opt(seconds),
            "-" => FixedOffset::west_opt(seconds),
            _ => None,
        }
        .ok_or_else(mismatch)?;

        naive.and_local_timezone(offset).single().ok_or_else(mismatch)
    }
}

/// One set of readings taken during a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryReading {
    pub temperature: Temperature,
    pub voltage: Voltage,
    pub timestamp: Timestamp,
}

impl TelemetryReading {
    /// Build a reading from raw strings, validating every field width.
    pub fn new(temperature: &str, voltage: &str, timestamp: &str) -> Result<Self> {
        Ok(Self {
            temperature: Temperature::new(temperature)?,
            voltage: Voltage::new(voltage)?,
            timestamp: Timestamp::new(timestamp)?,
        })
    }
}
