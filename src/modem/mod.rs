//! # Modem Module
//!
//! AT command interface to the cellular modem.
//!
//! This module handles:
//! - Opening the modem serial port
//! - Writing AT commands and collecting the reply up to its final result code
//! - Stripping the command echo and returning the information text

pub mod port_trait;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::config::ModemConfig;
use crate::error::{Result, WebhookError};
use port_trait::{SerialPortIO, TokioSerialPort};

/// Largest reply accepted for a single command, echo included
pub const MAX_RESPONSE_LEN: usize = 256;

/// Query/response text channel to the modem.
///
/// `query` sends one command and returns the information text of the reply
/// (e.g. `%XTEMP: 25` for `AT%XTEMP?`). A failing command or a broken channel
/// is an `Interface` error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandInterface: Send {
    async fn query(&mut self, command: &str) -> Result<String>;
}

/// AT command channel over a serial port
pub struct SerialModem<P: SerialPortIO> {
    port: P,
    command_timeout: Duration,
}

impl<P: SerialPortIO> std::fmt::Debug for SerialModem<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialModem")
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl SerialModem<TokioSerialPort> {
    /// Open the modem serial port described by `config`
    ///
    /// # Errors
    ///
    /// Returns `Serial` if the port cannot be opened.
    pub fn open(config: &ModemConfig) -> Result<Self> {
        let port = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| WebhookError::Serial(format!("Failed to open {}: {}", config.port, e)))?;

        info!("Opened modem at {} ({} baud)", config.port, config.baud_rate);

        Ok(Self::new(
            TokioSerialPort::new(port),
            Duration::from_millis(config.command_timeout_ms),
        ))
    }
}

impl<P: SerialPortIO> SerialModem<P> {
    pub fn new(port: P, command_timeout: Duration) -> Self {
        Self {
            port,
            command_timeout,
        }
    }

    async fn exchange(&mut self, command: &str) -> Result<String> {
        let line = format!("{}\r\n", command);
        self.port
            .write_all(line.as_bytes())
            .await
            .map_err(|e| WebhookError::Interface(format!("Failed to write {}: {}", command, e)))?;
        self.port
            .flush()
            .await
            .map_err(|e| WebhookError::Interface(format!("Failed to flush {}: {}", command, e)))?;

        let mut reply = Vec::with_capacity(MAX_RESPONSE_LEN);
        let mut chunk = [0u8; 64];

        loop {
            let n = self
                .port
                .read(&mut chunk)
                .await
                .map_err(|e| WebhookError::Interface(format!("Failed to read reply: {}", e)))?;

            if n == 0 {
                return Err(WebhookError::Interface(format!(
                    "Modem closed the port during {}",
                    command
                )));
            }

            if reply.len() + n > MAX_RESPONSE_LEN {
                return Err(WebhookError::Interface(format!(
                    "Reply to {} exceeds {} bytes",
                    command, MAX_RESPONSE_LEN
                )));
            }
            reply.extend_from_slice(&chunk[..n]);

            if let Some(result) = parse_reply(command, &reply) {
                return result;
            }
        }
    }
}

#[async_trait]
impl<P: SerialPortIO> CommandInterface for SerialModem<P> {
    async fn query(&mut self, command: &str) -> Result<String> {
        debug!("> {}", command);

        let limit = self.command_timeout;
        let response = timeout(limit, self.exchange(command))
            .await
            .map_err(|_| {
                WebhookError::Interface(format!(
                    "{} timed out after {} ms",
                    command,
                    limit.as_millis()
                ))
            })??;

        debug!("< {}", response);
        Ok(response)
    }
}

/// Final result code that terminates an AT reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinalResult {
    Ok,
    Error,
}

fn final_result(line: &str) -> Option<FinalResult> {
    if line == "OK" {
        Some(FinalResult::Ok)
    } else if line == "ERROR" || line.starts_with("+CME ERROR") || line.starts_with("+CMS ERROR") {
        Some(FinalResult::Error)
    } else {
        None
    }
}

/// Parse an accumulated reply.
///
/// Returns `None` until a complete final result code line has arrived. Only
/// complete lines are inspected; empty lines and the echoed command are
/// skipped, and the remaining information lines are joined with `\n`.
pub fn parse_reply(command: &str, reply: &[u8]) -> Option<Result<String>> {
    let text = String::from_utf8_lossy(reply);
    let complete = match text.rfind('\n') {
        Some(end) => &text[..end],
        None => return None,
    };

    let mut info: Vec<&str> = Vec::new();
    for line in complete.split('\n').map(|l| l.trim_end_matches('\r')) {
        if line.is_empty() || line == command {
            continue;
        }

        match final_result(line) {
            Some(FinalResult::Ok) => return Some(Ok(info.join("\n"))),
            Some(FinalResult::Error) => {
                return Some(Err(WebhookError::Interface(format!(
                    "{} returned {}",
                    command, line
                ))))
            }
            None => info.push(line),
        }
    }

    None
}
