//! # Modem Webhook Library
//!
//! Read temperature, battery voltage and network time from a cellular modem
//! over AT commands and post them to an IFTTT-style webhook.
//!
//! This library provides the telemetry reader, the exact-size payload and
//! request builders, the HTTP/1.1 transport session and the dispatcher that
//! runs the pipeline once per activation.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod modem;
pub mod pipeline;
pub mod telemetry;
pub mod webhook;
