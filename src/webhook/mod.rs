//! # Webhook Module
//!
//! Turns a telemetry reading into an HTTP/1.1 POST and delivers it.
//!
//! - `template`: exact-size placeholder rendering
//! - `payload`: JSON body formatting
//! - `request`: HTTP request framing
//! - `policy`: response status classification
//! - `transport`: connection traits and the TCP implementation
//! - `session`: the resolve, connect, send, receive, validate sequence

pub mod payload;
pub mod policy;
pub mod request;
pub mod session;
pub mod template;
pub mod transport;

pub use payload::WebhookPayload;
pub use policy::{MatchPolarity, SuccessPolicy};
pub use request::{build_request, HttpRequestFrame, WebhookCredentials};
pub use session::{SessionSettings, TransportOutcome, TransportSession};
pub use transport::{Connection, Connector, TcpConnector};
