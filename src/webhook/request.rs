//! # Request Builder
//!
//! Renders the HTTP/1.1 POST frame that carries a [`WebhookPayload`].
//!
//! ```text
//! POST /trigger/<event>/with/key/<key> HTTP/1.1\r\n
//! Host: <host>\r\n
//! Content-Type: application/json\r\n
//! Content-Length: <n>\r\n
//! \r\n
//! <body>\r\n
//! ```
//!
//! The frame length is computed first, a buffer of exactly that size is
//! filled, and the two must agree.

use bytes::Bytes;
use tracing::debug;

use super::payload::WebhookPayload;
use super::template::{decimal_digits, Template};
use crate::error::Result;

/// Request template: event, key, host, content length, body
pub const REQUEST_TEMPLATE: Template = Template::new(
    "POST /trigger/%s/with/key/%s HTTP/1.1\r\n\
     Host: %s\r\n\
     Content-Type: application/json\r\n\
     Content-Length: %s\r\n\
     \r\n\
     %s\r\n",
);

/// Webhook delivery credentials
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookCredentials {
    pub event: String,
    pub key: String,
}

impl std::fmt::Debug for WebhookCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookCredentials")
            .field("event", &self.event)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Frame length computed from the argument lengths alone
///
/// `fixed template bytes + host + event + key + digits(body) + body`
pub fn request_len(host: &str, event: &str, key: &str, body_len: usize) -> usize {
    REQUEST_TEMPLATE.rendered_len(&[
        event.len(),
        key.len(),
        host.len(),
        decimal_digits(body_len),
        body_len,
    ])
}

/// One complete, immutable HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequestFrame {
    bytes: Bytes,
}

impl HttpRequestFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Build the request frame for `payload`
///
/// # Arguments
///
/// * `host` - Value of the `Host` header
/// * `credentials` - Event name and key placed in the request path
/// * `payload` - Formatted JSON body
///
/// # Errors
///
/// Returns `InternalSizeMismatch` if the rendered frame is not exactly
/// [`request_len`] bytes. Nothing past the precomputed length is written.
///
/// # Examples
///
/// ```
/// use modem_webhook::telemetry::TelemetryReading;
/// use modem_webhook::webhook::payload::WebhookPayload;
/// use modem_webhook::webhook::request::{build_request, WebhookCredentials};
///
/// let reading = TelemetryReading::new("25", "3700", "20/01/01,00:00:00+00")?;
/// let payload = WebhookPayload::format(&reading)?;
/// let credentials = WebhookCredentials { event: "test".into(), key: "abcd1234".into() };
///
/// let frame = build_request("maker.ifttt.com", &credentials, &payload)?;
/// assert!(frame.as_bytes().starts_with(b"POST /trigger/test/with/key/abcd1234 HTTP/1.1\r\n"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn build_request(
    host: &str,
    credentials: &WebhookCredentials,
    payload: &WebhookPayload,
) -> Result<HttpRequestFrame> {
    let expected = request_len(host, &credentials.event, &credentials.key, payload.len());
    let content_length = payload.len().to_string();

    let bytes = REQUEST_TEMPLATE.render_exact(
        &[
            credentials.event.as_bytes(),
            credentials.key.as_bytes(),
            host.as_bytes(),
            content_length.as_bytes(),
            payload.as_bytes(),
        ],
        expected,
    )?;

    debug!("Built {} byte request for event {}", bytes.len(), credentials.event);

    Ok(HttpRequestFrame {
        bytes: Bytes::from(bytes),
    })
}
