//! # Transport Session
//!
//! Delivers one [`HttpRequestFrame`] and classifies the response.
//!
//! ```text
//! Resolving -> Connecting -> Sending -> Receiving -> Validating -> Delivered | Rejected | Failed
//! ```
//!
//! Sending loops on single writes until the whole frame is accepted.
//! Receiving loops on single reads into a fixed-capacity buffer until the
//! peer closes the stream, or until the read deadline passes with a complete
//! status line already buffered (a keep-alive peer). A response that does
//! not fit is rejected rather than truncated. The connection is shut down on
//! every exit path.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::policy::SuccessPolicy;
use super::request::HttpRequestFrame;
use super::transport::{Connection, Connector};
use crate::error::{Result, WebhookError};

/// Webhook destination port (plain HTTP)
pub const HTTP_PORT: u16 = 80;

/// Default webhook host
pub const DEFAULT_HOST: &str = "maker.ifttt.com";

/// Default response buffer capacity
pub const RECV_BUF_SIZE: usize = 1024;

/// Status line terminator
const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Everything a session needs besides the frame
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub host: String,
    pub port: u16,
    pub recv_buffer_size: usize,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
    pub policy: SuccessPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: HTTP_PORT,
            recv_buffer_size: RECV_BUF_SIZE,
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(10),
            policy: SuccessPolicy::default(),
        }
    }
}

/// Session progress, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Resolving,
    Connecting,
    Sending,
    Receiving,
    Validating,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Resolving => "resolving",
            SessionState::Connecting => "connecting",
            SessionState::Sending => "sending",
            SessionState::Receiving => "receiving",
            SessionState::Validating => "validating",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Result of one delivery attempt
#[derive(Debug)]
pub enum TransportOutcome {
    /// Response status line accepted by the success policy
    Delivered { status_line: String },

    /// Response received but not recognised as success
    Rejected { status_line: String },

    /// Resolution, connection, I/O or response-shape failure
    Failed {
        error: WebhookError,
        status_line: Option<String>,
    },
}

impl TransportOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, TransportOutcome::Delivered { .. })
    }

    /// First line of the response, if one was received
    pub fn status_line(&self) -> Option<&str> {
        match self {
            TransportOutcome::Delivered { status_line }
            | TransportOutcome::Rejected { status_line } => Some(status_line),
            TransportOutcome::Failed { status_line, .. } => status_line.as_deref(),
        }
    }
}

impl fmt::Display for TransportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportOutcome::Delivered { status_line } => write!(f, "delivered ({})", status_line),
            TransportOutcome::Rejected { status_line } => write!(f, "rejected ({})", status_line),
            TransportOutcome::Failed { error, .. } => write!(f, "failed ({})", error),
        }
    }
}

/// One delivery attempt against `connector`
pub struct TransportSession<'s, C: Connector + ?Sized> {
    connector: &'s C,
    settings: &'s SessionSettings,
}

impl<'s, C: Connector + ?Sized> TransportSession<'s, C> {
    pub fn new(connector: &'s C, settings: &'s SessionSettings) -> Self {
        Self {
            connector,
            settings,
        }
    }

    /// Send `frame` and classify the response
    ///
    /// Never returns an error: failures are reported as
    /// [`TransportOutcome::Failed`], carrying the status line of any
    /// response bytes that arrived before the failure.
    pub async fn deliver(&self, frame: &HttpRequestFrame) -> TransportOutcome {
        match self.exchange(frame).await {
            Ok(response) => {
                debug!("Session {}", SessionState::Validating);
                validate_response(&response, &self.settings.policy)
            }
            Err(failure) => {
                warn!("Delivery to {} failed: {}", self.settings.host, failure.error);
                TransportOutcome::Failed {
                    status_line: first_line(&failure.received),
                    error: failure.error,
                }
            }
        }
    }

    async fn exchange(&self, frame: &HttpRequestFrame) -> SessionResult<Vec<u8>> {
        let settings = self.settings;

        debug!("Session {}", SessionState::Resolving);
        let addr = bounded(
            settings.connect_timeout,
            self.connector.resolve(&settings.host, settings.port),
        )
        .await
        .map_err(|e| WebhookError::Resolution(format!("{}: {}", settings.host, e)))?;

        debug!("Session {}", SessionState::Connecting);
        info!("Connecting to {} ({})", settings.host, addr);
        let mut conn = bounded(settings.connect_timeout, self.connector.connect(addr))
            .await
            .map_err(|e| WebhookError::Connection(format!("{}: {}", addr, e)))?;

        let result = self.transfer(conn.as_mut(), frame).await;

        if let Err(e) = bounded(settings.io_timeout, conn.shutdown()).await {
            debug!("Shutdown failed: {}", e);
        }
        drop(conn);
        debug!("Session {}", SessionState::Closed);

        result
    }

    async fn transfer(
        &self,
        conn: &mut dyn Connection,
        frame: &HttpRequestFrame,
    ) -> SessionResult<Vec<u8>> {
        debug!("Session {}", SessionState::Sending);
        let sent = send_all(conn, frame.as_bytes(), self.settings.io_timeout).await?;
        info!("Sent {} bytes", sent);

        debug!("Session {}", SessionState::Receiving);
        let response = receive(
            conn,
            self.settings.recv_buffer_size,
            self.settings.io_timeout,
        )
        .await?;
        info!("Received {} bytes", response.len());

        Ok(response)
    }
}

/// A session error together with the response bytes received before it
#[derive(Debug)]
pub struct SessionFailure {
    pub error: WebhookError,
    pub received: Vec<u8>,
}

impl From<WebhookError> for SessionFailure {
    fn from(error: WebhookError) -> Self {
        Self {
            error,
            received: Vec::new(),
        }
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionFailure>;

/// Await an I/O future with a deadline, folding expiry into an `io::Error`
async fn bounded<T, F>(limit: Duration, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("timed out after {} ms", limit.as_millis()),
        )),
    }
}

/// Write all of `buf`, one write call at a time
///
/// # Returns
///
/// * `Result<usize>` - Bytes sent, always `buf.len()` on success
///
/// # Errors
///
/// Returns `Transport` as soon as any write fails, times out or accepts
/// zero bytes; the rest of the buffer is abandoned.
pub async fn send_all(conn: &mut dyn Connection, buf: &[u8], io_timeout: Duration) -> Result<usize> {
    let mut off = 0;

    while off < buf.len() {
        let n = bounded(io_timeout, conn.write(&buf[off..]))
            .await
            .map_err(|e| {
                WebhookError::Transport(format!("send failed at byte {}: {}", off, e))
            })?;

        if n == 0 {
            return Err(WebhookError::Transport(format!(
                "send accepted no bytes at byte {}",
                off
            )));
        }

        off += n;
    }

    Ok(off)
}

/// Read until the peer closes, into a buffer of at most `capacity` bytes
///
/// Once the buffer is full a single one-byte probe read decides whether the
/// peer is done (`Ok(0)`) or still sending. A peer that keeps the
/// connection open after a complete status line ends the read at the
/// deadline, and the bytes received so far are the response.
///
/// # Errors
///
/// Both carry the bytes received before the failure:
/// - `Transport` if a read fails, or times out before a status line arrived
/// - `ResponseTooLarge` if more than `capacity` bytes arrive
pub async fn receive(
    conn: &mut dyn Connection,
    capacity: usize,
    io_timeout: Duration,
) -> SessionResult<Vec<u8>> {
    let mut buf = vec![0u8; capacity];
    let mut off = 0;

    loop {
        let read = if off == capacity {
            let mut probe = [0u8; 1];
            bounded(io_timeout, conn.read(&mut probe)).await
        } else {
            bounded(io_timeout, conn.read(&mut buf[off..])).await
        };

        match read {
            Ok(0) => break,
            Ok(_) if off == capacity => {
                return Err(SessionFailure {
                    error: WebhookError::ResponseTooLarge { capacity },
                    received: buf,
                });
            }
            Ok(n) => off += n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut && first_line(&buf[..off]).is_some() => {
                debug!("Peer kept the connection open, using {} bytes received", off);
                break;
            }
            Err(e) => {
                buf.truncate(off);
                return Err(SessionFailure {
                    error: WebhookError::Transport(format!(
                        "receive failed at byte {}: {}",
                        off, e
                    )),
                    received: buf,
                });
            }
        }
    }

    buf.truncate(off);
    Ok(buf)
}

/// First CRLF-terminated line of `response`, without the terminator
fn first_line(response: &[u8]) -> Option<String> {
    response
        .windows(LINE_TERMINATOR.len())
        .position(|w| w == LINE_TERMINATOR)
        .map(|end| String::from_utf8_lossy(&response[..end]).into_owned())
}

/// Classify a complete response by its status line
pub fn validate_response(response: &[u8], policy: &SuccessPolicy) -> TransportOutcome {
    let status_line = match first_line(response) {
        Some(line) => line,
        None => {
            warn!("Response has no status line ({} bytes)", response.len());
            return TransportOutcome::Failed {
                error: WebhookError::MalformedResponse,
                status_line: None,
            };
        }
    };

    info!("> {}", status_line);

    if policy.is_success(&status_line) {
        TransportOutcome::Delivered { status_line }
    } else {
        warn!("Response not expected: {}", status_line);
        TransportOutcome::Rejected { status_line }
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::ScriptedConnection;
    use super::*;
    use crate::telemetry::TelemetryReading;
    use crate::webhook::payload::WebhookPayload;
    use crate::webhook::policy::MatchPolarity;
    use crate::webhook::request::{build_request, WebhookCredentials};
    use crate::webhook::transport::{MockConnector, TcpConnector};
    use std::io;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const IO_TIMEOUT: Duration = Duration::from_secs(2);
    const OK_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\nCongratulations!";

    fn frame() -> HttpRequestFrame {
        let reading = TelemetryReading::new("25", "3700", "20/01/01,00:00:00+00").unwrap();
        let payload = WebhookPayload::format(&reading).unwrap();
        let credentials = WebhookCredentials {
            event: "test".to_string(),
            key: "abcd1234".to_string(),
        };
        build_request(DEFAULT_HOST, &credentials, &payload).unwrap()
    }

    fn connector_for(conn: ScriptedConnection) -> MockConnector {
        let mut connector = MockConnector::new();
        connector
            .expect_resolve()
            .returning(|_, port| Ok(SocketAddr::from(([127, 0, 0, 1], port))));
        connector.expect_connect().returning(move |_| {
            let boxed: Box<dyn Connection> = Box::new(conn.clone());
            Ok(boxed)
        });
        connector
    }

    #[test]
    fn test_defaults() {
        let settings = SessionSettings::default();
        assert_eq!(settings.host, "maker.ifttt.com");
        assert_eq!(settings.port, 80);
        assert_eq!(settings.recv_buffer_size, 1024);
    }

    #[tokio::test]
    async fn test_send_all_with_every_chunk_size() {
        let frame = frame();
        for chunk in 1..=frame.len() {
            let mut conn = ScriptedConnection::new();
            for _ in 0..frame.len() {
                conn.limit_write(chunk);
            }

            let sent = send_all(&mut conn, frame.as_bytes(), IO_TIMEOUT).await.unwrap();
            assert_eq!(sent, frame.len(), "chunk size {}", chunk);
            assert_eq!(conn.written(), frame.as_bytes(), "chunk size {}", chunk);
        }
    }

    #[tokio::test]
    async fn test_send_all_irregular_chunks() {
        let frame = frame();
        let mut conn = ScriptedConnection::new();
        for limit in [1, 7, 2, 64, 3, 1, 100] {
            conn.limit_write(limit);
        }

        let sent = send_all(&mut conn, frame.as_bytes(), IO_TIMEOUT).await.unwrap();
        assert_eq!(sent, frame.len());
        assert_eq!(conn.written(), frame.as_bytes());
    }

    #[tokio::test]
    async fn test_send_all_aborts_on_error() {
        let mut conn = ScriptedConnection::new();
        conn.limit_write(10).fail_write(io::ErrorKind::ConnectionReset);

        let result = send_all(&mut conn, &[0u8; 100], IO_TIMEOUT).await;
        assert!(matches!(result, Err(WebhookError::Transport(_))));
        assert_eq!(conn.written().len(), 10);
    }

    #[tokio::test]
    async fn test_send_all_rejects_zero_byte_write() {
        let mut conn = ScriptedConnection::new();
        conn.limit_write(0);

        let result = send_all(&mut conn, b"abc", IO_TIMEOUT).await;
        assert!(matches!(result, Err(WebhookError::Transport(_))));
    }

    #[tokio::test]
    async fn test_receive_until_peer_close() {
        let mut conn = ScriptedConnection::new();
        conn.reply(b"HTTP/1.1 ").reply(b"200 OK\r\n").reply(b"\r\n");

        let response = receive(&mut conn, 1024, IO_TIMEOUT).await.unwrap();
        assert_eq!(response, b"HTTP/1.1 200 OK\r\n\r\n");
    }

    #[tokio::test]
    async fn test_receive_chunked_equals_single_chunk() {
        let body: Vec<u8> = OK_RESPONSE
            .iter()
            .copied()
            .chain(std::iter::repeat(b'x').take(600))
            .collect();

        let mut single = ScriptedConnection::new();
        single.reply(&body);
        let whole = receive(&mut single, 1024, IO_TIMEOUT).await.unwrap();

        let mut split = ScriptedConnection::new();
        split.reply(&body[..1]).reply(&body[1..501]).reply(&body[501..]);
        let pieces = receive(&mut split, 1024, IO_TIMEOUT).await.unwrap();

        assert_eq!(whole, body);
        assert_eq!(pieces, whole);

        let policy = SuccessPolicy::default();
        assert!(validate_response(&whole, &policy).is_delivered());
        assert!(validate_response(&pieces, &policy).is_delivered());
    }

    #[tokio::test]
    async fn test_receive_exactly_capacity() {
        let mut conn = ScriptedConnection::new();
        conn.reply(&[b'a'; 64]);

        let response = receive(&mut conn, 64, IO_TIMEOUT).await.unwrap();
        assert_eq!(response.len(), 64);
        // Last request is the one-byte probe
        assert_eq!(conn.read_requests().last(), Some(&1));
    }

    #[tokio::test]
    async fn test_receive_too_large() {
        let mut conn = ScriptedConnection::new();
        conn.reply(&[b'a'; 65]);

        let result = receive(&mut conn, 64, IO_TIMEOUT).await;
        match result {
            Err(SessionFailure {
                error: WebhookError::ResponseTooLarge { capacity: 64 },
                received,
            }) => assert_eq!(received, vec![b'a'; 64]),
            other => panic!("Expected ResponseTooLarge, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_receive_never_offers_more_than_remaining_capacity() {
        for chunk in [1usize, 3, 7, 16, 63, 64, 200] {
            let mut conn = ScriptedConnection::new();
            for _ in 0..100 {
                conn.reply(&vec![b'z'; chunk]);
            }

            let result = receive(&mut conn, 64, IO_TIMEOUT).await;
            assert!(matches!(
                result,
                Err(SessionFailure {
                    error: WebhookError::ResponseTooLarge { .. },
                    ..
                })
            ));

            // Offered space shrinks as the buffer fills, ending with the probe
            let requests = conn.read_requests();
            assert_eq!(requests.first(), Some(&64), "chunk {}", chunk);
            assert_eq!(requests.last(), Some(&1), "chunk {}", chunk);
            assert!(requests.windows(2).all(|w| w[1] <= w[0]), "chunk {}", chunk);
        }
    }

    #[tokio::test]
    async fn test_receive_read_error() {
        let mut conn = ScriptedConnection::new();
        conn.reply(b"HTTP/1.1").fail_read(io::ErrorKind::ConnectionReset);

        let result = receive(&mut conn, 1024, IO_TIMEOUT).await;
        match result {
            Err(SessionFailure {
                error: WebhookError::Transport(_),
                received,
            }) => assert_eq!(received, b"HTTP/1.1"),
            other => panic!("Expected Transport error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_receive_times_out() {
        let mut conn = ScriptedConnection::new();
        conn.keep_open();

        let result = receive(&mut conn, 1024, Duration::from_millis(50)).await;
        match result {
            Err(SessionFailure {
                error: WebhookError::Transport(msg),
                ..
            }) => assert!(msg.contains("timed out")),
            other => panic!("Expected Transport error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_receive_times_out_mid_status_line() {
        let mut conn = ScriptedConnection::new();
        conn.reply(b"HTTP/1.1 200").keep_open();

        let result = receive(&mut conn, 1024, Duration::from_millis(50)).await;
        assert!(matches!(
            result,
            Err(SessionFailure {
                error: WebhookError::Transport(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_receive_keep_alive_peer_ends_at_deadline() {
        let mut conn = ScriptedConnection::new();
        conn.reply(b"HTTP/1.1 200 OK\r\n").reply(b"Content-Length: 0\r\n\r\n").keep_open();

        let response = receive(&mut conn, 1024, Duration::from_millis(50)).await.unwrap();
        assert_eq!(response, b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn test_receive_full_buffer_keep_alive_peer() {
        let mut conn = ScriptedConnection::new();
        let mut body = b"HTTP/1.1 200 OK\r\n".to_vec();
        body.resize(64, b'x');
        conn.reply(&body).keep_open();

        let response = receive(&mut conn, 64, Duration::from_millis(50)).await.unwrap();
        assert_eq!(response, body);
    }

    #[test]
    fn test_validate_success() {
        let outcome = validate_response(OK_RESPONSE, &SuccessPolicy::default());
        assert!(outcome.is_delivered());
        assert_eq!(outcome.status_line(), Some("HTTP/1.1 200 OK"));
    }

    #[test]
    fn test_validate_rejected() {
        let outcome = validate_response(
            b"HTTP/1.1 401 Unauthorized\r\n\r\n",
            &SuccessPolicy::default(),
        );
        match outcome {
            TransportOutcome::Rejected { status_line } => {
                assert_eq!(status_line, "HTTP/1.1 401 Unauthorized")
            }
            other => panic!("Expected Rejected, got: {:?}", other),
        }
    }

    #[test]
    fn test_validate_malformed() {
        for response in [&b""[..], b"HTTP/1.1 200 OK", b"HTTP/1.1 200 OK\n"] {
            let outcome = validate_response(response, &SuccessPolicy::default());
            assert!(matches!(
                outcome,
                TransportOutcome::Failed {
                    error: WebhookError::MalformedResponse,
                    status_line: None
                }
            ));
        }
    }

    #[test]
    fn test_validate_with_inverted_polarity() {
        let policy = SuccessPolicy::new("HTTP/1.1 200 OK", MatchPolarity::MatchIsFailure);
        let outcome = validate_response(OK_RESPONSE, &policy);
        assert!(matches!(outcome, TransportOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_deliver_success() {
        let conn = ScriptedConnection::new();
        conn.limit_write(5).limit_write(1).reply(&OK_RESPONSE[..1]).reply(&OK_RESPONSE[1..]);
        let connector = connector_for(conn.clone());
        let settings = SessionSettings::default();

        let frame = frame();
        let outcome = TransportSession::new(&connector, &settings).deliver(&frame).await;

        assert!(outcome.is_delivered(), "outcome: {}", outcome);
        assert_eq!(conn.written(), frame.as_bytes());
        assert!(conn.was_shut_down());
    }

    #[tokio::test]
    async fn test_deliver_resolution_failure() {
        let mut connector = MockConnector::new();
        connector.expect_resolve().returning(|_, _| {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such host"))
        });
        connector.expect_connect().never();
        let settings = SessionSettings::default();

        let outcome = TransportSession::new(&connector, &settings).deliver(&frame()).await;
        assert!(matches!(
            outcome,
            TransportOutcome::Failed {
                error: WebhookError::Resolution(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_deliver_connection_failure() {
        let mut connector = MockConnector::new();
        connector
            .expect_resolve()
            .returning(|_, port| Ok(SocketAddr::from(([127, 0, 0, 1], port))));
        connector.expect_connect().returning(|_| {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        });
        let settings = SessionSettings::default();

        let outcome = TransportSession::new(&connector, &settings).deliver(&frame()).await;
        assert!(matches!(
            outcome,
            TransportOutcome::Failed {
                error: WebhookError::Connection(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_deliver_send_failure_still_closes() {
        let conn = ScriptedConnection::new();
        conn.limit_write(3).fail_write(io::ErrorKind::BrokenPipe);
        let connector = connector_for(conn.clone());
        let settings = SessionSettings::default();

        let outcome = TransportSession::new(&connector, &settings).deliver(&frame()).await;
        assert!(matches!(
            outcome,
            TransportOutcome::Failed {
                error: WebhookError::Transport(_),
                ..
            }
        ));
        assert!(conn.was_shut_down());
        // Nothing was read after the send failed
        assert!(conn.read_requests().is_empty());
    }

    #[tokio::test]
    async fn test_deliver_oversized_response() {
        let conn = ScriptedConnection::new();
        conn.reply(&[b'x'; 2048]);
        let connector = connector_for(conn.clone());
        let settings = SessionSettings::default();

        let outcome = TransportSession::new(&connector, &settings).deliver(&frame()).await;
        assert!(matches!(
            outcome,
            TransportOutcome::Failed {
                error: WebhookError::ResponseTooLarge { capacity: 1024 },
                ..
            }
        ));
        assert_eq!(outcome.status_line(), None);
        assert!(conn.was_shut_down());
    }

    #[tokio::test]
    async fn test_deliver_oversized_response_keeps_status_line() {
        let conn = ScriptedConnection::new();
        conn.reply(b"HTTP/1.1 200 OK\r\n").reply(&[b'x'; 2000]);
        let connector = connector_for(conn.clone());
        let settings = SessionSettings::default();

        let outcome = TransportSession::new(&connector, &settings).deliver(&frame()).await;
        assert!(matches!(
            outcome,
            TransportOutcome::Failed {
                error: WebhookError::ResponseTooLarge { capacity: 1024 },
                ..
            }
        ));
        assert_eq!(outcome.status_line(), Some("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn test_deliver_read_failure_keeps_status_line() {
        let conn = ScriptedConnection::new();
        conn.reply(b"HTTP/1.1 200 OK\r\nContent-")
            .fail_read(io::ErrorKind::ConnectionReset);
        let connector = connector_for(conn);
        let settings = SessionSettings::default();

        let outcome = TransportSession::new(&connector, &settings).deliver(&frame()).await;
        assert!(matches!(
            outcome,
            TransportOutcome::Failed {
                error: WebhookError::Transport(_),
                ..
            }
        ));
        assert_eq!(outcome.status_line(), Some("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn test_deliver_rejected() {
        let conn = ScriptedConnection::new();
        conn.reply(b"HTTP/1.1 401 Unauthorized\r\n\r\n");
        let connector = connector_for(conn);
        let settings = SessionSettings::default();

        let outcome = TransportSession::new(&connector, &settings).deliver(&frame()).await;
        assert!(matches!(outcome, TransportOutcome::Rejected { .. }));
        assert_eq!(outcome.status_line(), Some("HTTP/1.1 401 Unauthorized"));
    }

    #[tokio::test]
    async fn test_deliver_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let frame = frame();
        let expected_len = frame.len();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; expected_len];
            socket.read_exact(&mut request).await.unwrap();
            socket.write_all(OK_RESPONSE).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });

        let settings = SessionSettings {
            host: "127.0.0.1".to_string(),
            port,
            ..SessionSettings::default()
        };
        let outcome = TransportSession::new(&TcpConnector, &settings).deliver(&frame).await;

        assert!(outcome.is_delivered(), "outcome: {}", outcome);
        assert_eq!(server.await.unwrap(), frame.as_bytes());
    }

    #[tokio::test]
    async fn test_deliver_to_keep_alive_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let frame = frame();
        let expected_len = frame.len();

        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; expected_len];
            socket.read_exact(&mut request).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
            // Hold the connection open until the client is done
            let _ = done_rx.await;
        });

        let settings = SessionSettings {
            host: "127.0.0.1".to_string(),
            port,
            io_timeout: Duration::from_millis(300),
            ..SessionSettings::default()
        };
        let outcome = TransportSession::new(&TcpConnector, &settings).deliver(&frame).await;

        let _ = done_tx.send(());
        server.await.unwrap();

        assert!(outcome.is_delivered(), "outcome: {}", outcome);
        assert_eq!(outcome.status_line(), Some("HTTP/1.1 200 OK"));
    }
}
