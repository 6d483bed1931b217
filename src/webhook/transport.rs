//! # Stream Transport
//!
//! Trait seams between the transport session and the network.
//!
//! [`Connection`] exposes single `write`/`read` calls with their partial
//! byte counts intact; looping is the session's job. [`TcpConnector`] is the
//! production implementation over `tokio::net`.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};

/// An open byte stream to the webhook host
#[async_trait]
pub trait Connection: Send {
    /// One write attempt; may accept fewer bytes than offered
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// One read attempt; `Ok(0)` means the peer closed the stream
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Close our side of the stream
    async fn shutdown(&mut self) -> io::Result<()>;
}

/// Resolves hostnames and opens connections
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Resolve `host` to an IPv4 socket address on `port`
    async fn resolve(&self, host: &str, port: u16) -> io::Result<SocketAddr>;

    async fn connect(&self, addr: SocketAddr) -> io::Result<Box<dyn Connection>>;
}

/// [`Connection`] over any tokio byte stream
pub struct StreamConnection<S> {
    stream: S,
}

impl<S> StreamConnection<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S> Connection for StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf).await
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

/// Plain TCP connector
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<SocketAddr> {
        lookup_host((host, port))
            .await?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no IPv4 address for {}", host),
                )
            })
    }

    async fn connect(&self, addr: SocketAddr) -> io::Result<Box<dyn Connection>> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(StreamConnection::new(stream)))
    }
}
