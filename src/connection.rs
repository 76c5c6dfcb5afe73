//! MogileFS Tracker Connection
//!
//! One TCP socket to one tracker. A connection is either disconnected or
//! connected; any I/O failure leaves it for the caller to close. Retry policy
//! lives entirely in the pool.
//!
//! Each exchange writes one line and reads one line back. If the future is
//! dropped in between, the reply is still queued on the socket, so the
//! connection remembers the exchange as interrupted and must not be reused.

use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::catalog::{Request, Response};
use crate::errors::{MogileError, Result};
use crate::types::*;

/// Socket and settings for one tracker
pub struct TrackerConnection {
    endpoint: TrackerEndpoint,
    addr: String,
    stream: Option<TcpStream>,
    in_flight: bool,
    connect_timeout: Duration,
    network_timeout: Duration,
}

impl TrackerConnection {
    /// Creates a disconnected connection
    pub fn new(endpoint: TrackerEndpoint, connect_timeout: Duration, network_timeout: Duration) -> Self {
        let addr = endpoint.to_string();
        Self {
            endpoint,
            addr,
            stream: None,
            in_flight: false,
            connect_timeout,
            network_timeout,
        }
    }

    /// Tracker this connection talks to
    pub fn endpoint(&self) -> &TrackerEndpoint {
        &self.endpoint
    }

    /// Returns true while a socket is held
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns true if a request was written but its reply never read
    pub fn is_interrupted(&self) -> bool {
        self.in_flight
    }

    /// Opens the TCP connection
    pub async fn connect(&mut self) -> Result<()> {
        let result = timeout(
            self.connect_timeout,
            TcpStream::connect((self.endpoint.host(), self.endpoint.port())),
        )
        .await;

        match result {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true).map_err(|e| self.io_error("connect", e))?;
                debug!("Connected to tracker {}", self.addr);
                self.stream = Some(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(self.io_error("connect", e)),
            Err(_) => Err(MogileError::ConnectionTimeout(self.addr.clone())),
        }
    }

    /// Liveness check: sends `noop` and expects an `OK` back
    pub async fn probe(&mut self) -> Result<()> {
        let addr = self.addr.clone();
        let probe_failed = |reason: String| MogileError::ProbeFailed {
            addr: addr.clone(),
            reason,
        };

        let line = self
            .exchange(NOOP_REQUEST)
            .await
            .map_err(|e| probe_failed(e.to_string()))?;

        if !line.contains("OK") {
            return Err(probe_failed(format!("NOT OK: {}", line.trim_end())));
        }
        Ok(())
    }

    /// Sends a request and decodes the response line
    ///
    /// On a transport error the connection is left in an unknown state and
    /// must be closed by the caller.
    pub async fn send(&mut self, request: &Request) -> Result<Response> {
        let line = self.exchange(&request.encode()).await?;
        request.decode_response(line)
    }

    /// Releases the socket; safe to call at any time
    pub fn close(&mut self) {
        self.in_flight = false;
        if self.stream.take().is_some() {
            debug!("Closed connection to tracker {}", self.addr);
        }
    }

    async fn exchange(&mut self, data: &[u8]) -> Result<String> {
        self.in_flight = true;
        self.write(data).await?;
        let line = self.read().await?;
        self.in_flight = false;
        Ok(line)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let network_timeout = self.network_timeout;
        let addr = self.addr.clone();
        let stream = self.stream_mut("write")?;

        match timeout(network_timeout, stream.write_all(data)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(MogileError::Connection {
                operation: "write".to_string(),
                addr,
                source: e,
            }),
            Err(_) => Err(MogileError::NetworkTimeout("write".to_string())),
        }
    }

    async fn read(&mut self) -> Result<String> {
        let network_timeout = self.network_timeout;
        let addr = self.addr.clone();
        let stream = self.stream_mut("read")?;
        read_line(stream, &addr, network_timeout).await
    }

    fn stream_mut(&mut self, operation: &str) -> Result<&mut TcpStream> {
        let addr = &self.addr;
        self.stream.as_mut().ok_or_else(|| MogileError::Connection {
            operation: operation.to_string(),
            addr: addr.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotConnected, "not connected"),
        })
    }

    fn io_error(&self, operation: &str, source: std::io::Error) -> MogileError {
        MogileError::Connection {
            operation: operation.to_string(),
            addr: self.addr.clone(),
            source,
        }
    }
}

/// Reads one response line, terminator included
///
/// Chunks are accumulated until the buffer ends with `\r\n`. This finds the
/// end of the line only because no response payload can itself end in
/// `\r\n`: keys and values are percent-encoded, so a raw CR or LF never
/// appears inside them. The timeout covers the whole line.
pub(crate) async fn read_line<R>(reader: &mut R, addr: &str, network_timeout: Duration) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let read_all = async {
        let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed before end of response",
                ));
            }
            buf.extend_from_slice(&chunk[..n]);
            if buf.ends_with(LINE_TERMINATOR) {
                return Ok::<_, std::io::Error>(buf);
            }
        }
    };

    match timeout(network_timeout, read_all).await {
        Ok(Ok(buf)) => String::from_utf8(buf.to_vec())
            .map_err(|e| MogileError::Parse(format!("Response is not UTF-8: {}", e))),
        Ok(Err(e)) => Err(MogileError::Connection {
            operation: "read".to_string(),
            addr: addr.to_string(),
            source: e,
        }),
        Err(_) => Err(MogileError::NetworkTimeout("read".to_string())),
    }
}
