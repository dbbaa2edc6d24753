use crate::core::errors::OmmError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{info, instrument};

/// Byte that terminates every document the client writes.
pub const DOCUMENT_TERMINATOR: u8 = 0;

/// Engine tuning for one controller connection
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Default deadline for a single request in milliseconds
    pub request_timeout_ms: u64,
    /// Liveness check interval in milliseconds; `None` disables keepalive
    pub keepalive_interval_ms: Option<u64>,
    /// Largest inbound document accepted before the stream is declared broken
    pub max_document_bytes: usize,
    /// Payload bytes per `PutFile` chunk
    pub file_chunk_size: usize,
    /// Buffer size of channels handed out by `event_stream`
    pub event_channel_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,          // 10 seconds
            request_timeout_ms: 30_000,          // 30 seconds
            keepalive_interval_ms: Some(60_000), // 1 minute
            max_document_bytes: 1024 * 1024,     // 1 MiB
            file_chunk_size: 4096,
            event_channel_capacity: 256,
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Option<Duration> {
        self.keepalive_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_keepalive(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval_ms = interval.map(|interval| interval.as_millis() as u64);
        self
    }

    pub fn with_file_chunk_size(mut self, size: usize) -> Self {
        self.file_chunk_size = size.max(1);
        self
    }
}

/// Any duplex byte stream the engine can run over.
pub trait AxiStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AxiStream for T {}

pub type BoxedStream = Box<dyn AxiStream>;

/// Establishes the byte stream to a controller.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<BoxedStream, OmmError>;

    /// `host:port` for logging.
    fn endpoint(&self) -> String;
}

/// Plain TCP, as used by controllers with TLS disabled.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: ConnectionConfig::default().connect_timeout(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn open_tcp(&self) -> Result<TcpStream, OmmError> {
        let address = (self.host.as_str(), self.port);
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| OmmError::Timeout(self.connect_timeout))?
            .map_err(|e| {
                OmmError::NetworkError(format!("TCP connect to {} failed: {}", self.endpoint(), e))
            })?;
        stream
            .set_nodelay(true)
            .map_err(|e| OmmError::NetworkError(format!("Failed to set TCP_NODELAY: {}", e)))?;
        Ok(stream)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    #[instrument(skip(self), fields(endpoint = %self.endpoint()))]
    async fn connect(&self) -> Result<BoxedStream, OmmError> {
        let stream = self.open_tcp().await?;
        info!("TCP transport established");
        Ok(Box::new(stream))
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// TLS over TCP; controllers usually present a self-signed certificate.
#[derive(Debug, Clone)]
pub struct TlsConnector {
    tcp: TcpConnector,
    accept_invalid_certs: bool,
}

impl TlsConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            tcp: TcpConnector::new(host, port),
            accept_invalid_certs: false,
        }
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.tcp = self.tcp.with_connect_timeout(timeout);
        self
    }
}

#[async_trait]
impl Connector for TlsConnector {
    #[instrument(skip(self), fields(endpoint = %self.endpoint(), accept_invalid_certs = self.accept_invalid_certs))]
    async fn connect(&self) -> Result<BoxedStream, OmmError> {
        let tcp = self.tcp.open_tcp().await?;

        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .danger_accept_invalid_hostnames(self.accept_invalid_certs)
            .build()
            .map_err(|e| OmmError::NetworkError(format!("Failed to build TLS connector: {}", e)))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let stream = tokio::time::timeout(
            self.tcp.connect_timeout,
            connector.connect(&self.tcp.host, tcp),
        )
        .await
        .map_err(|_| OmmError::Timeout(self.tcp.connect_timeout))?
        .map_err(|e| OmmError::NetworkError(format!("TLS handshake failed: {}", e)))?;

        info!("TLS transport established");
        Ok(Box::new(stream))
    }

    fn endpoint(&self) -> String {
        self.tcp.endpoint()
    }
}
