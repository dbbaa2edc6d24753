//! High-level OMM AXI client.
//!
//! [`OmmClient`] wraps one [`Connection`] and exposes the login handshake,
//! typed request helpers and event subscriptions. It is cheap to clone; all
//! clones share the same connection.
//!
//! ```rust,no_run
//! use ommaxi::{OmmClient, OmmConfig};
//!
//! # async fn example() -> Result<(), ommaxi::OmmError> {
//! let config = OmmConfig::new("omm.example.net", "omm", "secret".to_string())
//!     .accept_invalid_certs(true);
//! let client = OmmClient::new(config);
//! client.connect().await?;
//! client.login_with_config().await?;
//!
//! let summary = client.rfp_summary().await?;
//! println!("{} of {} base stations connected", summary.connected, summary.total);
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod events;
pub mod maintenance;
pub mod provisioning;

pub use connection::Connection;
pub use maintenance::RfpStatistics;

use crate::core::config::{ConfigError, OmmConfig};
use crate::core::errors::OmmError;
use crate::core::kernel::session::{ServerIdentity, SessionInfo, SessionState};
use crate::core::kernel::transport::{AxiStream, ConnectionConfig, Connector};
use crate::messages::{Open, Request};
use crate::utils::rtt::RttSnapshot;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// OMM AXI client sharing one controller connection
#[derive(Clone)]
pub struct OmmClient {
    config: Arc<OmmConfig>,
    connection: Arc<Connection>,
}

impl OmmClient {
    pub fn new(config: OmmConfig) -> Self {
        Self::with_connection_config(config, ConnectionConfig::default())
    }

    pub fn with_connection_config(config: OmmConfig, connection_config: ConnectionConfig) -> Self {
        Self {
            config: Arc::new(config),
            connection: Connection::new(connection_config),
        }
    }

    pub fn config(&self) -> &OmmConfig {
        &self.config
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Connect to the configured controller.
    pub async fn connect(&self) -> Result<(), OmmError> {
        let connector = self
            .config
            .connector(self.connection.config().connect_timeout());
        self.connection.connect(connector.as_ref()).await
    }

    pub async fn connect_with(&self, connector: &dyn Connector) -> Result<(), OmmError> {
        self.connection.connect(connector).await
    }

    /// Run over a stream the caller already opened.
    pub async fn attach<S: AxiStream + 'static>(&self, stream: S) -> Result<(), OmmError> {
        self.connection
            .attach(Box::new(stream), self.config.endpoint())
            .await
    }

    /// Log in with explicit credentials.
    #[instrument(skip(self, password), fields(endpoint = %self.config.endpoint()))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        user_device_sync_client: Option<bool>,
    ) -> Result<ServerIdentity, OmmError> {
        let open = Open {
            user_device_sync_client,
            ..Open::new(username, password)
        };
        self.login_with(&open).await
    }

    /// Log in with the configured username and password.
    pub async fn login_with_config(&self) -> Result<ServerIdentity, OmmError> {
        if !self.config.has_credentials() {
            return Err(ConfigError::InvalidConfiguration(
                "username and password are required to log in".to_string(),
            )
            .into());
        }
        self.login(&self.config.username, self.config.password(), None)
            .await
    }

    pub async fn login_with(&self, open: &Open) -> Result<ServerIdentity, OmmError> {
        let resp = self.connection.handshake(open).await?;
        Ok(ServerIdentity::from(resp))
    }

    /// Round-trip a `Ping`, returning the measured time.
    pub async fn ping(&self) -> Result<Duration, OmmError> {
        self.connection.ping().await
    }

    pub fn rtt(&self) -> Option<RttSnapshot> {
        self.connection.rtt()
    }

    pub fn state(&self) -> SessionState {
        self.connection.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.connection.session().is_authenticated()
    }

    pub fn session(&self) -> SessionInfo {
        self.connection.session().info()
    }

    pub fn pending_requests(&self) -> usize {
        self.connection.pending_requests()
    }

    /// Send any request and wait for its typed response.
    pub async fn send<R: Request>(&self, request: &R) -> Result<R::Response, OmmError> {
        self.connection.call(request).await
    }

    pub async fn send_with_timeout<R: Request>(
        &self,
        request: &R,
        timeout: Duration,
    ) -> Result<R::Response, OmmError> {
        self.connection.call_with_timeout(request, timeout).await
    }

    /// Send a request that the caller may abandon by completing `cancel`.
    pub async fn send_until<R, C>(&self, request: &R, cancel: C) -> Result<R::Response, OmmError>
    where
        R: Request,
        C: Future<Output = ()>,
    {
        self.connection.call_until(request, cancel).await
    }

    pub async fn close(&self) -> Result<(), OmmError> {
        self.connection.close().await
    }
}
