use crate::core::kernel::transport::{Connector, TcpConnector, TlsConnector};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::time::Duration;

/// Default AXI port when TLS is enabled on the controller.
pub const DEFAULT_TLS_PORT: u16 = 12622;
/// Default AXI port for plain TCP.
pub const DEFAULT_TCP_PORT: u16 = 12621;

#[derive(Debug, Clone)]
pub struct OmmConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Secret<String>,
    pub use_tls: bool,
    pub accept_invalid_certs: bool,
}

// Custom Serialize implementation - never expose the password
impl Serialize for OmmConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("OmmConfig", 6)?;
        state.serialize_field("host", &self.host)?;
        state.serialize_field("port", &self.port)?;
        state.serialize_field("username", &self.username)?;
        state.serialize_field("password", "[REDACTED]")?;
        state.serialize_field("use_tls", &self.use_tls)?;
        state.serialize_field("accept_invalid_certs", &self.accept_invalid_certs)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for OmmConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct OmmConfigHelper {
            host: String,
            port: Option<u16>,
            username: String,
            password: String,
            #[serde(default = "default_use_tls")]
            use_tls: bool,
            #[serde(default)]
            accept_invalid_certs: bool,
        }

        let helper = OmmConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            port: helper.port.unwrap_or_else(|| default_port(helper.use_tls)),
            host: helper.host,
            username: helper.username,
            password: Secret::new(helper.password),
            use_tls: helper.use_tls,
            accept_invalid_certs: helper.accept_invalid_certs,
        })
    }
}

const fn default_use_tls() -> bool {
    true
}

const fn default_port(use_tls: bool) -> u16 {
    if use_tls {
        DEFAULT_TLS_PORT
    } else {
        DEFAULT_TCP_PORT
    }
}

impl OmmConfig {
    /// TLS on the default port.
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: String) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_TLS_PORT,
            username: username.into(),
            password: Secret::new(password),
            use_tls: true,
            accept_invalid_certs: false,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_HOST` (e.g., `OMM_HOST`)
    /// - `{PREFIX}_USERNAME`
    /// - `{PREFIX}_PASSWORD`
    /// - `{PREFIX}_TLS` (optional, defaults to true)
    /// - `{PREFIX}_PORT` (optional, defaults to 12622 with TLS and 12621 without)
    /// - `{PREFIX}_ACCEPT_INVALID_CERTS` (optional, defaults to false)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let var = |name: &str| format!("{}_{}", prefix, name);

        let host = required_var(&var("HOST"))?;
        let username = required_var(&var("USERNAME"))?;
        let password = required_var(&var("PASSWORD"))?;

        let use_tls = optional_bool(&var("TLS"))?.unwrap_or(true);
        let accept_invalid_certs = optional_bool(&var("ACCEPT_INVALID_CERTS"))?.unwrap_or(false);

        let port_var = var("PORT");
        let port = match env::var(&port_var) {
            Ok(raw) => raw.trim().parse::<u16>().map_err(|e| {
                ConfigError::InvalidConfiguration(format!("{} = {:?}: {}", port_var, raw, e))
            })?,
            Err(_) => default_port(use_tls),
        };

        Ok(Self {
            host,
            port,
            username,
            password: Secret::new(password),
            use_tls,
            accept_invalid_certs,
        })
    }

    /// Create configuration from .env file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific .env file path
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // no .env file, fall through to the process environment
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Use plain TCP, moving to the TCP default port if the TLS default was set.
    #[must_use]
    pub fn plain_tcp(mut self) -> Self {
        if self.port == DEFAULT_TLS_PORT {
            self.port = DEFAULT_TCP_PORT;
        }
        self.use_tls = false;
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Trust the controller's self-signed certificate.
    #[must_use]
    pub const fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.expose_secret().is_empty()
    }

    /// Get password (use carefully - exposes secret)
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Transport connector matching this configuration.
    pub fn connector(&self, connect_timeout: Duration) -> Box<dyn Connector> {
        if self.use_tls {
            Box::new(
                TlsConnector::new(self.host.clone(), self.port)
                    .accept_invalid_certs(self.accept_invalid_certs)
                    .with_connect_timeout(connect_timeout),
            )
        } else {
            Box::new(
                TcpConnector::new(self.host.clone(), self.port).with_connect_timeout(connect_timeout),
            )
        }
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvironmentVariable(name.to_string()))
}

fn optional_bool(name: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(Some(true)),
            "0" | "false" | "no" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidConfiguration(format!(
                "{} = {:?} is not a boolean",
                name, raw
            ))),
        },
        Err(_) => Ok(None),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
