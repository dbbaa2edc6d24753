use crate::core::errors::OmmError;
use crate::core::types::OmmStbState;
use parking_lot::RwLock;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of one connection's login session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingAuth,
    Authenticated,
    Closing,
    /// Terminal for the current session; a new connection starts a new one
    Faulted,
}

impl SessionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::AwaitingAuth => "AwaitingAuth",
            Self::Authenticated => "Authenticated",
            Self::Closing => "Closing",
            Self::Faulted => "Faulted",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Faulted)
    }

    /// Whether a transport is (or is about to be) attached.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Connecting | Self::AwaitingAuth | Self::Authenticated)
    }

    fn can_transition_to(self, next: Self) -> bool {
        use SessionState::{AwaitingAuth, Authenticated, Closing, Connecting, Disconnected, Faulted};
        match (self, next) {
            (Faulted, _) => false,
            (_, Faulted) => true,
            (Disconnected, Connecting)
            | (Connecting, AwaitingAuth)
            | (AwaitingAuth, Authenticated)
            | (Connecting | AwaitingAuth | Authenticated, Closing)
            | (Closing, Disconnected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The controller's RSA public key, as announced at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPublicKey {
    pub modulus: String,
    pub exponent: String,
}

/// What the controller told us about itself in the handshake response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerIdentity {
    pub standby_state: Option<OmmStbState>,
    pub omm_version: String,
    pub axi_version: String,
    pub omm_axi_spec_version: Option<String>,
    pub protocol_version: u32,
    pub axi_clients: Option<u32>,
    pub public_key: Option<ServerPublicKey>,
}

/// Snapshot of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    pub state: SessionState,
    pub protocol_version: Option<u32>,
    pub server: Option<ServerIdentity>,
    pub rtt: Option<Duration>,
    pub fault: Option<String>,
}

/// Session state machine shared between callers, the read loop and the keepalive task.
#[derive(Debug, Default)]
pub struct Session {
    info: RwLock<SessionInfo>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.info.read().state
    }

    pub fn info(&self) -> SessionInfo {
        self.info.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// Fail with a state violation unless the session is in `required`.
    pub fn require(&self, required: SessionState, operation: &'static str) -> Result<(), OmmError> {
        let state = self.state();
        if state == required {
            Ok(())
        } else {
            Err(OmmError::InvalidState { operation, state })
        }
    }

    /// Start a new session for a fresh connection attempt.
    ///
    /// Allowed from `Disconnected`, and from `Faulted` since the faulted
    /// session's record is discarded.
    pub fn begin(&self) -> Result<(), OmmError> {
        let mut info = self.info.write();
        match info.state {
            SessionState::Disconnected | SessionState::Faulted => {
                *info = SessionInfo {
                    state: SessionState::Connecting,
                    ..SessionInfo::default()
                };
                debug!("session connecting");
                Ok(())
            }
            state => Err(OmmError::InvalidState {
                operation: "connect",
                state,
            }),
        }
    }

    /// Move to `next`, returning the previous state.
    pub fn transition(
        &self,
        next: SessionState,
        operation: &'static str,
    ) -> Result<SessionState, OmmError> {
        let mut info = self.info.write();
        let current = info.state;
        if !current.can_transition_to(next) {
            return Err(OmmError::InvalidState {
                operation,
                state: current,
            });
        }
        info.state = next;
        debug!(from = %current, to = %next, "session state changed");
        Ok(current)
    }

    /// Record a successful handshake.
    pub fn authenticate(&self, server: ServerIdentity) -> Result<(), OmmError> {
        let mut info = self.info.write();
        if info.state != SessionState::AwaitingAuth {
            return Err(OmmError::InvalidState {
                operation: "login",
                state: info.state,
            });
        }
        info!(
            omm_version = %server.omm_version,
            axi_version = %server.axi_version,
            protocol_version = server.protocol_version,
            "session authenticated"
        );
        info.state = SessionState::Authenticated;
        info.protocol_version = Some(server.protocol_version);
        info.server = Some(server);
        Ok(())
    }

    /// Enter `Faulted`; returns false if the session had already faulted.
    pub fn fault(&self, reason: impl Into<String>) -> bool {
        let mut info = self.info.write();
        if info.state.is_terminal() {
            return false;
        }
        let reason = reason.into();
        warn!(from = %info.state, reason = %reason, "session faulted");
        info.state = SessionState::Faulted;
        info.fault = Some(reason);
        true
    }

    pub fn record_rtt(&self, rtt: Duration) {
        self.info.write().rtt = Some(rtt);
    }
}
