pub mod client;
pub mod core;
pub mod messages;
pub mod utils;

pub use client::{Connection, OmmClient, RfpStatistics};
pub use crate::core::{
    config::{ConfigError, OmmConfig},
    errors::{DecodeError, FrameError, OmmError},
    kernel::{
        ConnectionConfig, Connector, ServerIdentity, SessionInfo, SessionState, TcpConnector,
        TlsConnector,
    },
    types::*,
};
pub use messages::{Event, EventMessage, Request, Response, ResponseMessage};
