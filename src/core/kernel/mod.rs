//! `OmmAxi` Kernel - transport-agnostic protocol engine
//!
//! The kernel turns a duplex byte stream into typed AXI traffic. It knows
//! nothing about individual messages beyond the traits they implement; the
//! catalogue lives in `crate::messages`.
//!
//! # Architecture
//!
//! ## Wire Format
//! - `Element`: minimal XML element tree (attributes and one level of children)
//! - `WireElement`: typed record <-> element mapping via `ElementBuilder` / `ElementReader`
//! - `BoolStyle`: per-field boolean spelling (`1`/`0`, `true`/`false`, schema)
//!
//! ## Stream Handling
//! - `DocumentScanner` / `FrameReader`: structural splitting of the inbound byte stream
//! - `Connector`: TCP and TLS transports producing a `BoxedStream`
//!
//! ## Dispatch
//! - `Correlator`: sequence ids and the pending-request table
//! - `EventRouter`: per-kind handler lists for unsolicited events
//! - `Session`: login state machine gating every authenticated operation
//!
//! # Example
//!
//! ```rust,no_run
//! use ommaxi::core::kernel::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = TlsConnector::new("omm.example.net", 12622).accept_invalid_certs(true);
//! let stream = connector.connect().await?;
//! let (read_half, _write_half) = tokio::io::split(stream);
//!
//! let mut frames = FrameReader::new(read_half, ConnectionConfig::default().max_document_bytes);
//! while let Some(document) = frames.next_document().await {
//!     let element = Element::parse(&document?)?;
//!     println!("received <{}>", element.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod correlator;
pub mod framer;
pub mod router;
pub mod session;
pub mod transport;

// Re-export key types for convenience
pub use codec::{BoolStyle, Element, ElementBuilder, ElementReader, WireElement, WireValue};
pub use correlator::{Correlator, Resolution, ResponseHandle, SequenceId};
pub use framer::{DocumentScanner, FrameReader};
pub use router::{EventRouter, HandlerId, RoutedEvent, SubscriberGone};
pub use session::{ServerIdentity, ServerPublicKey, Session, SessionInfo, SessionState};
pub use transport::{
    AxiStream, BoxedStream, ConnectionConfig, Connector, TcpConnector, TlsConnector,
    DOCUMENT_TERMINATOR,
};
