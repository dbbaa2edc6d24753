use crate::core::kernel::session::SessionState;
use crate::core::types::ErrorCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OmmError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Framing error: {0}")]
    FrameError(#[from] FrameError),

    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("OMM error: {code}{}", format_info(.info))]
    ProtocolError {
        code: ErrorCode,
        info: Option<String>,
    },

    #[error("Login rejected: {code}{}", format_info(.info))]
    LoginFailed {
        code: ErrorCode,
        info: Option<String>,
    },

    #[error("Operation `{operation}` not allowed in session state {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Unexpected response: expected <{expected}>, received <{actual}>")]
    UnexpectedResponse {
        expected: &'static str,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

fn format_info(info: &Option<String>) -> String {
    info.as_ref()
        .map_or_else(String::new, |info| format!(" ({})", info))
}

impl OmmError {
    /// Transport and framing faults leave the connection unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_) | Self::ConnectionLost(_) | Self::FrameError(_)
        )
    }

    /// The controller-reported error code, if this error carries one.
    pub fn error_code(&self) -> Option<&ErrorCode> {
        match self {
            Self::ProtocolError { code, .. } | Self::LoginFailed { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// A well-formed document that does not satisfy the declared message shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("expected <{expected}>, found <{found}>")]
    UnexpectedElement { expected: String, found: String },

    #[error("<{element}> is missing required attribute `{attribute}`")]
    MissingAttribute { element: String, attribute: String },

    #[error("<{element}> is missing required child <{child}>")]
    MissingElement { element: String, child: String },

    #[error("<{element}> attribute `{attribute}` has invalid value {value:?}: {reason}")]
    InvalidValue {
        element: String,
        attribute: String,
        value: String,
        reason: String,
    },

    #[error("<{element}> attribute `{attribute}` holds {found} values, expected {expected}")]
    CountMismatch {
        element: String,
        attribute: String,
        expected: usize,
        found: usize,
    },

    #[error("unrecognized response payload <{0}>")]
    UnknownResponse(String),

    #[error("unrecognized event <{0}>")]
    UnknownEvent(String),
}

/// A byte stream that cannot be split into well-formed documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("unexpected character data {found:?} between documents at byte {offset}")]
    StrayText { offset: usize, found: char },

    #[error("closing tag </{0}> without a matching opening tag")]
    UnbalancedEndTag(String),

    #[error("closing tag </{found}> does not match <{expected}>")]
    MismatchedEndTag { expected: String, found: String },

    #[error("empty element name at byte {0}")]
    EmptyName(usize),

    #[error("document exceeds {limit} bytes")]
    DocumentTooLarge { limit: usize },

    #[error("document is not valid UTF-8")]
    InvalidUtf8,

    #[error("stream ended inside a document ({0} bytes pending)")]
    Truncated(usize),
}
