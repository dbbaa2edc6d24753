use crate::core::kernel::codec::WireValue;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Typed errors for the types subsystem
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Unknown {kind} value: {value:?}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Declares a closed enumeration whose variants travel as fixed attribute strings.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(TypesError::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl WireValue for $name {
            fn to_wire(&self) -> String {
                self.as_str().to_string()
            }

            fn from_wire(raw: &str) -> Result<Self, String> {
                raw.parse().map_err(|e: TypesError| e.to_string())
            }
        }
    };
}

wire_enum! {
    /// Event kinds the controller can be asked to report.
    pub enum EventType {
        None => "None",
        SystemState => "SystemState",
        DectSubscriptionMode => "DECTSubscriptionMode",
        AlarmCallProgress => "AlarmCallProgress",
        RfpSummary => "RFPSummary",
        RfpState => "RFPState",
        PpCnf => "PPCnf",
        PpDevCnf => "PPDevCnf",
        PpUserCnf => "PPUserCnf",
        PpDevSummary => "PPDevSummary",
        PpUserSummary => "PPUserSummary",
    }
}

wire_enum! {
    /// Subscription command verb.
    pub enum CmdType {
        On => "On",
        Off => "Off",
    }
}

wire_enum! {
    /// Relation between a portable device and a user record.
    pub enum PpRelType {
        Unbound => "Unbound",
        Fixed => "Fixed",
        Dynamic => "Dynamic",
    }
}

wire_enum! {
    pub enum DectSubscriptionModeType {
        Off => "Off",
        Configured => "Configured",
        Wildcard => "Wildcard",
    }
}

wire_enum! {
    /// Standby state the controller reports at login.
    pub enum OmmStbState {
        None => "None",
        Active => "Active",
        Standby => "Standby",
    }
}

/// The controller's `errCode` vocabulary.
///
/// Codes outside the documented set are preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Authentication failed
    EAuth,
    /// Entity does not exist
    ENoEnt,
    /// Invalid argument
    EInval,
    /// Permission denied
    EPerm,
    /// Resource busy
    EBusy,
    /// Entity already exists
    EExist,
    /// Out of memory
    ENoMem,
    /// Too many records requested
    ETooManyRecs,
    /// Operation not supported
    ENotSupp,
    /// Request tag not understood
    EUnknownRequest,
    /// Request is missing mandatory data
    EIncomplete,
    /// Request could not be handled in time
    ETimeout,
    /// Controller-side failure
    EServerError,
    /// License does not cover the operation
    ENoLicense,
    Other(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::EAuth => "EAuth",
            Self::ENoEnt => "ENoEnt",
            Self::EInval => "EInval",
            Self::EPerm => "EPerm",
            Self::EBusy => "EBusy",
            Self::EExist => "EExist",
            Self::ENoMem => "ENoMem",
            Self::ETooManyRecs => "ETooManyRecs",
            Self::ENotSupp => "ENotSupp",
            Self::EUnknownRequest => "EUnknownRequest",
            Self::EIncomplete => "EIncomplete",
            Self::ETimeout => "ETimeout",
            Self::EServerError => "EServerError",
            Self::ENoLicense => "ENoLicense",
            Self::Other(raw) => raw,
        }
    }

    /// Spellings of `errCode` that report success rather than a failure.
    ///
    /// Controllers normally omit the attribute on success; some builds echo
    /// `errCode="ok"` or `errCode="0"` instead.
    pub fn is_success(raw: &str) -> bool {
        matches!(raw.trim(), "" | "0" | "ok" | "OK" | "Ok")
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::EAuth | Self::EPerm)
    }
}

impl From<&str> for ErrorCode {
    fn from(raw: &str) -> Self {
        match raw {
            "EAuth" => Self::EAuth,
            "ENoEnt" => Self::ENoEnt,
            "EInval" => Self::EInval,
            "EPerm" => Self::EPerm,
            "EBusy" => Self::EBusy,
            "EExist" => Self::EExist,
            "ENoMem" => Self::ENoMem,
            "ETooManyRecs" => Self::ETooManyRecs,
            "ENotSupp" => Self::ENotSupp,
            "EUnknownRequest" => Self::EUnknownRequest,
            "EIncomplete" => Self::EIncomplete,
            "ETimeout" => Self::ETimeout,
            "EServerError" => Self::EServerError,
            "ENoLicense" => Self::ENoLicense,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WireValue for ErrorCode {
    fn to_wire(&self) -> String {
        self.as_str().to_string()
    }

    fn from_wire(raw: &str) -> Result<Self, String> {
        Ok(Self::from(raw))
    }
}
