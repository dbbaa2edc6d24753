//! AXI message catalogue.
//!
//! Every request names the response it solicits through [`Request`]; every
//! response kind is listed once in the [`Response`] registry and every event
//! kind once in the [`Event`] registry.

pub mod events;
pub mod file;
pub mod open;
pub mod ping;
pub mod pp;
pub mod response;
pub mod statistic;
pub mod subscribe;
pub mod summary;

use crate::core::kernel::codec::WireElement;

pub use events::{
    Event, EventAlarmCallProgress, EventDECTSubscriptionMode, EventMessage, EventPPCnf,
    EventRFPSummary,
};
pub use file::{PutFile, PutFileResp};
pub use open::{Open, OpenResp, PublicKey, DEFAULT_PROTOCOL_VERSION};
pub use ping::{Ping, PingResp};
pub use pp::{
    CreatePPUser, CreatePPUserResp, DeletePPDev, DeletePPDevResp, DeletePPUser,
    DeletePPUserResp, GetPPDev, GetPPDevResp, GetPPUser, GetPPUserResp, PPDevType, PPUserType,
    SetPP, SetPPResp,
};
pub use response::{Response, ResponseMessage, ENVELOPE_TAG};
pub use statistic::{
    GetRFPStatistic, GetRFPStatisticConfig, GetRFPStatisticConfigResp, GetRFPStatisticResp,
    RfpStatData, RfpStatHead, RfpStatName,
};
pub use subscribe::{Subscribe, SubscribeCmd, SubscribeResp};
pub use summary::{
    GetPPDevSummary, GetPPDevSummaryResp, GetPPUserSummary, GetPPUserSummaryResp,
    GetRFPSummary, GetRFPSummaryResp, RfpSummary,
};

/// An outbound message and the response kind it solicits.
pub trait Request: WireElement + Send + Sync {
    type Response: ResponseMessage;
}
