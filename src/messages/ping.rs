use super::Request;
use crate::core::errors::DecodeError;
use crate::core::kernel::codec::{Element, ElementBuilder, ElementReader, WireElement};

/// No-op request used as the liveness check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ping {
    /// Unix seconds, echoed back by the controller
    pub time_stamp: Option<i64>,
}

impl Ping {
    pub fn now() -> Self {
        Self {
            time_stamp: Some(chrono::Utc::now().timestamp()),
        }
    }
}

impl WireElement for Ping {
    const TAG: &'static str = "Ping";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .opt_attr("timeStamp", self.time_stamp.as_ref())
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            time_stamp: r.optional("timeStamp")?,
        })
    }
}

impl Request for Ping {
    type Response = PingResp;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PingResp {
    pub time_stamp: Option<i64>,
}

impl WireElement for PingResp {
    const TAG: &'static str = "PingResp";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .opt_attr("timeStamp", self.time_stamp.as_ref())
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            time_stamp: r.optional("timeStamp")?,
        })
    }
}
