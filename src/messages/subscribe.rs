use super::Request;
use crate::core::errors::DecodeError;
use crate::core::kernel::codec::{Element, ElementBuilder, ElementReader, WireElement};
use crate::core::types::{CmdType, EventType};

/// One subscription command.
///
/// Filters are passed through to the controller as given; `ppn = -1` and
/// `trigger = "*"` conventionally mean "any".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeCmd {
    pub cmd: CmdType,
    pub event_type: EventType,
    pub ppn: Option<i32>,
    pub trigger: Option<String>,
}

impl SubscribeCmd {
    pub fn on(event_type: EventType) -> Self {
        Self {
            cmd: CmdType::On,
            event_type,
            ppn: None,
            trigger: None,
        }
    }

    pub fn off(event_type: EventType) -> Self {
        Self {
            cmd: CmdType::Off,
            ..Self::on(event_type)
        }
    }

    pub fn with_ppn(mut self, ppn: i32) -> Self {
        self.ppn = Some(ppn);
        self
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }
}

impl WireElement for SubscribeCmd {
    const TAG: &'static str = "e";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .attr("cmd", &self.cmd)
            .attr("eventType", &self.event_type)
            .opt_attr("ppn", self.ppn.as_ref())
            .opt_attr("trigger", self.trigger.as_ref())
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            cmd: r.required("cmd")?,
            event_type: r.required("eventType")?,
            ppn: r.optional("ppn")?,
            trigger: r.optional("trigger")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subscribe {
    pub commands: Vec<SubscribeCmd>,
}

impl Subscribe {
    pub fn new(commands: Vec<SubscribeCmd>) -> Self {
        Self { commands }
    }
}

impl From<SubscribeCmd> for Subscribe {
    fn from(cmd: SubscribeCmd) -> Self {
        Self {
            commands: vec![cmd],
        }
    }
}

impl WireElement for Subscribe {
    const TAG: &'static str = "Subscribe";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .children(&self.commands)
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            commands: r.children()?,
        })
    }
}

impl Request for Subscribe {
    type Response = SubscribeResp;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscribeResp {
    pub event_type: Option<EventType>,
}

impl WireElement for SubscribeResp {
    const TAG: &'static str = "SubscribeResp";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .opt_attr("eventType", self.event_type.as_ref())
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            event_type: r.optional("eventType")?,
        })
    }
}
