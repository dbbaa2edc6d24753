use super::{PPDevType, PPUserType, RfpSummary};
use crate::core::errors::DecodeError;
use crate::core::kernel::codec::{BoolStyle, Element, ElementBuilder, ElementReader, WireElement};
use crate::core::kernel::router::RoutedEvent;
use crate::core::types::{DectSubscriptionModeType, EventType};

/// Prefix shared by every unsolicited document the controller sends.
pub const EVENT_TAG_PREFIX: &str = "Event";

/// A concrete event kind.
pub trait EventMessage: WireElement + Send + Sync + 'static {
    const KIND: EventType;

    /// Borrow this kind out of the union.
    fn from_event(event: &Event) -> Option<&Self>;
}

macro_rules! event_registry {
    ($($variant:ident($ty:ty) => $kind:ident),+ $(,)?) => {
        /// Every event kind the client understands.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Event {
            $($variant($ty)),+
        }

        impl Event {
            pub const TAGS: &'static [&'static str] = &[$(<$ty as WireElement>::TAG),+];

            pub fn tag(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => <$ty as WireElement>::TAG),+
                }
            }

            pub fn decode(element: &Element) -> Result<Self, DecodeError> {
                $(
                    if element.name == <$ty as WireElement>::TAG {
                        return <$ty as WireElement>::from_element(element).map(Self::$variant);
                    }
                )+
                Err(DecodeError::UnknownEvent(element.name.clone()))
            }
        }

        impl RoutedEvent for Event {
            type Kind = EventType;

            fn kind(&self) -> EventType {
                match self {
                    $(Self::$variant(_) => EventType::$kind),+
                }
            }
        }

        $(
            impl From<$ty> for Event {
                fn from(event: $ty) -> Self {
                    Self::$variant(event)
                }
            }

            impl EventMessage for $ty {
                const KIND: EventType = EventType::$kind;

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$variant(inner) => Some(inner),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )+
    };
}

event_registry! {
    DectSubscriptionMode(EventDECTSubscriptionMode) => DectSubscriptionMode,
    AlarmCallProgress(EventAlarmCallProgress) => AlarmCallProgress,
    RfpSummary(EventRFPSummary) => RfpSummary,
    PpCnf(EventPPCnf) => PpCnf,
}

impl Event {
    pub fn is_registered(tag: &str) -> bool {
        Self::TAGS.contains(&tag)
    }

    /// Whether a document tag names an event at all, registered or not.
    pub fn is_event_tag(tag: &str) -> bool {
        tag.starts_with(EVENT_TAG_PREFIX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDECTSubscriptionMode {
    pub mode: DectSubscriptionModeType,
}

impl WireElement for EventDECTSubscriptionMode {
    const TAG: &'static str = "EventDECTSubscriptionMode";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG).attr("mode", &self.mode).build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            mode: r.required("mode")?,
        })
    }
}

/// Progress of an alarm call placed by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAlarmCallProgress {
    pub ppn: u32,
    pub trigger: String,
    pub id: u32,
    pub dest_addr: String,
    pub state: String,
}

impl WireElement for EventAlarmCallProgress {
    const TAG: &'static str = "EventAlarmCallProgress";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .attr("ppn", &self.ppn)
            .attr("trigger", &self.trigger)
            .attr("id", &self.id)
            .attr("destAddr", &self.dest_addr)
            .attr("state", &self.state)
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            ppn: r.required("ppn")?,
            trigger: r.required("trigger")?,
            id: r.required("id")?,
            dest_addr: r.required("destAddr")?,
            state: r.required("state")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventRFPSummary {
    pub summary: RfpSummary,
}

impl WireElement for EventRFPSummary {
    const TAG: &'static str = "EventRFPSummary";

    fn to_element(&self) -> Element {
        self.summary.write(ElementBuilder::new(Self::TAG)).build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            summary: RfpSummary::read(&r)?,
        })
    }
}

/// A device or user record was created, changed or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventPPCnf {
    pub deleted_user: Option<bool>,
    pub deleted_pp: Option<bool>,
    pub pp: Option<PPDevType>,
    pub user: Option<PPUserType>,
}

impl WireElement for EventPPCnf {
    const TAG: &'static str = "EventPPCnf";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .opt_flag("deletedPP", self.deleted_pp, BoolStyle::Schema)
            .opt_flag("deletedUser", self.deleted_user, BoolStyle::Schema)
            .opt_child(self.pp.as_ref())
            .opt_child(self.user.as_ref())
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            deleted_user: r.opt_flag("deletedUser", BoolStyle::Schema)?,
            deleted_pp: r.opt_flag("deletedPP", BoolStyle::Schema)?,
            pp: r.child()?,
            user: r.child()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Response;

    fn decode(text: &str) -> Result<Event, DecodeError> {
        Event::decode(&Element::parse(text)?)
    }

    #[test]
    fn test_event_tags_are_unique_and_prefixed() {
        let mut tags = Event::TAGS.to_vec();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), Event::TAGS.len());
        for tag in Event::TAGS {
            assert!(Event::is_event_tag(tag));
            assert!(!Response::is_registered(tag));
        }
    }

    #[test]
    fn test_decode_dect_subscription_mode() {
        let event = decode(r#"<EventDECTSubscriptionMode mode="Configured" />"#).unwrap();
        assert_eq!(event.kind(), EventType::DectSubscriptionMode);
        assert_eq!(
            event,
            Event::DectSubscriptionMode(EventDECTSubscriptionMode {
                mode: DectSubscriptionModeType::Configured
            })
        );
    }

    #[test]
    fn test_decode_alarm_call_progress() {
        let event = decode(
            r#"<EventAlarmCallProgress ppn="5" trigger="asdf" id="99" destAddr="tel:5555" state="ringing" />"#,
        )
        .unwrap();
        let alarm = EventAlarmCallProgress::from_event(&event).unwrap();
        assert_eq!(alarm.ppn, 5);
        assert_eq!(alarm.trigger, "asdf");
        assert_eq!(alarm.id, 99);
        assert_eq!(alarm.dest_addr, "tel:5555");
        assert_eq!(alarm.state, "ringing");
        assert!(EventPPCnf::from_event(&event).is_none());
    }

    #[test]
    fn test_decode_rfp_summary_event() {
        let event = decode(
            r#"<EventRFPSummary nRFPs="5" idFirst="1" nConnected="2" wrongBrandedRFPs="0" DECTactivatedRFPs="1" DECTactiveRFPs="0" usedDECTclusters="1" />"#,
        )
        .unwrap();
        let summary = &EventRFPSummary::from_event(&event).unwrap().summary;
        assert_eq!(summary.connected, 2);
        assert_eq!(summary.dect_activated, 1);
        assert_eq!(summary.dect_active, 0);
        assert_eq!(summary.total, 5);
    }

    #[test]
    fn test_decode_pp_cnf_with_digit_boolean() {
        let event = decode(r#"<EventPPCnf deletedUser="1"><user uid="25" uidSec="0" /></EventPPCnf>"#)
            .unwrap();
        let cnf = EventPPCnf::from_event(&event).unwrap();
        assert_eq!(cnf.deleted_user, Some(true));
        assert_eq!(cnf.deleted_pp, None);
        assert_eq!(cnf.user.as_ref().unwrap().uid, 25);
        assert!(cnf.pp.is_none());
    }

    #[test]
    fn test_unknown_event_tag() {
        let err = decode(r#"<EventLocationChange ppn="1"/>"#).unwrap_err();
        assert_eq!(err, DecodeError::UnknownEvent("EventLocationChange".to_string()));
        assert!(Event::is_event_tag("EventLocationChange"));
        assert!(!Event::is_registered("EventLocationChange"));
    }
}
