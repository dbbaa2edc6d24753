use super::Request;
use crate::core::errors::DecodeError;
use crate::core::kernel::codec::{Element, ElementBuilder, ElementReader, WireElement};

/// Base station counters, shared by `GetRFPSummaryResp` and `EventRFPSummary`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RfpSummary {
    pub total: u32,
    pub id_first: Option<u32>,
    pub connected: u32,
    pub dect_activated: u32,
    pub dect_active: u32,
    pub wrong_branded: Option<u32>,
    pub wrong_versioned: Option<u32>,
    pub used_dect_clusters: Option<u32>,
    pub used_paging_areas: Option<u32>,
    pub wlan_activated: Option<u32>,
    pub wlan_running: Option<u32>,
}

impl RfpSummary {
    pub(crate) fn write(&self, builder: ElementBuilder) -> ElementBuilder {
        builder
            .attr("nRFPs", &self.total)
            .opt_attr("idFirst", self.id_first.as_ref())
            .attr("nConnected", &self.connected)
            .opt_attr("wrongBrandedRFPs", self.wrong_branded.as_ref())
            .opt_attr("wrongVersionedRFPs", self.wrong_versioned.as_ref())
            .attr("DECTactivatedRFPs", &self.dect_activated)
            .attr("DECTactiveRFPs", &self.dect_active)
            .opt_attr("usedDECTclusters", self.used_dect_clusters.as_ref())
            .opt_attr("usedPagingAreas", self.used_paging_areas.as_ref())
            .opt_attr("WLANactivatedRFPs", self.wlan_activated.as_ref())
            .opt_attr("WLANrunningRFPs", self.wlan_running.as_ref())
    }

    pub(crate) fn read(r: &ElementReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            total: r.required("nRFPs")?,
            id_first: r.optional("idFirst")?,
            connected: r.required("nConnected")?,
            dect_activated: r.required("DECTactivatedRFPs")?,
            dect_active: r.required("DECTactiveRFPs")?,
            wrong_branded: r.optional("wrongBrandedRFPs")?,
            wrong_versioned: r.optional("wrongVersionedRFPs")?,
            used_dect_clusters: r.optional("usedDECTclusters")?,
            used_paging_areas: r.optional("usedPagingAreas")?,
            wlan_activated: r.optional("WLANactivatedRFPs")?,
            wlan_running: r.optional("WLANrunningRFPs")?,
        })
    }
}

/// Declares an attribute-less summary request.
macro_rules! summary_request {
    ($name:ident => $resp:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl WireElement for $name {
            const TAG: &'static str = stringify!($name);

            fn to_element(&self) -> Element {
                Element::new(Self::TAG)
            }

            fn from_element(element: &Element) -> Result<Self, DecodeError> {
                ElementReader::expect(element, Self::TAG)?;
                Ok(Self)
            }
        }

        impl Request for $name {
            type Response = $resp;
        }
    };
}

summary_request!(GetRFPSummary => GetRFPSummaryResp);
summary_request!(GetPPDevSummary => GetPPDevSummaryResp);
summary_request!(GetPPUserSummary => GetPPUserSummaryResp);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetRFPSummaryResp {
    pub summary: RfpSummary,
}

impl WireElement for GetRFPSummaryResp {
    const TAG: &'static str = "GetRFPSummaryResp";

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

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetPPDevSummaryResp {
    pub total: u32,
    pub ppn_first: Option<u32>,
    pub subscribed: u32,
}

impl WireElement for GetPPDevSummaryResp {
    const TAG: &'static str = "GetPPDevSummaryResp";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .attr("nRecords", &self.total)
            .opt_attr("ppnFirst", self.ppn_first.as_ref())
            .attr("subscribedDevs", &self.subscribed)
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            total: r.required("nRecords")?,
            ppn_first: r.optional("ppnFirst")?,
            subscribed: r.required("subscribedDevs")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetPPUserSummaryResp {
    pub total: u32,
    pub uid_first: Option<u32>,
    pub locatable: u32,
    pub sip_registration: u32,
}

impl WireElement for GetPPUserSummaryResp {
    const TAG: &'static str = "GetPPUserSummaryResp";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .attr("nRecords", &self.total)
            .opt_attr("uidFirst", self.uid_first.as_ref())
            .attr("nLocatable", &self.locatable)
            .attr("nSipRegistration", &self.sip_registration)
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            total: r.required("nRecords")?,
            uid_first: r.optional("uidFirst")?,
            locatable: r.required("nLocatable")?,
            sip_registration: r.required("nSipRegistration")?,
        })
    }
}
