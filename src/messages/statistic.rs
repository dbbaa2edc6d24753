use super::Request;
use crate::core::errors::DecodeError;
use crate::core::kernel::codec::{Element, ElementBuilder, ElementReader, WireElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetRFPStatisticConfig;

impl WireElement for GetRFPStatisticConfig {
    const TAG: &'static str = "GetRFPStatisticConfig";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG)
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        ElementReader::expect(element, Self::TAG)?;
        Ok(Self)
    }
}

impl Request for GetRFPStatisticConfig {
    type Response = GetRFPStatisticConfigResp;
}

/// Shape of every statistic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfpStatHead {
    /// Counters per `rfpStatData` record
    pub num_elem_per_rec: u32,
    pub record_sets: u32,
    pub resolution: String,
}

impl WireElement for RfpStatHead {
    const TAG: &'static str = "rfpStatHead";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .attr("numElemPerRec", &self.num_elem_per_rec)
            .attr("recordSets", &self.record_sets)
            .attr("resolution", &self.resolution)
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            num_elem_per_rec: r.required("numElemPerRec")?,
            record_sets: r.required("recordSets")?,
            resolution: r.required("resolution")?,
        })
    }
}

/// Label of one counter position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfpStatName {
    pub elem_id: u32,
    pub group: String,
    pub name: String,
}

impl WireElement for RfpStatName {
    const TAG: &'static str = "rfpStatName";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .attr("elemId", &self.elem_id)
            .attr("group", &self.group)
            .attr("name", &self.name)
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            elem_id: r.required("elemId")?,
            group: r.required("group")?,
            name: r.required("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetRFPStatisticConfigResp {
    pub head: Option<RfpStatHead>,
    pub names: Vec<RfpStatName>,
}

impl WireElement for GetRFPStatisticConfigResp {
    const TAG: &'static str = "GetRFPStatisticConfigResp";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .opt_child(self.head.as_ref())
            .children(&self.names)
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            head: r.child()?,
            names: r.children()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetRFPStatistic {
    /// First base station id to report
    pub id: u32,
    pub max_records: Option<u32>,
    pub record_set: Option<u32>,
}

impl WireElement for GetRFPStatistic {
    const TAG: &'static str = "GetRFPStatistic";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .attr("id", &self.id)
            .opt_attr("maxRecords", self.max_records.as_ref())
            .opt_attr("recordSet", self.record_set.as_ref())
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            id: r.required("id")?,
            max_records: r.optional("maxRecords")?,
            record_set: r.optional("recordSet")?,
        })
    }
}

impl Request for GetRFPStatistic {
    type Response = GetRFPStatisticResp;
}

/// Counters of one base station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfpStatData {
    pub id: u32,
    pub counter: Vec<i64>,
}

impl WireElement for RfpStatData {
    const TAG: &'static str = "rfpStatData";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .attr("id", &self.id)
            .packed("counter", &self.counter)
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            id: r.required("id")?,
            counter: r.packed("counter")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetRFPStatisticResp {
    pub data: Vec<RfpStatData>,
}

impl GetRFPStatisticResp {
    /// Check an already decoded response against the configured counter count.
    pub fn validate(&self, expected: usize) -> Result<(), DecodeError> {
        match self.data.iter().find(|record| record.counter.len() != expected) {
            Some(record) => Err(DecodeError::CountMismatch {
                element: RfpStatData::TAG.to_string(),
                attribute: "counter".to_string(),
                expected,
                found: record.counter.len(),
            }),
            None => Ok(()),
        }
    }
}

impl WireElement for GetRFPStatisticResp {
    const TAG: &'static str = "GetRFPStatisticResp";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG).children(&self.data).build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            data: r.children()?,
        })
    }
}
