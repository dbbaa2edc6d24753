use super::OmmClient;
use crate::core::errors::{DecodeError, OmmError};
use crate::core::kernel::codec::WireElement;
use crate::messages::{
    GetRFPStatistic, GetRFPStatisticConfig, GetRFPStatisticConfigResp, GetRFPSummary, PutFile,
    RfpStatData, RfpStatHead, RfpStatName, RfpSummary,
};
use tracing::{debug, info, instrument};

/// Statistic counters together with the labels that describe them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfpStatistics {
    pub head: RfpStatHead,
    pub names: Vec<RfpStatName>,
    pub records: Vec<RfpStatData>,
}

impl RfpStatistics {
    /// Counter `elem_id` of every record, labelled.
    pub fn column(&self, elem_id: u32) -> Option<(&RfpStatName, Vec<(u32, i64)>)> {
        let name = self.names.iter().find(|name| name.elem_id == elem_id)?;
        let index = usize::try_from(elem_id).ok()?;
        let values = self
            .records
            .iter()
            .filter_map(|record| record.counter.get(index).map(|value| (record.id, *value)))
            .collect();
        Some((name, values))
    }
}

/// Base station and file maintenance.
impl OmmClient {
    pub async fn rfp_summary(&self) -> Result<RfpSummary, OmmError> {
        Ok(self.send(&GetRFPSummary).await?.summary)
    }

    pub async fn rfp_statistic_config(&self) -> Result<GetRFPStatisticConfigResp, OmmError> {
        self.send(&GetRFPStatisticConfig).await
    }

    /// Read counters starting at base station `first_id`.
    ///
    /// Every record must carry exactly the counter count announced by the
    /// statistic configuration.
    #[instrument(skip(self))]
    pub async fn rfp_statistics(
        &self,
        first_id: u32,
        record_set: Option<u32>,
    ) -> Result<RfpStatistics, OmmError> {
        let config = self.rfp_statistic_config().await?;
        let head = config.head.ok_or_else(|| DecodeError::MissingElement {
            element: GetRFPStatisticConfigResp::TAG.to_string(),
            child: RfpStatHead::TAG.to_string(),
        })?;

        let request = GetRFPStatistic {
            id: first_id,
            max_records: None,
            record_set,
        };
        let resp = self.send(&request).await?;
        resp.validate(head.num_elem_per_rec as usize)?;
        debug!(records = resp.data.len(), "statistics received");

        Ok(RfpStatistics {
            head,
            names: config.names,
            records: resp.data,
        })
    }

    /// Upload `content` as file `name` in `PutFile` chunks.
    ///
    /// Returns the number of requests sent, including the terminal one.
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn upload_file(&self, name: &str, content: &[u8]) -> Result<usize, OmmError> {
        let chunk_size = self.connection.config().file_chunk_size;
        let chunks = PutFile::chunks(name, content, chunk_size);
        let count = chunks.len();
        for chunk in &chunks {
            self.send(chunk).await?;
        }
        info!(chunks = count, "file uploaded");
        Ok(count)
    }
}
