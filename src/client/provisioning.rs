use super::OmmClient;
use crate::core::errors::OmmError;
use crate::messages::{
    CreatePPUser, DeletePPDev, DeletePPUser, GetPPDev, GetPPDevSummary, GetPPDevSummaryResp,
    GetPPUser, GetPPUserSummary, GetPPUserSummaryResp, PPDevType, PPUserType, SetPP, SetPPResp,
};
use tracing::instrument;

/// Handset device and user record management.
impl OmmClient {
    pub async fn pp_dev_summary(&self) -> Result<GetPPDevSummaryResp, OmmError> {
        self.send(&GetPPDevSummary).await
    }

    pub async fn pp_user_summary(&self) -> Result<GetPPUserSummaryResp, OmmError> {
        self.send(&GetPPUserSummary).await
    }

    /// Up to `max_records` devices starting at `first_ppn`.
    pub async fn pp_devices(
        &self,
        first_ppn: u32,
        max_records: u32,
    ) -> Result<Vec<PPDevType>, OmmError> {
        let request = GetPPDev {
            ppn: Some(first_ppn),
            max_records: Some(max_records),
        };
        Ok(self.send(&request).await?.devices)
    }

    /// Up to `max_records` users starting at `first_uid`.
    pub async fn pp_users(
        &self,
        first_uid: u32,
        max_records: u32,
    ) -> Result<Vec<PPUserType>, OmmError> {
        let request = GetPPUser {
            uid: Some(first_uid),
            max_records: Some(max_records),
        };
        Ok(self.send(&request).await?.users)
    }

    /// The device with exactly this ppn, if the controller has one.
    pub async fn pp_device(&self, ppn: u32) -> Result<Option<PPDevType>, OmmError> {
        let devices = self.pp_devices(ppn, 1).await?;
        Ok(devices.into_iter().find(|device| device.ppn == ppn))
    }

    pub async fn pp_user(&self, uid: u32) -> Result<Option<PPUserType>, OmmError> {
        let users = self.pp_users(uid, 1).await?;
        Ok(users.into_iter().find(|user| user.uid == uid))
    }

    /// Create or change a device record, a user record, or both at once.
    #[instrument(skip(self, pp, user), fields(
        ppn = pp.as_ref().map(|pp| pp.ppn),
        uid = user.as_ref().map(|user| user.uid),
    ))]
    pub async fn set_pp(
        &self,
        pp: Option<PPDevType>,
        user: Option<PPUserType>,
    ) -> Result<SetPPResp, OmmError> {
        self.send(&SetPP { pp, user }).await
    }

    /// Returns the record as stored, with the uid the controller assigned.
    #[instrument(skip(self, user), fields(name = ?user.name))]
    pub async fn create_pp_user(&self, user: PPUserType) -> Result<PPUserType, OmmError> {
        Ok(self.send(&CreatePPUser { user }).await?.user)
    }

    #[instrument(skip(self))]
    pub async fn delete_pp_dev(&self, ppn: u32) -> Result<(), OmmError> {
        self.send(&DeletePPDev { ppn }).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_pp_user(&self, uid: u32) -> Result<(), OmmError> {
        self.send(&DeletePPUser { uid }).await?;
        Ok(())
    }
}
