use super::Request;
use crate::core::errors::DecodeError;
use crate::core::kernel::codec::{BoolStyle, Element, ElementBuilder, ElementReader, WireElement};
use crate::core::kernel::session::{ServerIdentity, ServerPublicKey};
use crate::core::types::OmmStbState;
use std::fmt;

/// Protocol version this client speaks unless told otherwise.
pub const DEFAULT_PROTOCOL_VERSION: u32 = 45;

/// Login handshake.
///
/// `protocolVersion` is only written when it differs from the default, and
/// the two capability flags only when set, each in its own spelling.
#[derive(Clone, PartialEq, Eq)]
pub struct Open {
    pub protocol_version: u32,
    pub username: String,
    pub password: String,
    /// Written as `"1"` / `"0"`
    pub omp_client: Option<bool>,
    /// Written as `"true"` / `"false"`
    pub user_device_sync_client: Option<bool>,
}

impl Open {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            username: username.into(),
            password: password.into(),
            omp_client: None,
            user_device_sync_client: None,
        }
    }
}

impl fmt::Debug for Open {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Open")
            .field("protocol_version", &self.protocol_version)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("omp_client", &self.omp_client)
            .field("user_device_sync_client", &self.user_device_sync_client)
            .finish()
    }
}

impl WireElement for Open {
    const TAG: &'static str = "Open";

    fn to_element(&self) -> Element {
        let version =
            (self.protocol_version != DEFAULT_PROTOCOL_VERSION).then_some(&self.protocol_version);
        ElementBuilder::new(Self::TAG)
            .opt_attr("protocolVersion", version)
            .attr("username", &self.username)
            .attr("password", &self.password)
            .opt_flag("OMPClient", self.omp_client, BoolStyle::Digit)
            .opt_flag(
                "UserDeviceSyncClient",
                self.user_device_sync_client,
                BoolStyle::Word,
            )
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            protocol_version: r
                .optional("protocolVersion")?
                .unwrap_or(DEFAULT_PROTOCOL_VERSION),
            username: r.required("username")?,
            password: r.required("password")?,
            omp_client: r.opt_flag("OMPClient", BoolStyle::Digit)?,
            user_device_sync_client: r.opt_flag("UserDeviceSyncClient", BoolStyle::Word)?,
        })
    }
}

impl Request for Open {
    type Response = OpenResp;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub modulus: String,
    pub exponent: String,
}

impl WireElement for PublicKey {
    const TAG: &'static str = "publicKey";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .attr("modulus", &self.modulus)
            .attr("exponent", &self.exponent)
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            modulus: r.required("modulus")?,
            exponent: r.required("exponent")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenResp {
    pub omm_stb_state: Option<OmmStbState>,
    pub omm_version: String,
    pub axi_version: String,
    pub omm_axi_spec_version: Option<String>,
    pub protocol_version: u32,
    /// Only present when the controller reports it
    pub axi_clients: Option<u32>,
    pub public_key: Option<PublicKey>,
}

impl WireElement for OpenResp {
    const TAG: &'static str = "OpenResp";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .opt_attr("ommStbState", self.omm_stb_state.as_ref())
            .attr("ommVersion", &self.omm_version)
            .attr("axiVersion", &self.axi_version)
            .opt_attr("ommAxiSpecVersion", self.omm_axi_spec_version.as_ref())
            .attr("protocolVersion", &self.protocol_version)
            .opt_attr("axiClients", self.axi_clients.as_ref())
            .opt_child(self.public_key.as_ref())
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            omm_stb_state: r.optional("ommStbState")?,
            omm_version: r.required("ommVersion")?,
            axi_version: r.required("axiVersion")?,
            omm_axi_spec_version: r.optional("ommAxiSpecVersion")?,
            protocol_version: r.required("protocolVersion")?,
            axi_clients: r.optional("axiClients")?,
            public_key: r.child()?,
        })
    }
}

impl From<OpenResp> for ServerIdentity {
    fn from(resp: OpenResp) -> Self {
        Self {
            standby_state: resp.omm_stb_state,
            omm_version: resp.omm_version,
            axi_version: resp.axi_version,
            omm_axi_spec_version: resp.omm_axi_spec_version,
            protocol_version: resp.protocol_version,
            axi_clients: resp.axi_clients,
            public_key: resp.public_key.map(|key| ServerPublicKey {
                modulus: key.modulus,
                exponent: key.exponent,
            }),
        }
    }
}
