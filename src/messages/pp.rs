use super::Request;
use crate::core::errors::DecodeError;
use crate::core::kernel::codec::{BoolStyle, Element, ElementBuilder, ElementReader, WireElement};
use crate::core::types::PpRelType;

/// A portable device record.
///
/// The controller reports many more attributes than are modelled here;
/// unknown attributes are ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PPDevType {
    pub ppn: u32,
    pub ppn_sec: Option<u32>,
    pub rel_type: Option<PpRelType>,
    pub uid: Option<u32>,
    pub time_stamp: Option<i64>,
    pub ipei: Option<String>,
    pub encrypt: Option<bool>,
    pub cap_messaging: Option<bool>,
    pub hw_type: Option<String>,
}

impl PPDevType {
    pub fn new(ppn: u32) -> Self {
        Self {
            ppn,
            ..Self::default()
        }
    }
}

impl WireElement for PPDevType {
    const TAG: &'static str = "pp";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .attr("ppn", &self.ppn)
            .opt_attr("ppnSec", self.ppn_sec.as_ref())
            .opt_attr("relType", self.rel_type.as_ref())
            .opt_attr("uid", self.uid.as_ref())
            .opt_attr("timeStamp", self.time_stamp.as_ref())
            .opt_attr("ipei", self.ipei.as_ref())
            .opt_flag("encrypt", self.encrypt, BoolStyle::Schema)
            .opt_flag("capMessaging", self.cap_messaging, BoolStyle::Schema)
            .opt_attr("hwType", self.hw_type.as_ref())
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            ppn: r.required("ppn")?,
            ppn_sec: r.optional("ppnSec")?,
            rel_type: r.optional("relType")?,
            uid: r.optional("uid")?,
            time_stamp: r.optional("timeStamp")?,
            ipei: r.optional("ipei")?,
            encrypt: r.opt_flag("encrypt", BoolStyle::Schema)?,
            cap_messaging: r.opt_flag("capMessaging", BoolStyle::Schema)?,
            hw_type: r.optional("hwType")?,
        })
    }
}

/// A user record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PPUserType {
    pub uid: u32,
    pub uid_sec: Option<u32>,
    pub rel_type: Option<PpRelType>,
    pub ppn: Option<u32>,
    pub time_stamp: Option<i64>,
    pub name: Option<String>,
    pub num: Option<String>,
    pub hierarchy1: Option<String>,
    pub hierarchy2: Option<String>,
    pub add_id: Option<String>,
    pub pin: Option<String>,
    pub sip_auth_id: Option<String>,
    pub sip_pw: Option<String>,
    pub lang: Option<String>,
    pub permanent: Option<bool>,
    pub locatable: Option<bool>,
}

impl PPUserType {
    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            ..Self::default()
        }
    }
}

impl WireElement for PPUserType {
    const TAG: &'static str = "user";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .attr("uid", &self.uid)
            .opt_attr("uidSec", self.uid_sec.as_ref())
            .opt_attr("relType", self.rel_type.as_ref())
            .opt_attr("ppn", self.ppn.as_ref())
            .opt_attr("timeStamp", self.time_stamp.as_ref())
            .opt_attr("name", self.name.as_ref())
            .opt_attr("num", self.num.as_ref())
            .opt_attr("hierarchy1", self.hierarchy1.as_ref())
            .opt_attr("hierarchy2", self.hierarchy2.as_ref())
            .opt_attr("addId", self.add_id.as_ref())
            .opt_attr("pin", self.pin.as_ref())
            .opt_attr("sipAuthId", self.sip_auth_id.as_ref())
            .opt_attr("sipPw", self.sip_pw.as_ref())
            .opt_attr("lang", self.lang.as_ref())
            .opt_flag("permanent", self.permanent, BoolStyle::Schema)
            .opt_flag("locatable", self.locatable, BoolStyle::Schema)
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            uid: r.required("uid")?,
            uid_sec: r.optional("uidSec")?,
            rel_type: r.optional("relType")?,
            ppn: r.optional("ppn")?,
            time_stamp: r.optional("timeStamp")?,
            name: r.optional("name")?,
            num: r.optional("num")?,
            hierarchy1: r.optional("hierarchy1")?,
            hierarchy2: r.optional("hierarchy2")?,
            add_id: r.optional("addId")?,
            pin: r.optional("pin")?,
            sip_auth_id: r.optional("sipAuthId")?,
            sip_pw: r.optional("sipPw")?,
            lang: r.optional("lang")?,
            permanent: r.opt_flag("permanent", BoolStyle::Schema)?,
            locatable: r.opt_flag("locatable", BoolStyle::Schema)?,
        })
    }
}

/// Declares a message made of an optional device and an optional user record.
macro_rules! pp_pair_message {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $name {
            pub pp: Option<PPDevType>,
            pub user: Option<PPUserType>,
        }

        impl WireElement for $name {
            const TAG: &'static str = stringify!($name);

            fn to_element(&self) -> Element {
                ElementBuilder::new(Self::TAG)
                    .opt_child(self.pp.as_ref())
                    .opt_child(self.user.as_ref())
                    .build()
            }

            fn from_element(element: &Element) -> Result<Self, DecodeError> {
                let r = ElementReader::expect(element, Self::TAG)?;
                Ok(Self {
                    pp: r.child()?,
                    user: r.child()?,
                })
            }
        }
    };
}

pp_pair_message!(SetPP);
pp_pair_message!(SetPPResp);

impl Request for SetPP {
    type Response = SetPPResp;
}

/// Declares a message wrapping exactly one user record.
macro_rules! user_message {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Default)]
        pub struct $name {
            pub user: PPUserType,
        }

        impl WireElement for $name {
            const TAG: &'static str = stringify!($name);

            fn to_element(&self) -> Element {
                ElementBuilder::new(Self::TAG).child(&self.user).build()
            }

            fn from_element(element: &Element) -> Result<Self, DecodeError> {
                let r = ElementReader::expect(element, Self::TAG)?;
                Ok(Self {
                    user: r.required_child()?,
                })
            }
        }
    };
}

user_message!(CreatePPUser);
user_message!(CreatePPUserResp);

impl Request for CreatePPUser {
    type Response = CreatePPUserResp;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetPPUser {
    /// First uid to return
    pub uid: Option<u32>,
    pub max_records: Option<u32>,
}

impl WireElement for GetPPUser {
    const TAG: &'static str = "GetPPUser";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .opt_attr("uid", self.uid.as_ref())
            .opt_attr("maxRecords", self.max_records.as_ref())
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            uid: r.optional("uid")?,
            max_records: r.optional("maxRecords")?,
        })
    }
}

impl Request for GetPPUser {
    type Response = GetPPUserResp;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetPPUserResp {
    pub users: Vec<PPUserType>,
}

impl WireElement for GetPPUserResp {
    const TAG: &'static str = "GetPPUserResp";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG).children(&self.users).build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            users: r.children()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetPPDev {
    /// First ppn to return
    pub ppn: Option<u32>,
    pub max_records: Option<u32>,
}

impl WireElement for GetPPDev {
    const TAG: &'static str = "GetPPDev";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .opt_attr("ppn", self.ppn.as_ref())
            .opt_attr("maxRecords", self.max_records.as_ref())
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            ppn: r.optional("ppn")?,
            max_records: r.optional("maxRecords")?,
        })
    }
}

impl Request for GetPPDev {
    type Response = GetPPDevResp;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetPPDevResp {
    pub devices: Vec<PPDevType>,
}

impl WireElement for GetPPDevResp {
    const TAG: &'static str = "GetPPDevResp";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG).children(&self.devices).build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            devices: r.children()?,
        })
    }
}

/// Declares a delete request keyed by one id and its acknowledgement.
macro_rules! delete_message {
    ($name:ident, $resp:ident, $field:ident => $attr:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name {
            pub $field: u32,
        }

        impl WireElement for $name {
            const TAG: &'static str = stringify!($name);

            fn to_element(&self) -> Element {
                ElementBuilder::new(Self::TAG).attr($attr, &self.$field).build()
            }

            fn from_element(element: &Element) -> Result<Self, DecodeError> {
                let r = ElementReader::expect(element, Self::TAG)?;
                Ok(Self {
                    $field: r.required($attr)?,
                })
            }
        }

        impl Request for $name {
            type Response = $resp;
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $resp {
            pub $field: Option<u32>,
        }

        impl WireElement for $resp {
            const TAG: &'static str = stringify!($resp);

            fn to_element(&self) -> Element {
                ElementBuilder::new(Self::TAG)
                    .opt_attr($attr, self.$field.as_ref())
                    .build()
            }

            fn from_element(element: &Element) -> Result<Self, DecodeError> {
                let r = ElementReader::expect(element, Self::TAG)?;
                Ok(Self {
                    $field: r.optional($attr)?,
                })
            }
        }
    };
}

delete_message!(DeletePPDev, DeletePPDevResp, ppn => "ppn");
delete_message!(DeletePPUser, DeletePPUserResp, uid => "uid");
