use super::{
    CreatePPUserResp, DeletePPDevResp, DeletePPUserResp, GetPPDevResp, GetPPDevSummaryResp,
    GetPPUserResp, GetPPUserSummaryResp, GetRFPStatisticConfigResp, GetRFPStatisticResp,
    GetRFPSummaryResp, OpenResp, PingResp, PutFileResp, SetPPResp, SubscribeResp,
};
use crate::core::errors::{DecodeError, OmmError};
use crate::core::kernel::codec::{Element, WireElement};
use crate::core::kernel::correlator::SequenceId;
use crate::core::types::ErrorCode;

/// Container tag some controller builds wrap around a response payload.
pub const ENVELOPE_TAG: &str = "Response";
/// Sequence id attribute, set on requests and echoed on responses.
pub const SEQ_ATTR: &str = "seq";
/// Controller error code attribute.
pub const ERR_CODE_ATTR: &str = "errCode";
/// Free-text detail accompanying `errCode`.
pub const ERR_INFO_ATTR: &str = "info";

/// A concrete response message kind.
pub trait ResponseMessage: WireElement + Send + 'static {
    /// Take this kind out of the union, handing back anything else untouched.
    fn from_response(response: Response) -> Result<Self, Response>;
}

macro_rules! response_registry {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        /// Every response kind the client understands.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Response {
            $($variant($ty),)+
            /// Envelope that carried no payload
            Empty,
        }

        impl Response {
            /// Payload tags the registry can decode.
            pub const TAGS: &'static [&'static str] = &[$(<$ty as WireElement>::TAG),+];

            pub fn tag(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => <$ty as WireElement>::TAG,)+
                    Self::Empty => ENVELOPE_TAG,
                }
            }

            fn decode_payload(element: &Element) -> Result<Self, DecodeError> {
                $(
                    if element.name == <$ty as WireElement>::TAG {
                        return <$ty as WireElement>::from_element(element).map(Self::$variant);
                    }
                )+
                Err(DecodeError::UnknownResponse(element.name.clone()))
            }
        }

        $(
            impl From<$ty> for Response {
                fn from(response: $ty) -> Self {
                    Self::$variant(response)
                }
            }

            impl ResponseMessage for $ty {
                fn from_response(response: Response) -> Result<Self, Response> {
                    match response {
                        Response::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )+
    };
}

response_registry! {
    Open(OpenResp),
    Ping(PingResp),
    Subscribe(SubscribeResp),
    GetRfpSummary(GetRFPSummaryResp),
    GetPpDevSummary(GetPPDevSummaryResp),
    GetPpUserSummary(GetPPUserSummaryResp),
    SetPp(SetPPResp),
    CreatePpUser(CreatePPUserResp),
    GetPpUser(GetPPUserResp),
    GetPpDev(GetPPDevResp),
    DeletePpDev(DeletePPDevResp),
    DeletePpUser(DeletePPUserResp),
    PutFile(PutFileResp),
    GetRfpStatisticConfig(GetRFPStatisticConfigResp),
    GetRfpStatistic(GetRFPStatisticResp),
}

impl Response {
    pub fn is_registered(tag: &str) -> bool {
        Self::TAGS.contains(&tag)
    }

    /// The element carrying the response payload.
    ///
    /// For an envelope this is its single child (`None` when empty); any other
    /// root is the payload itself.
    pub fn payload(document: &Element) -> Result<Option<&Element>, DecodeError> {
        if document.name != ENVELOPE_TAG {
            return Ok(Some(document));
        }
        match document.children.as_slice() {
            [] => Ok(None),
            [payload] => Ok(Some(payload)),
            more => Err(DecodeError::Malformed(format!(
                "<{}> holds {} payload elements",
                ENVELOPE_TAG,
                more.len()
            ))),
        }
    }

    /// Tag used to match a response that carries no sequence id.
    pub fn payload_tag(document: &Element) -> &str {
        match Self::payload(document) {
            Ok(Some(payload)) => payload.name.as_str(),
            _ => document.name.as_str(),
        }
    }

    /// The echoed sequence id, if any. `seq="0"` counts as absent.
    pub fn sequence_id(document: &Element) -> Result<Option<SequenceId>, DecodeError> {
        let raw = document.attr(SEQ_ATTR).or_else(|| {
            document
                .children
                .first()
                .filter(|_| document.name == ENVELOPE_TAG)
                .and_then(|payload| payload.attr(SEQ_ATTR))
        });
        let Some(raw) = raw else {
            return Ok(None);
        };
        let seq = raw
            .trim()
            .parse::<SequenceId>()
            .map_err(|e| DecodeError::InvalidValue {
                element: document.name.clone(),
                attribute: SEQ_ATTR.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            })?;
        Ok((seq != 0).then_some(seq))
    }

    /// Root tag and sequence id read straight from the text of a document
    /// that does not parse, so its request can still be failed.
    pub fn peek_header(document: &str) -> Option<(&str, Option<SequenceId>)> {
        let mut rest = document;
        let start = loop {
            let at = rest.find('<')?;
            rest = &rest[at + 1..];
            if !rest.starts_with(|c| c == '?' || c == '!') {
                break rest;
            }
        };
        let head = &start[..start.find('>').unwrap_or(start.len())];
        let name_end = head
            .find(|c: char| c.is_whitespace() || c == '/')
            .unwrap_or(head.len());
        let tag = &head[..name_end];
        if tag.is_empty() {
            return None;
        }

        let attrs = &head[name_end..];
        let seq = attrs
            .match_indices("seq=")
            .filter(|(at, _)| attrs[..*at].ends_with(char::is_whitespace))
            .find_map(|(at, key)| {
                let value = &attrs[at + key.len()..];
                let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
                let value = &value[1..];
                value[..value.find(quote)?].trim().parse::<SequenceId>().ok()
            })
            .filter(|seq| *seq != 0);
        Some((tag, seq))
    }

    /// Decode a complete response document.
    ///
    /// A payload carrying a failure `errCode` becomes
    /// [`OmmError::ProtocolError`] without its fields being decoded.
    pub fn decode_document(document: &Element) -> Result<Self, OmmError> {
        let Some(payload) = Self::payload(document)? else {
            return Ok(Self::Empty);
        };

        let code = payload
            .attr(ERR_CODE_ATTR)
            .or_else(|| document.attr(ERR_CODE_ATTR))
            .filter(|code| !ErrorCode::is_success(code));
        if let Some(code) = code {
            let info = payload
                .attr(ERR_INFO_ATTR)
                .or_else(|| document.attr(ERR_INFO_ATTR))
                .map(str::to_string);
            return Err(OmmError::ProtocolError {
                code: ErrorCode::from(code),
                info,
            });
        }

        Ok(Self::decode_payload(payload)?)
    }

    /// Convert into the expected concrete kind.
    pub fn into_message<M: ResponseMessage>(self) -> Result<M, OmmError> {
        M::from_response(self).map_err(|other| OmmError::UnexpectedResponse {
            expected: M::TAG,
            actual: other.tag().to_string(),
        })
    }
}
