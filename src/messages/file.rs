use super::Request;
use crate::core::errors::DecodeError;
use crate::core::kernel::codec::{BoolStyle, Element, ElementBuilder, ElementReader, WireElement};

/// One chunk of a file upload.
///
/// The terminal chunk carries no data and `eof="true"`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PutFile {
    pub name: String,
    pub offset: u64,
    pub data: Vec<u8>,
    pub eof: bool,
}

impl PutFile {
    /// Split `content` into the request sequence that uploads it.
    pub fn chunks(name: &str, content: &[u8], chunk_size: usize) -> Vec<Self> {
        let chunk_size = chunk_size.max(1);
        let mut requests: Vec<Self> = content
            .chunks(chunk_size)
            .enumerate()
            .map(|(index, chunk)| Self {
                name: name.to_string(),
                offset: (index * chunk_size) as u64,
                data: chunk.to_vec(),
                eof: false,
            })
            .collect();
        requests.push(Self {
            name: name.to_string(),
            offset: content.len() as u64,
            data: Vec::new(),
            eof: true,
        });
        requests
    }
}

impl WireElement for PutFile {
    const TAG: &'static str = "PutFile";

    fn to_element(&self) -> Element {
        ElementBuilder::new(Self::TAG)
            .attr("name", &self.name)
            .attr("offset", &self.offset)
            .binary("data", &self.data)
            .opt_flag("eof", self.eof.then_some(true), BoolStyle::Word)
            .build()
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let r = ElementReader::expect(element, Self::TAG)?;
        Ok(Self {
            name: r.required("name")?,
            offset: r.required("offset")?,
            data: r.binary("data")?,
            eof: r.opt_flag("eof", BoolStyle::Word)?.unwrap_or(false),
        })
    }
}

impl Request for PutFile {
    type Response = PutFileResp;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PutFileResp;

impl WireElement for PutFileResp {
    const TAG: &'static str = "PutFileResp";

    fn to_element(&self) -> Element {
        Element::new(Self::TAG)
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        ElementReader::expect(element, Self::TAG)?;
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_data_chunk() {
        let chunk = PutFile {
            name: ":license".to_string(),
            offset: 1000,
            data: b"nseFile>".to_vec(),
            eof: false,
        };
        assert_eq!(
            chunk.encode().unwrap(),
            r#"<PutFile name=":license" offset="1000" data="bnNlRmlsZT4="/>"#
        );
    }

    #[test]
    fn test_encode_terminal_chunk() {
        let chunk = PutFile {
            name: ":license".to_string(),
            offset: 1008,
            data: Vec::new(),
            eof: true,
        };
        assert_eq!(
            chunk.encode().unwrap(),
            r#"<PutFile name=":license" offset="1008" data="" eof="true"/>"#
        );
        assert_eq!(PutFile::decode(&chunk.encode().unwrap()).unwrap(), chunk);
    }

    #[test]
    fn test_chunking_covers_content_then_terminates() {
        let content: Vec<u8> = (0..10).collect();
        let requests = PutFile::chunks(":license", &content, 4);

        let offsets: Vec<_> = requests.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8, 10]);
        assert_eq!(requests[2].data, vec![8, 9]);

        let last = requests.last().unwrap();
        assert!(last.eof);
        assert!(last.data.is_empty());
        assert!(requests[..3].iter().all(|r| !r.eof));

        let rebuilt: Vec<u8> = requests.iter().flat_map(|r| r.data.clone()).collect();
        assert_eq!(rebuilt, content);
    }

    #[test]
    fn test_empty_file_is_a_single_terminal_chunk() {
        let requests = PutFile::chunks("empty", &[], 4096);
        assert_eq!(requests.len(), 1);
        assert!(requests[0].eof);
        assert_eq!(requests[0].offset, 0);
    }
}
