use crate::core::errors::{FrameError, OmmError};
use futures_util::stream::{self, Stream};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

const READ_CHUNK: usize = 8 * 1024;

/// Splits a byte stream into complete top-level XML documents.
///
/// Boundaries are found structurally by balancing start, end and
/// self-closing tags of the root element. Scanning resumes at the last
/// unfinished token, so documents may arrive split across any number of
/// reads. NUL terminators and whitespace between documents are skipped;
/// prologs, comments and doctype declarations outside a root element are
/// dropped.
#[derive(Debug)]
pub struct DocumentScanner {
    buf: Vec<u8>,
    cursor: usize,
    doc_start: Option<usize>,
    open: Vec<String>,
    max_document_bytes: usize,
}

enum Token {
    Incomplete,
    Skipped,
    Open(String),
    Close(String),
    SelfClosed,
}

impl DocumentScanner {
    pub fn new(max_document_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            cursor: 0,
            doc_start: None,
            open: Vec::new(),
            max_document_bytes,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet returned as part of a document.
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next complete document, or `None` until more bytes arrive.
    pub fn next_document(&mut self) -> Result<Option<String>, FrameError> {
        loop {
            if self.doc_start.is_none() {
                self.skip_separators();
                if self.cursor >= self.buf.len() {
                    return Ok(None);
                }
                if self.buf[self.cursor] != b'<' {
                    return Err(FrameError::StrayText {
                        offset: self.cursor,
                        found: char::from(self.buf[self.cursor]),
                    });
                }
            } else {
                // character data inside the root element
                match self.buf[self.cursor..].iter().position(|&b| b == b'<') {
                    Some(offset) => self.cursor += offset,
                    None => {
                        self.cursor = self.buf.len();
                        self.check_size()?;
                        return Ok(None);
                    }
                }
            }

            let token_start = self.cursor;
            match self.scan_token()? {
                Token::Incomplete => {
                    self.cursor = token_start;
                    self.check_size()?;
                    return Ok(None);
                }
                Token::Skipped => {
                    if self.doc_start.is_none() {
                        self.consume();
                    }
                }
                Token::Open(name) => {
                    self.doc_start.get_or_insert(token_start);
                    self.open.push(name);
                }
                Token::SelfClosed => {
                    self.doc_start.get_or_insert(token_start);
                    if self.open.is_empty() {
                        return self.emit().map(Some);
                    }
                }
                Token::Close(name) => {
                    let expected = self
                        .open
                        .pop()
                        .ok_or_else(|| FrameError::UnbalancedEndTag(name.clone()))?;
                    if expected != name {
                        return Err(FrameError::MismatchedEndTag {
                            expected,
                            found: name,
                        });
                    }
                    if self.open.is_empty() {
                        return self.emit().map(Some);
                    }
                }
            }
        }
    }

    /// Called at end of stream; fails if a document was cut off.
    pub fn finish(&self) -> Result<(), FrameError> {
        let leftover = self.buf[self.cursor.min(self.buf.len())..]
            .iter()
            .any(|b| !is_separator(*b));
        if self.doc_start.is_some() || leftover {
            return Err(FrameError::Truncated(self.buf.len()));
        }
        Ok(())
    }

    fn skip_separators(&mut self) {
        while self.cursor < self.buf.len() && is_separator(self.buf[self.cursor]) {
            self.cursor += 1;
        }
        self.consume();
    }

    fn consume(&mut self) {
        self.buf.drain(..self.cursor);
        self.cursor = 0;
    }

    fn check_size(&self) -> Result<(), FrameError> {
        let start = self.doc_start.unwrap_or(0);
        if self.buf.len() - start > self.max_document_bytes {
            return Err(FrameError::DocumentTooLarge {
                limit: self.max_document_bytes,
            });
        }
        Ok(())
    }

    fn emit(&mut self) -> Result<String, FrameError> {
        let start = self.doc_start.take().unwrap_or(0);
        let end = self.cursor;
        if end - start > self.max_document_bytes {
            return Err(FrameError::DocumentTooLarge {
                limit: self.max_document_bytes,
            });
        }
        let document = std::str::from_utf8(&self.buf[start..end])
            .map_err(|_| FrameError::InvalidUtf8)?
            .to_string();
        self.consume();
        trace!(bytes = document.len(), "framed document");
        Ok(document)
    }

    /// Scan one markup token starting at `self.cursor` (which points at `<`).
    fn scan_token(&mut self) -> Result<Token, FrameError> {
        let rest = &self.buf[self.cursor..];
        if rest.len() < 2 {
            return Ok(Token::Incomplete);
        }

        let (terminator, skip): (&[u8], bool) = if rest.starts_with(b"<?") {
            (b"?>", true)
        } else if rest.starts_with(b"<!--") {
            (b"-->", true)
        } else if rest.starts_with(b"<![CDATA[") {
            (b"]]>", true)
        } else if rest.starts_with(b"<!") {
            if rest.len() < 9 && (b"<![CDATA[".starts_with(rest) || b"<!--".starts_with(rest)) {
                return Ok(Token::Incomplete);
            }
            (b">", true)
        } else {
            (b">", false)
        };

        if skip {
            return Ok(match find(rest, terminator) {
                Some(at) => {
                    self.cursor += at + terminator.len();
                    Token::Skipped
                }
                None => Token::Incomplete,
            });
        }

        let Some(end) = find_tag_end(rest) else {
            return Ok(Token::Incomplete);
        };
        let tag = &rest[..=end];
        let token = if tag.starts_with(b"</") {
            Token::Close(tag_name(&tag[2..]))
        } else {
            let name = tag_name(&tag[1..]);
            if name.is_empty() {
                return Err(FrameError::EmptyName(self.cursor));
            }
            if tag.ends_with(b"/>") {
                Token::SelfClosed
            } else {
                Token::Open(name)
            }
        };
        self.cursor += end + 1;
        Ok(token)
    }
}

const fn is_separator(byte: u8) -> bool {
    matches!(byte, 0 | b' ' | b'\t' | b'\r' | b'\n')
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Index of the `>` closing a tag, ignoring any inside quoted attribute values.
fn find_tag_end(tag: &[u8]) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (index, &byte) in tag.iter().enumerate().skip(1) {
        match (quote, byte) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(byte),
            (None, b'>') => return Some(index),
            (None, _) => {}
        }
    }
    None
}

fn tag_name(tag: &[u8]) -> String {
    let end = tag
        .iter()
        .position(|&b| b.is_ascii_whitespace() || b == b'/' || b == b'>')
        .unwrap_or(tag.len());
    String::from_utf8_lossy(&tag[..end]).into_owned()
}

/// Pulls framed documents from an async reader.
pub struct FrameReader<R> {
    reader: R,
    scanner: DocumentScanner,
    chunk: Vec<u8>,
    finished: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_document_bytes: usize) -> Self {
        Self {
            reader,
            scanner: DocumentScanner::new(max_document_bytes),
            chunk: vec![0; READ_CHUNK],
            finished: false,
        }
    }

    /// Next complete document; `None` once the stream has closed cleanly.
    ///
    /// After a fault the reader yields nothing further.
    pub async fn next_document(&mut self) -> Option<Result<String, OmmError>> {
        if self.finished {
            return None;
        }
        loop {
            match self.scanner.next_document() {
                Ok(Some(document)) => return Some(Ok(document)),
                Ok(None) => {}
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            }

            match self.reader.read(&mut self.chunk).await {
                Ok(0) => {
                    self.finished = true;
                    return match self.scanner.finish() {
                        Ok(()) => None,
                        Err(e) => Some(Err(e.into())),
                    };
                }
                Ok(read) => self.scanner.push(&self.chunk[..read]),
                Err(e) => {
                    self.finished = true;
                    return Some(Err(OmmError::NetworkError(format!("read failed: {}", e))));
                }
            }
        }
    }

    /// Lazy stream of documents, ending when the underlying reader closes.
    pub fn into_stream(self) -> impl Stream<Item = Result<String, OmmError>> {
        stream::unfold(self, |mut reader| async move {
            reader.next_document().await.map(|item| (item, reader))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    fn drain(scanner: &mut DocumentScanner) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(doc) = scanner.next_document().unwrap() {
            out.push(doc);
        }
        out
    }

    #[test]
    fn test_splits_concatenated_documents() {
        let mut scanner = DocumentScanner::new(1024);
        scanner.push(b"<PingResp seq=\"1\"/>\0<GetPPUserResp><user uid=\"1\"/><user uid=\"2\"/></GetPPUserResp>\0");
        let docs = drain(&mut scanner);
        assert_eq!(
            docs,
            vec![
                "<PingResp seq=\"1\"/>".to_string(),
                "<GetPPUserResp><user uid=\"1\"/><user uid=\"2\"/></GetPPUserResp>".to_string()
            ]
        );
        assert_eq!(scanner.pending_bytes(), 0);
        scanner.finish().unwrap();
    }

    #[test]
    fn test_documents_split_at_every_byte() {
        let input = "<SetPPResp seq=\"2\"><pp ppn=\"32\" ipei=\"a>b\"/><user uid=\"4\"/></SetPPResp>\0<EventRFPSummary nRFPs=\"5\"/>";
        let mut scanner = DocumentScanner::new(1024);
        let mut docs = Vec::new();
        for byte in input.as_bytes() {
            scanner.push(std::slice::from_ref(byte));
            docs.extend(drain(&mut scanner));
        }
        assert_eq!(docs.len(), 2);
        assert!(docs[0].starts_with("<SetPPResp"));
        assert!(docs[0].ends_with("</SetPPResp>"));
        assert_eq!(docs[1], "<EventRFPSummary nRFPs=\"5\"/>");
    }

    #[test]
    fn test_quoted_gt_does_not_end_tag() {
        let mut scanner = DocumentScanner::new(1024);
        scanner.push(br#"<a title="x/>y"><b note='</a>'/></a>"#);
        let docs = drain(&mut scanner);
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_prolog_and_comments_are_dropped_between_documents() {
        let mut scanner = DocumentScanner::new(1024);
        scanner.push(b"<?xml version=\"1.0\"?>\n<!-- hello --><a><!-- inner --></a>");
        let docs = drain(&mut scanner);
        assert_eq!(docs, vec!["<a><!-- inner --></a>".to_string()]);
    }

    #[test]
    fn test_structural_faults() {
        let mut scanner = DocumentScanner::new(1024);
        scanner.push(b"<a></b>");
        assert_eq!(
            scanner.next_document(),
            Err(FrameError::MismatchedEndTag {
                expected: "a".to_string(),
                found: "b".to_string()
            })
        );

        let mut scanner = DocumentScanner::new(1024);
        scanner.push(b"</a>");
        assert_eq!(
            scanner.next_document(),
            Err(FrameError::UnbalancedEndTag("a".to_string()))
        );

        let mut scanner = DocumentScanner::new(1024);
        scanner.push(b"garbage<a/>");
        assert!(matches!(
            scanner.next_document(),
            Err(FrameError::StrayText { offset: 0, found: 'g' })
        ));
    }

    #[test]
    fn test_document_size_limit() {
        let mut scanner = DocumentScanner::new(16);
        scanner.push(b"<a><b/><b/><b/><b/>");
        assert_eq!(
            scanner.next_document(),
            Err(FrameError::DocumentTooLarge { limit: 16 })
        );
    }

    #[test]
    fn test_finish_reports_truncation() {
        let mut scanner = DocumentScanner::new(1024);
        scanner.push(b"<a><b/>");
        assert_eq!(scanner.next_document(), Ok(None));
        assert!(matches!(scanner.finish(), Err(FrameError::Truncated(_))));
    }

    #[tokio::test]
    async fn test_frame_reader_stream() {
        let (mut tx, rx) = tokio::io::duplex(8);
        let writer = tokio::spawn(async move {
            tx.write_all(b"<PingResp seq=\"1\"/>\0<SubscribeResp seq=\"2\"/>\0")
                .await
                .unwrap();
        });

        let docs: Vec<_> = FrameReader::new(rx, 1024).into_stream().collect().await;
        writer.await.unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].as_ref().unwrap(), "<SubscribeResp seq=\"2\"/>");
    }

    #[tokio::test]
    async fn test_frame_reader_truncated_stream_faults() {
        let (mut tx, rx) = tokio::io::duplex(64);
        tx.write_all(b"<OpenResp ").await.unwrap();
        drop(tx);

        let mut reader = FrameReader::new(rx, 1024);
        let result = reader.next_document().await;
        assert!(matches!(
            result,
            Some(Err(OmmError::FrameError(FrameError::Truncated(_))))
        ));
        assert!(reader.next_document().await.is_none());
    }
}
