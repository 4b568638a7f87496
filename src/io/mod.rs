mod memory;
mod writer;

pub use memory::MemoryResponse;
pub use writer::WriterSink;

use async_trait::async_trait;
use std::io;

/// Destination of a served file: headers plus a streamed body.
///
/// This is the seam to whatever transport carries the download, typically an
/// HTTP response. Headers are set before the first body chunk.
#[async_trait]
pub trait ResponseSink: Send {
    fn set_header(&mut self, name: &str, value: &str);

    fn set_content_type(&mut self, content_type: &str);

    fn set_character_encoding(&mut self, charset: &str);

    /// Write one chunk of the body.
    async fn write_body(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Flush and close the body.
    async fn finish(&mut self) -> io::Result<()>;
}

/// Header block shared by the sink implementations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub charset: Option<String>,
}

impl ResponseHead {
    /// Replace any existing header of the same (case-insensitive) name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `Content-Type` as sent on the wire, e.g. `multipart/form-data;charset=UTF-8`.
    pub fn content_type_header(&self) -> Option<String> {
        match (&self.content_type, &self.charset) {
            (Some(ct), Some(cs)) => Some(format!("{ct};charset={cs}")),
            (Some(ct), None) => Some(ct.clone()),
            (None, _) => None,
        }
    }

    /// All headers, with `Content-Type` last, one `Name: value` per line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .headers
            .iter()
            .map(|(n, v)| format!("{n}: {v}"))
            .collect();
        if let Some(ct) = self.content_type_header() {
            lines.push(format!("Content-Type: {ct}"));
        }
        lines
    }
}
