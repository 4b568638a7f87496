use async_trait::async_trait;
use std::io;

use super::{ResponseHead, ResponseSink};

/// Response captured in memory.
#[derive(Debug, Default)]
pub struct MemoryResponse {
    pub head: ResponseHead,
    pub body: Vec<u8>,
    pub finished: bool,
    /// Fail every body write after this many bytes; for exercising error paths.
    pub fail_after: Option<usize>,
}

impl MemoryResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(bytes: usize) -> Self {
        Self {
            fail_after: Some(bytes),
            ..Self::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.header(name)
    }
}

#[async_trait]
impl ResponseSink for MemoryResponse {
    fn set_header(&mut self, name: &str, value: &str) {
        self.head.set_header(name, value);
    }

    fn set_content_type(&mut self, content_type: &str) {
        self.head.content_type = Some(content_type.to_string());
    }

    fn set_character_encoding(&mut self, charset: &str) {
        self.head.charset = Some(charset.to_string());
    }

    async fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        if let Some(limit) = self.fail_after {
            if self.body.len() + chunk.len() > limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"));
            }
        }
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }
}
