use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{ResponseHead, ResponseSink};

/// Sink that records headers and streams the body into an [`AsyncWrite`]
/// (a file, stdout, a socket).
pub struct WriterSink<W> {
    head: ResponseHead,
    writer: W,
    written: u64,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            head: ResponseHead::default(),
            writer,
            written: 0,
        }
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Body bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ResponseSink for WriterSink<W> {
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
        self.writer.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }
}
