//! Content streams handed from adapters to sinks

use std::fmt;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

/// An entity's content as a readable stream
///
/// The stream owns whatever handle backs it (an open file, a buffered
/// response body); dropping it releases the handle.
pub struct ContentStream {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    mime_type: Option<String>,
}

impl ContentStream {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            mime_type: None,
        }
    }

    /// Wraps an in-memory body
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(std::io::Cursor::new(bytes.into()))
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Reads the remaining content into memory
    pub async fn read_to_end(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream")
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}
