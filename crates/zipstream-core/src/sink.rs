//! Response sink abstraction.
//!
//! A sink is the outbound half of an HTTP response: headers are committed
//! once by [`ResponseSink::prepare`], body bytes follow through
//! [`ResponseSink::write`], and [`ResponseSink::force_close`] tears the
//! connection down so the client sees an incomplete transfer instead of a
//! clean end of body.

use std::future::Future;

use bytes::Bytes;

use crate::error::SinkError;

/// File name offered to the client.
pub const ARCHIVE_FILENAME: &str = "archive.zip";

/// Content type of the opaque archive byte stream.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/octet-stream";

/// Headers of a downloadable-attachment response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentHeaders {
    pub content_type: &'static str,
    pub content_disposition: String,
}

impl AttachmentHeaders {
    /// `attachment; filename="<name>"` with an opaque binary content type.
    pub fn attachment(filename: &str) -> Self {
        Self {
            content_type: ARCHIVE_CONTENT_TYPE,
            content_disposition: format!("attachment; filename=\"{filename}\""),
        }
    }

    /// Headers for the streamed `archive.zip` download.
    pub fn archive() -> Self {
        Self::attachment(ARCHIVE_FILENAME)
    }
}

/// Incrementally written response.
pub trait ResponseSink: Send {
    /// Commit the response headers and switch to chunked transfer.
    fn prepare(
        &mut self,
        headers: AttachmentHeaders,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Append one chunk to the body. Fails once the peer is gone.
    fn write(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Mark the body as complete. Called once, only on normal completion.
    fn finish(&mut self) {}

    /// Abort the response so the underlying connection is released.
    fn force_close(&mut self);
}
