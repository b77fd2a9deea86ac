//! Error types for resolution and streaming.

use std::io;

use thiserror::Error;

/// Errors raised while mapping a handle to a source directory.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("archive not found: {0}")]
    NotFound(String),

    #[error("invalid archive handle: {0:?}")]
    InvalidHandle(String),
}

/// Errors raised by a response sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The peer went away or the sink was already force-closed.
    #[error("response sink closed")]
    Closed,

    #[error("response sink already prepared")]
    AlreadyPrepared,

    #[error("response sink not prepared")]
    NotPrepared,

    #[error("response sink I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that end a streaming run abnormally.
///
/// Every variant except `Spawn` is raised after the cleanup sequence
/// (kill, reap, force-close) has already run.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to start archiver: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to prepare response: {0}")]
    Prepare(#[source] SinkError),

    #[error("failed to read archiver output: {0}")]
    Read(#[source] io::Error),

    #[error("failed to write archive chunk: {0}")]
    Write(#[source] SinkError),

    #[error("archive stream cancelled")]
    Cancelled,
}

impl StreamError {
    /// Whether the response headers may already have been sent.
    pub fn after_prepare(&self) -> bool {
        !matches!(self, StreamError::Spawn(_) | StreamError::Prepare(_))
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;
pub type StreamResult<T> = Result<T, StreamError>;
