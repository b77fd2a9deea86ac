//! Streaming archive proxy.
//!
//! Drives one archiver process per request and copies its output into a
//! [`ResponseSink`] in fixed [`CHUNK_SIZE`] chunks:
//!
//! ```text
//! INIT -> PREPARING -> STREAMING -> {COMPLETED | ABORTING -> FAILED}
//! ```
//!
//! The archiver is spawned before the sink is prepared, so a spawn failure
//! leaves the response untouched. Cancellation is observed at every
//! suspension point (chunk read, sink write, pacing delay). Every exit path
//! out of STREAMING other than a clean exhaustion kills and reaps the
//! archiver and force-closes the sink before the error is returned.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archiver::{Archiver, ArchiverProcess, ExitReport};
use crate::config::{CHUNK_SIZE, EXIT_GRACE, PacingConfig};
use crate::error::{StreamError, StreamResult};
use crate::resolver::SourceDirectory;
use crate::sink::{AttachmentHeaders, ResponseSink};

/// Result of a completed streaming run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    /// Number of `write` calls made on the sink.
    pub chunks: usize,
    /// Total bytes written.
    pub bytes: u64,
    /// Archiver exit, when it could be collected.
    pub exit: Option<ExitReport>,
    /// The archiver outlived its output and had to be killed.
    pub killed: bool,
}

/// Streams archives produced by `A`, pacing chunks per `PacingConfig`.
#[derive(Debug)]
pub struct ArchiveProxy<A> {
    archiver: A,
    pacing: PacingConfig,
}

impl<A: Archiver> ArchiveProxy<A> {
    pub fn new(archiver: A, pacing: PacingConfig) -> Self {
        Self { archiver, pacing }
    }

    pub fn archiver(&self) -> &A {
        &self.archiver
    }

    pub fn pacing(&self) -> PacingConfig {
        self.pacing
    }

    /// Archive `source` into `sink`.
    ///
    /// Returns `StreamError::Cancelled` when `cancel` fires, after cleanup.
    pub async fn stream<S: ResponseSink>(
        &self,
        source: &SourceDirectory,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> StreamResult<StreamSummary> {
        let handle = source.handle();
        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }

        let mut process = self.archiver.start(source.path()).map_err(|e| {
            warn!(handle, error = %e, "failed to start archiver");
            StreamError::Spawn(e)
        })?;

        let mut progress = Progress::default();
        let outcome = match sink.prepare(AttachmentHeaders::archive()).await {
            Ok(()) => {
                debug!(handle, delay = ?self.pacing.delay_between_chunks, "streaming archive");
                self.pump(&mut process, sink, cancel, &mut progress).await
            }
            Err(e) => Err(StreamError::Prepare(e)),
        };

        match outcome {
            Ok(()) => {
                let (exit, killed) = match wait_with_grace(&mut process).await {
                    Some(exit) => (exit, false),
                    None => {
                        warn!(handle, "archiver still running after its output closed, killing");
                        (abort(&mut process, sink).await, true)
                    }
                };
                if !killed {
                    sink.finish();
                }
                log_exit(handle, exit.as_ref());
                info!(handle, chunks = progress.chunks, bytes = progress.bytes, "archive sent");

                Ok(StreamSummary {
                    chunks: progress.chunks,
                    bytes: progress.bytes,
                    exit,
                    killed,
                })
            }
            Err(err) => {
                match &err {
                    StreamError::Cancelled => info!(handle, "download was interrupted"),
                    other => warn!(handle, error = %other, "archive stream failed"),
                }
                let exit = abort(&mut process, sink).await;
                log_exit(handle, exit.as_ref());
                Err(err)
            }
        }
    }

    /// The STREAMING loop. Returns `Ok` only once the output is exhausted.
    async fn pump<S: ResponseSink>(
        &self,
        process: &mut A::Process,
        sink: &mut S,
        cancel: &CancellationToken,
        progress: &mut Progress,
    ) -> StreamResult<()> {
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                read = read_chunk(process.output()) => read.map_err(StreamError::Read)?,
            };

            let exhausted = chunk.len() < CHUNK_SIZE;
            progress.record(chunk.len());
            debug!(chunk = progress.chunks, bytes = chunk.len(), "sending archive chunk");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                written = sink.write(chunk) => written.map_err(StreamError::Write)?,
            }

            if exhausted {
                return Ok(());
            }

            if self.pacing.is_paced() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                    _ = tokio::time::sleep(self.pacing.delay_between_chunks) => {}
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Progress {
    chunks: usize,
    bytes: u64,
}

impl Progress {
    fn record(&mut self, len: usize) {
        self.chunks += 1;
        self.bytes += len as u64;
    }
}

/// Read until `CHUNK_SIZE` bytes are buffered or the output ends.
async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Bytes> {
    let mut buf = Vec::with_capacity(CHUNK_SIZE);
    (&mut *reader)
        .take(CHUNK_SIZE as u64)
        .read_to_end(&mut buf)
        .await?;
    Ok(Bytes::from(buf))
}

/// Reap an archiver whose output is exhausted. `None` means it was still
/// running when the grace period ran out.
async fn wait_with_grace<P: ArchiverProcess>(process: &mut P) -> Option<Option<ExitReport>> {
    match tokio::time::timeout(EXIT_GRACE, process.wait()).await {
        Ok(Ok(exit)) => Some(Some(exit)),
        Ok(Err(e)) => {
            warn!(error = %e, "failed to reap archiver");
            Some(None)
        }
        Err(_) => None,
    }
}

/// The ABORTING sequence: kill if running, reap, force-close the sink.
async fn abort<P: ArchiverProcess, S: ResponseSink>(
    process: &mut P,
    sink: &mut S,
) -> Option<ExitReport> {
    match process.has_exited() {
        Ok(true) => {}
        Ok(false) => {
            if let Err(e) = process.kill() {
                debug!(error = %e, "failed to kill archiver");
            }
        }
        Err(e) => {
            debug!(error = %e, "failed to poll archiver, killing anyway");
            let _ = process.kill();
        }
    }

    let exit = match process.wait().await {
        Ok(exit) => Some(exit),
        Err(e) => {
            warn!(error = %e, "failed to reap archiver");
            None
        }
    };

    sink.force_close();
    exit
}

fn log_exit(handle: &str, exit: Option<&ExitReport>) {
    match exit {
        Some(exit) if exit.success() => debug!(handle, "archiver exited cleanly"),
        Some(exit) => warn!(
            handle,
            exit_code = ?exit.code,
            stderr = %exit.stderr.trim_end(),
            "archiver exited with failure"
        ),
        None => {}
    }
}
