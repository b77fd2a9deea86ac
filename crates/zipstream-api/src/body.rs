//! Channel-backed response sink.
//!
//! [`BodySink::channel`] splits one response into the half the proxy writes
//! to and the half the handler returns to axum. Headers travel over a
//! oneshot once the sink is prepared; chunks travel over a bounded mpsc so a
//! slow client applies backpressure to the archiver. Force-closing makes the
//! body stream yield an error, which hyper turns into an aborted
//! connection instead of a clean end of body.

use std::io;

use axum::body::Body;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use zipstream_core::error::SinkError;
use zipstream_core::sink::{AttachmentHeaders, ResponseSink};

/// Chunks buffered between the proxy and hyper.
const BODY_BUFFER: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Idle,
    Streaming,
    Finished,
    Closed,
}

/// Proxy-side half of a streamed response.
pub struct BodySink {
    head: Option<oneshot::Sender<AttachmentHeaders>>,
    tx: Option<mpsc::Sender<Bytes>>,
    abort: CancellationToken,
    state: SinkState,
}

impl BodySink {
    /// Create a sink, the receiver for its headers, and the response body.
    ///
    /// `request` is cancelled when hyper drops the body, so a client that
    /// disconnects is noticed even while the proxy is not writing.
    pub fn channel(
        request: CancellationToken,
    ) -> (BodySink, oneshot::Receiver<AttachmentHeaders>, Body) {
        let (head_tx, head_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel(BODY_BUFFER);
        let abort = CancellationToken::new();

        let body = BodyStream {
            rx,
            abort: abort.clone(),
            _disconnect: request.drop_guard(),
            done: false,
        };

        let sink = BodySink {
            head: Some(head_tx),
            tx: Some(tx),
            abort,
            state: SinkState::Idle,
        };

        (sink, head_rx, body.into_body())
    }
}

impl ResponseSink for BodySink {
    async fn prepare(&mut self, headers: AttachmentHeaders) -> Result<(), SinkError> {
        if self.state != SinkState::Idle {
            return Err(SinkError::AlreadyPrepared);
        }
        let head = self.head.take().ok_or(SinkError::AlreadyPrepared)?;
        head.send(headers).map_err(|_| SinkError::Closed)?;
        self.state = SinkState::Streaming;
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        match self.state {
            SinkState::Streaming => {}
            SinkState::Idle => return Err(SinkError::NotPrepared),
            SinkState::Finished | SinkState::Closed => return Err(SinkError::Closed),
        }
        let tx = self.tx.as_ref().ok_or(SinkError::Closed)?;
        if tx.is_closed() {
            return Err(SinkError::Closed);
        }
        // hyper has nothing to frame for an empty chunk.
        if chunk.is_empty() {
            return Ok(());
        }
        tx.send(chunk).await.map_err(|_| SinkError::Closed)
    }

    fn finish(&mut self) {
        if self.state == SinkState::Streaming {
            self.state = SinkState::Finished;
            self.tx = None;
        }
    }

    fn force_close(&mut self) {
        if self.state != SinkState::Finished {
            debug!("force-closing archive response");
            self.abort.cancel();
            self.state = SinkState::Closed;
            self.tx = None;
        }
    }
}

impl Drop for BodySink {
    fn drop(&mut self) {
        // A body that was started but never finished must not end cleanly.
        if self.state == SinkState::Streaming {
            self.abort.cancel();
        }
    }
}

/// hyper-side half of a streamed response.
struct BodyStream {
    rx: mpsc::Receiver<Bytes>,
    abort: CancellationToken,
    _disconnect: DropGuard,
    done: bool,
}

impl BodyStream {
    fn into_body(self) -> Body {
        let stream = futures_util::stream::unfold(self, |mut st| async move {
            if st.done {
                return None;
            }
            tokio::select! {
                biased;
                _ = st.abort.cancelled() => {
                    st.done = true;
                    let err = io::Error::new(io::ErrorKind::ConnectionAborted, "archive stream aborted");
                    Some((Err(err), st))
                }
                chunk = st.rx.recv() => chunk.map(|bytes| (Ok(bytes), st)),
            }
        });
        Body::from_stream(stream)
    }
}
