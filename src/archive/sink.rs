use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Bytes;
use futures::Stream;
use tokio::sync::{mpsc, oneshot};

/// The client went away and stopped consuming the body.
#[derive(Debug)]
pub struct Disconnected;

/// Writing half of a streamed response body.
///
/// Holds at most one chunk in flight, so a transfer never reads from the
/// compressor faster than the client consumes.
pub struct ResponseSink {
    chunks: mpsc::Sender<Bytes>,
    abort: oneshot::Sender<io::Error>,
}

impl ResponseSink {
    pub fn channel() -> (Self, ArchiveBody) {
        let (chunks_tx, chunks_rx) = mpsc::channel(1);
        let (abort_tx, abort_rx) = oneshot::channel();
        (
            Self {
                chunks: chunks_tx,
                abort: abort_tx,
            },
            ArchiveBody {
                chunks: chunks_rx,
                abort: Some(abort_rx),
                aborted: false,
            },
        )
    }

    pub async fn write(&self, chunk: Bytes) -> Result<(), Disconnected> {
        self.chunks.send(chunk).await.map_err(|_| Disconnected)
    }

    /// Resolves once the body has been dropped.
    pub async fn closed(&self) {
        self.chunks.closed().await
    }

    /// End the body with its terminating chunk.
    pub fn finish(self) {}

    /// End the body with an error, so the connection gets closed instead of
    /// reused with a truncated chunked body.
    pub fn abort(self, reason: &str) {
        let _ = self
            .abort
            .send(io::Error::new(io::ErrorKind::Other, reason.to_owned()));
    }
}

/// Reading half, handed to hyper as the response body.
pub struct ArchiveBody {
    chunks: mpsc::Receiver<Bytes>,
    abort: Option<oneshot::Receiver<io::Error>>,
    aborted: bool,
}

impl Stream for ArchiveBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.aborted {
            return Poll::Ready(None);
        }
        if let Some(abort) = self.abort.as_mut() {
            match Pin::new(abort).poll(cx) {
                Poll::Ready(Ok(err)) => {
                    self.abort = None;
                    self.aborted = true;
                    return Poll::Ready(Some(Err(err)));
                }
                // Sink finished without aborting.
                Poll::Ready(Err(_)) => self.abort = None,
                Poll::Pending => (),
            }
        }
        self.chunks.poll_recv(cx).map(|chunk| chunk.map(Ok))
    }
}
