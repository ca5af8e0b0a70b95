use std::future::Future;
use std::time::Duration;

use axum::body::Bytes;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::archive::compressor::CompressionProcess;
use crate::archive::sink::ResponseSink;
use crate::config::Config;
use crate::error::{process as ProcessError, Cancellation, Error};

/// What a transfer managed to send when it did not end with an error.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Transfer {
    pub chunks: usize,
    pub bytes: u64,
    pub complete: bool,
}

/// One in-flight archive transfer: relays a compressor's output to a
/// response body, chunk by chunk, until EOF or cancellation.
pub struct Session {
    id: String,
    process: Box<dyn CompressionProcess>,
    sink: ResponseSink,
    chunk_size: usize,
    throttling_delay: Option<Duration>,
    keep_broken_download: bool,
    chunks: usize,
    bytes: u64,
}

impl Session {
    pub fn new(
        id: String,
        process: Box<dyn CompressionProcess>,
        sink: ResponseSink,
        config: &Config,
    ) -> Self {
        Self {
            id,
            process,
            sink,
            chunk_size: config.chunk_size,
            throttling_delay: config.throttling_delay,
            keep_broken_download: config.keep_broken_download,
            chunks: 0,
            bytes: 0,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) -> Result<Transfer, Error> {
        log::info!("Starting to send archive {}", self.id);
        let mut buf = vec![0; self.chunk_size];
        loop {
            let read = interruptible(
                &shutdown,
                &self.sink,
                self.process.output().read(&mut buf),
            )
            .await;
            let read = match read {
                Ok(Ok(0)) => return Ok(self.complete().await),
                Ok(Ok(read)) => read,
                Ok(Err(err)) => return Err(self.fail(err).await),
                Err(reason) => return self.cancel(reason).await,
            };

            log::debug!("Sending archive {} chunk #{}", self.id, self.chunks);
            let chunk = Bytes::copy_from_slice(&buf[..read]);
            let written = interruptible(&shutdown, &self.sink, self.sink.write(chunk)).await;
            match written {
                Ok(Ok(())) => (),
                Ok(Err(_)) => return self.cancel(Cancellation::Disconnected).await,
                Err(reason) => return self.cancel(reason).await,
            }
            self.chunks += 1;
            self.bytes += read as u64;

            if let Some(delay) = self.throttling_delay {
                let slept = interruptible(&shutdown, &self.sink, tokio::time::sleep(delay)).await;
                if let Err(reason) = slept {
                    return self.cancel(reason).await;
                }
            }
        }
    }

    fn transfer(&self, complete: bool) -> Transfer {
        Transfer {
            chunks: self.chunks,
            bytes: self.bytes,
            complete,
        }
    }

    async fn complete(self) -> Transfer {
        log::info!(
            "Archive {} sent ({} bytes in {} chunks)",
            self.id,
            self.bytes,
            self.chunks
        );
        let transfer = self.transfer(true);
        let Self {
            id,
            mut process,
            sink,
            ..
        } = self;
        sink.finish();
        match process.wait().await {
            Ok(Some(0)) => (),
            Ok(Some(code)) => log::warn!(
                "Compression process of archive {} exited with code {}",
                id,
                code
            ),
            Ok(None) => log::warn!("Compression process of archive {} was killed", id),
            Err(err) => log::error!(
                "Cannot reap compression process of archive {}: {}",
                id,
                err
            ),
        }
        transfer
    }

    async fn cancel(mut self, reason: Cancellation) -> Result<Transfer, Error> {
        log::debug!("Archive {} transfer interrupted: {}", self.id, reason);
        self.stop_process().await;

        if self.keep_broken_download {
            log::debug!("Returning everything sent so far for archive {}", self.id);
            let transfer = self.transfer(false);
            self.sink.finish();
            return Ok(transfer);
        }

        log::debug!("Closing connection of archive {}", self.id);
        self.sink.abort("archive transfer cancelled");
        Err(Error::Cancelled(reason))
    }

    // Keep-broken-download only covers cancellation: a failing compressor
    // always aborts the body so the client cannot mistake it for a full archive.
    async fn fail(mut self, err: std::io::Error) -> Error {
        log::error!("Cannot read archive {} from compressor: {}", self.id, err);
        self.stop_process().await;
        self.sink.abort("archive compression failed");
        ProcessError::Read(err)
    }

    async fn stop_process(&mut self) {
        if !self.process.has_exited() {
            log::debug!("Stopping compression process of archive {}", self.id);
            match self.process.terminate() {
                Ok(()) => (),
                Err(ProcessError::ProcessAlreadyGone) => log::warn!(
                    "Compression process of archive {} was already stopped",
                    self.id
                ),
                Err(err) => log::error!("{}", err),
            }
        }
        if let Err(err) = self.process.wait().await {
            log::error!(
                "Cannot reap compression process of archive {}: {}",
                self.id,
                err
            );
        }
    }
}

// Run one suspension point of a transfer, giving up early on server shutdown
// or when the client stops listening.
async fn interruptible<F: Future>(
    shutdown: &CancellationToken,
    sink: &ResponseSink,
    operation: F,
) -> Result<F::Output, Cancellation> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Err(Cancellation::Shutdown),
        _ = sink.closed() => Err(Cancellation::Disconnected),
        output = operation => Ok(output),
    }
}
