use std::sync::Arc;

use axum::{
    body::StreamBody,
    extract::{Extension, Path},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use hyper::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use hyper::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{archive as ArchiveError, Cancellation, Error};

mod compressor;
mod session;
mod sink;
#[cfg(test)]
mod testing;

pub use compressor::{Compressor, ZipCompressor};
use session::{Session, Transfer};
use sink::ResponseSink;

pub async fn handler(
    Path(archive_hash): Path<String>,
    Extension(config): Extension<Arc<Config>>,
    Extension(compressor): Extension<Arc<dyn Compressor>>,
    Extension(shutdown): Extension<CancellationToken>,
) -> Result<Response, Error> {
    let dir = config.dir.archive_dir(&archive_hash).await?;

    let process = compressor.start(&dir).map_err(|err| {
        log::error!(
            "Cannot start compression process for archive {}: {}",
            archive_hash,
            err
        );
        ArchiveError::ProcessSpawn
    })?;
    let (sink, body) = ResponseSink::channel();
    let session = Session::new(archive_hash.clone(), process, sink, &config);

    tokio::spawn(async move {
        match session.run(shutdown).await {
            Ok(Transfer { complete: true, .. }) => (),
            Ok(transfer) => log::info!(
                "Archive {} partially sent ({} bytes in {} chunks), connection closed gracefully",
                archive_hash,
                transfer.bytes,
                transfer.chunks
            ),
            Err(Error::Cancelled(Cancellation::Disconnected)) => {
                log::info!("Download of archive {} interrupted by client", archive_hash)
            }
            Err(Error::Cancelled(Cancellation::Shutdown)) => {
                log::info!("Download of archive {} interrupted by shutdown", archive_hash)
            }
            Err(err) => log::error!("Archive {} streaming failed: {}", archive_hash, err),
        }
    });

    // No content length: hyper falls back to chunked transfer encoding.
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "application/zip"),
            (CONTENT_DISPOSITION, r#"attachment; filename="archive.zip""#),
        ],
        StreamBody::new(body),
    )
        .into_response())
}

pub fn router(
    config: Arc<Config>,
    compressor: Arc<dyn Compressor>,
    shutdown: CancellationToken,
) -> Router {
    Router::new()
        .route("/archive/:archive_hash/", get(handler))
        .route_layer(Extension(config))
        .route_layer(Extension(compressor))
        .route_layer(Extension(shutdown))
}
