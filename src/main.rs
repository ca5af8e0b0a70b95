use std::{future, net::SocketAddr, path::Path, sync::Arc};

use axum::{
    extract::ConnectInfo,
    middleware::{self, Next},
    response::Response,
    Router, Server,
};
use clap::Parser;
use hyper::{Body, Request};
use tokio_util::sync::CancellationToken;

use crate::{
    archive::{Compressor, ZipCompressor},
    config::Config,
    misc::format_delay,
    options::Options,
};

mod archive;
mod assets;
mod config;
mod error;
mod misc;
mod options;
mod storage;

async fn logger(req: Request<Body>, next: Next<Body>) -> Response {
    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => {
            log::info!("{} {} {}", addr, req.method(), req.uri().path())
        }
        None => log::info!("{} {}", req.method(), req.uri().path()),
    }
    next.run(req).await
}

async fn check_photo_dir(path: &Path) {
    match tokio::fs::metadata(path).await {
        Ok(md) => {
            if !md.is_dir() {
                exit_error!("Photo path is not a directory");
            }
        }
        Err(err) => exit_error!("Cannot open photo directory: {}", err),
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("Cannot listen for interrupt signal: {}", err);
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                log::error!("Cannot listen for terminate signal: {}", err);
                future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        _ = interrupt => (),
        _ = terminate => (),
    }
    log::info!("Shutting down, interrupting running downloads");
    shutdown.cancel();
}

fn router(config: Arc<Config>, compressor: Arc<dyn Compressor>, shutdown: CancellationToken) -> Router {
    Router::new()
        .merge(assets::router())
        .merge(archive::router(config, compressor, shutdown))
        .layer(middleware::from_fn(logger))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let options = Options::parse();
    env_logger::Builder::new()
        .filter_level(options.log_level())
        .init();

    check_photo_dir(&options.photo_path).await;
    let config = Arc::new(Config::from(&options));
    log::info!(
        "Serving archives from {} (chunk size: {} bytes, throttling delay: {}, keep broken downloads: {})",
        config.dir.path().display(),
        config.chunk_size,
        format_delay(config.throttling_delay),
        config.keep_broken_download,
    );

    let compressor = Arc::new(ZipCompressor::new(options.zip_program.clone()));
    let shutdown = CancellationToken::new();
    let app = router(config, compressor, shutdown.clone());

    let address = SocketAddr::new(options.address, options.port);
    let server = Server::try_bind(&address)
        .unwrap_or_else(|e| exit_error!("Cannot bind {}: {}", address, e));

    log::info!("App is running on: {}", address);
    server
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .unwrap_or_else(|e| exit_error!("Server stopped: {}", e))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hyper::{Body, Request, StatusCode};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::archive::ZipCompressor;
    use crate::config::Config;
    use crate::storage::Dir;

    #[tokio::test]
    async fn routes() {
        let config = Arc::new(Config {
            dir: Dir::new("/nonexistent"),
            chunk_size: 4096,
            throttling_delay: None,
            keep_broken_download: false,
        });
        let app = super::router(
            config,
            Arc::new(ZipCompressor::new("zip".to_owned())),
            CancellationToken::new(),
        );

        for (uri, status) in [
            ("/", StatusCode::OK),
            ("/archive/missingid/", StatusCode::NOT_FOUND),
            ("/unknown", StatusCode::NOT_FOUND),
        ] {
            let resp = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), status, "{}", uri);
        }
    }
}
