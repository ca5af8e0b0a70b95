use std::io;

use axum::response::{IntoResponse, Response};
use hyper::header::CONTENT_TYPE;
use hyper::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("archive not found, it may have already been deleted")]
    NotFound,
    #[error("cannot start compression process")]
    ProcessSpawn,
    #[error("archive transfer cancelled: {0}")]
    Cancelled(Cancellation),
    #[error("compression process was already stopped")]
    ProcessAlreadyGone,
    #[error("cannot stop compression process: {0}")]
    Terminate(io::Error),
    #[error("cannot read compression output: {0}")]
    Read(io::Error),
}

/// Why a running transfer stopped before the archive was complete.
#[derive(Error, Copy, Clone, PartialEq, Eq, Debug)]
pub enum Cancellation {
    #[error("client disconnected")]
    Disconnected,
    #[error("server shutting down")]
    Shutdown,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        use Error::*;
        match self {
            NotFound => StatusCode::NOT_FOUND,
            ProcessSpawn => StatusCode::INTERNAL_SERVER_ERROR,
            Cancelled(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProcessAlreadyGone => StatusCode::INTERNAL_SERVER_ERROR,
            Terminate(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Read(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

pub mod archive {
    pub use super::Error::{NotFound, ProcessSpawn};
}

pub mod process {
    pub use super::Error::{ProcessAlreadyGone, Read, Terminate};
}

#[cfg(test)]
mod tests {
    use hyper::StatusCode;

    use super::{Cancellation, Error};

    #[test]
    fn status_codes() {
        assert_eq!(Error::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::ProcessSpawn.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages() {
        assert_eq!(
            Error::Cancelled(Cancellation::Disconnected).to_string(),
            "archive transfer cancelled: client disconnected"
        );
        assert_eq!(
            Error::Cancelled(Cancellation::Shutdown).to_string(),
            "archive transfer cancelled: server shutting down"
        );
    }
}
