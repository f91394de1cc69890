//! Crate-level error for the CLI and configuration surface.

use crate::backend::BackendError;
use crate::workflow::WorkflowError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },
    #[error("cannot parse findings in {path}: {message}")]
    Findings { path: PathBuf, message: String },
    #[error("no server configured; pass --server or set `server` in cfgmark.toml")]
    NoServer,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Display text for the terminal; server errors show their unwrapped body.
    pub fn user_message(&self) -> String {
        match self {
            Error::Backend(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_unwraps_server_body() {
        let err = Error::from(BackendError::Server {
            status: 404,
            body: r#"{"message": "version v9 not found"}"#.into(),
        });
        assert_eq!(err.user_message(), "version v9 not found");
        assert!(err.to_string().starts_with("server returned 404"));
        assert_eq!(
            Error::NoServer.user_message(),
            Error::NoServer.to_string()
        );
    }
}
