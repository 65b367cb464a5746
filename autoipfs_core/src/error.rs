use thiserror::Error;

use crate::api::BackendKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error taxonomy shared by all auto-ipfs crates.
///
/// Detection failures are deliberately absent: an unreachable backend is
/// "candidate absent", never an error. Nothing here is retried
/// automatically; retrying an upload may create duplicate remote content,
/// so retry policy belongs to the caller.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("malformed content URI '{uri}': {reason}")]
    MalformedUri { uri: String, reason: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("no usable Content-Length for {url}")]
    SizeUnavailable { url: String },

    #[error("{operation} is not supported by the {backend} backend")]
    NotSupported {
        backend: BackendKind,
        operation: &'static str,
    },

    #[error("no backend available")]
    NoBackendAvailable,

    #[error("unknown backend kind '{0}'")]
    UnknownBackendKind(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("unexpected response from backend: {0}")]
    UnexpectedResponse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Protocol(#[from] http::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn malformed(uri: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::MalformedUri {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }

    /// Recovers a typed error that crossed an `io::Error` boundary.
    ///
    /// Stream items are `io::Result<Bytes>`, so a typed error raised inside
    /// a stream (e.g. [`Error::Cancelled`]) arrives wrapped. Downcast it
    /// back instead of burying it in an opaque `Io` variant.
    pub fn from_io(err: std::io::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(inner) => inner,
            Err(err) => Error::Io(err),
        }
    }
}
