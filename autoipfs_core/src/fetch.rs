use async_trait::async_trait;

use crate::api::ByteStream;
use crate::error::{Error, Result};
use crate::source::collect_bytes;

/// A request handed to a [`ScopedFetch`]. `None` bodies are used for GET
/// and HEAD exchanges.
pub type FetchRequest = http::Request<Option<ByteStream>>;
pub type FetchResponse = http::Response<ByteStream>;

/// A caller-supplied request/response exchange bound to a URL scheme the
/// embedding environment resolves natively (`ipfs://` in Agregore-style
/// browsers).
///
/// The core treats this as a capability it is given, not something it
/// implements. `Err` means transport-level failure (scheme unsupported,
/// connection refused); HTTP-level failures come back as responses and are
/// mapped by [`check_fetch_error`].
#[async_trait]
pub trait ScopedFetch: std::fmt::Debug + Send + Sync + 'static {
    async fn fetch(&self, request: FetchRequest) -> std::io::Result<FetchResponse>;
}

/// Maps a non-success response to [`Error::Http`], draining the body as
/// plain text. Callers must not assume any particular body shape on
/// failure.
pub async fn check_fetch_error(response: FetchResponse) -> Result<FetchResponse> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = match collect_bytes(response.into_body()).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    };
    Err(Error::Http {
        status: status.as_u16(),
        body,
    })
}
