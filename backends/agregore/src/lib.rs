use std::sync::Arc;

use autoipfs_core::fetch::{check_fetch_error, FetchRequest, ScopedFetch};
use autoipfs_core::source::collect_bytes;
use autoipfs_core::transport::{range_header, with_signal, Cancellable};
use autoipfs_core::{
    Backend, BackendKind, ByteSource, ByteStream, Error, GetOpts, IpfsUri, Result,
};
use http::header::{ACCEPT, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, RANGE};
use http::Method;
use tokio_util::sync::CancellationToken;

/// Mutations are posted to the scheme handler's well-known host.
const UPLOAD_URL: &str = "ipfs://localhost/";
const CAR_CONTENT_TYPE: &str = "application/vnd.ipld.car";

/// Backend over a browser-provided `ipfs://` scheme handler, driven
/// through a caller-supplied [`ScopedFetch`] capability.
///
/// The handler addresses content by block; a supplied file name is
/// ignored, and the URI of an upload comes back in the `Location` header.
#[derive(Debug, Clone)]
pub struct AgregoreBackend {
    fetch: Arc<dyn ScopedFetch>,
}

impl AgregoreBackend {
    pub fn new(fetch: Arc<dyn ScopedFetch>) -> Self {
        Self { fetch }
    }

    async fn dispatch(
        &self,
        request: FetchRequest,
        signal: Option<CancellationToken>,
    ) -> Result<http::Response<ByteStream>> {
        let fetch = Arc::clone(&self.fetch);
        let response = with_signal(signal, async move {
            fetch.fetch(request).await.map_err(Error::from_io)
        })
        .await?;
        check_fetch_error(response).await
    }
}

#[async_trait::async_trait]
impl Backend for AgregoreBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Agregore
    }

    async fn get(&self, uri: &IpfsUri, opts: GetOpts) -> Result<ByteStream> {
        let mut builder = http::Request::builder()
            .method(Method::GET)
            .uri(uri.to_string());
        if let Some(range) = range_header(opts.start, opts.end) {
            builder = builder.header(RANGE, range);
        }
        if let Some(format) = &opts.format {
            builder = builder
                .header(ACCEPT, format!("application/vnd.ipld.{format}"))
                .header(CACHE_CONTROL, "no-cache");
        }
        let request = builder.body(None)?;
        log::debug!("scoped fetch get {uri}");

        let response = self.dispatch(request, opts.signal.clone()).await?;
        let body = response.into_body();
        Ok(match opts.signal {
            None => body,
            Some(token) => Box::new(Cancellable::new(body, token)),
        })
    }

    async fn get_size(&self, uri: &IpfsUri, signal: Option<CancellationToken>) -> Result<u64> {
        let request = http::Request::builder()
            .method(Method::HEAD)
            .uri(uri.to_string())
            .body(None)?;
        let response = self.dispatch(request, signal).await?;
        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .ok_or_else(|| Error::SizeUnavailable {
                url: uri.to_string(),
            })
    }

    async fn upload_file(
        &self,
        source: ByteSource,
        _file_name: Option<&str>,
        signal: Option<CancellationToken>,
    ) -> Result<IpfsUri> {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri(UPLOAD_URL)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(Some(source.into_stream()))?;

        let response = self.dispatch(request, signal).await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                Error::UnexpectedResponse("upload response carries no Location".to_string())
            })?;
        location.parse()
    }

    async fn upload_car(
        &self,
        source: ByteSource,
        signal: Option<CancellationToken>,
    ) -> Result<Vec<IpfsUri>> {
        let request = http::Request::builder()
            .method(Method::POST)
            .uri(UPLOAD_URL)
            .header(CONTENT_TYPE, CAR_CONTENT_TYPE)
            .body(Some(source.into_stream()))?;

        let response = self.dispatch(request, signal).await?;
        let body = collect_bytes(response.into_body()).await?;
        parse_roots(&String::from_utf8_lossy(&body))
    }
}

/// The handler answers a CAR post with one root URI per line.
fn parse_roots(text: &str) -> Result<Vec<IpfsUri>> {
    let roots: Vec<IpfsUri> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::parse)
        .collect::<Result<_>>()?;
    if roots.is_empty() {
        return Err(Error::UnexpectedResponse(
            "no roots in archive upload response".to_string(),
        ));
    }
    Ok(roots)
}
