use autoipfs_core::transport::{head_size, ranged_get};
use autoipfs_core::{
    Backend, BackendKind, ByteSource, ByteStream, Error, GetOpts, IpfsUri, Result, W3S_LINK_URL,
};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Read-only backend over a public HTTP gateway.
///
/// Resolves `ipfs://` / `ipns://` URIs to `<gateway>/<scheme>/<cid><path>`
/// and serves `get`/`get_size` only; every mutating operation fails with
/// `NotSupported`. Also used internally by the pinning-service backends
/// for their read path.
#[derive(Debug, Clone)]
pub struct GatewayBackend {
    gateway_url: Url,
    client: reqwest::Client,
}

impl GatewayBackend {
    pub fn new(gateway_url: Url) -> Self {
        Self {
            gateway_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn create(gateway_url: Option<&str>) -> Result<Self> {
        let raw = gateway_url.unwrap_or(W3S_LINK_URL);
        let gateway_url = Url::parse(raw).map_err(|err| Error::malformed(raw, err))?;
        Ok(Self::new(gateway_url))
    }

    pub fn gateway_url(&self) -> &Url {
        &self.gateway_url
    }
}

#[async_trait::async_trait]
impl Backend for GatewayBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ReadonlyGateway
    }

    async fn get(&self, uri: &IpfsUri, opts: GetOpts) -> Result<ByteStream> {
        let url = uri.to_gateway_url(&self.gateway_url)?;
        log::debug!("gateway get {url}");
        ranged_get(
            &self.client,
            url,
            opts.start,
            opts.end,
            opts.format.as_deref(),
            opts.signal,
        )
        .await
    }

    async fn get_size(&self, uri: &IpfsUri, signal: Option<CancellationToken>) -> Result<u64> {
        head_size(&self.client, uri.to_gateway_url(&self.gateway_url)?, signal).await
    }

    async fn upload_file(
        &self,
        _source: ByteSource,
        _file_name: Option<&str>,
        _signal: Option<CancellationToken>,
    ) -> Result<IpfsUri> {
        Err(Error::NotSupported {
            backend: self.kind(),
            operation: "upload_file",
        })
    }

    async fn upload_car(
        &self,
        _source: ByteSource,
        _signal: Option<CancellationToken>,
    ) -> Result<Vec<IpfsUri>> {
        Err(Error::NotSupported {
            backend: self.kind(),
            operation: "upload_car",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_defaults_to_public_gateway() {
        let backend = GatewayBackend::create(None).unwrap();
        assert_eq!(backend.gateway_url().as_str(), W3S_LINK_URL);
        assert_eq!(backend.kind(), BackendKind::ReadonlyGateway);
    }

    #[test]
    fn test_create_rejects_invalid_url() {
        assert!(matches!(
            GatewayBackend::create(Some("not a url")),
            Err(Error::MalformedUri { .. })
        ));
    }

    #[tokio::test]
    async fn test_mutating_operations_not_supported() {
        let backend = GatewayBackend::create(None).unwrap();
        let uri: IpfsUri = "ipfs://bafytest/".parse().unwrap();

        let err = backend
            .upload_file(ByteSource::from("data"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported { .. }));

        let err = backend
            .upload_car(ByteSource::from("data"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported { .. }));

        let err = backend.clear(&uri, None).await.unwrap_err();
        assert!(matches!(err, Error::NotSupported { .. }));
    }
}
