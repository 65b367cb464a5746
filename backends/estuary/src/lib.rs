use autoipfs_backend_gateway::GatewayBackend;
use autoipfs_core::transport::post_multipart;
use autoipfs_core::{
    Backend, BackendKind, ByteSource, ByteStream, Error, GetOpts, IpfsUri, Result, ESTUARY_URL,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Pinning-service backend over the Estuary HTTP API.
///
/// Like web3.storage, uploads go to the API with a bearer token and reads
/// fall back to a public gateway. Estuary has no CAR ingestion endpoint,
/// so `upload_car` is not supported.
#[derive(Debug, Clone)]
pub struct EstuaryBackend {
    api_url: Url,
    token: String,
    gateway: GatewayBackend,
    client: reqwest::Client,
}

impl EstuaryBackend {
    pub fn create(
        token: &str,
        api_url: Option<&str>,
        gateway_url: Option<&str>,
    ) -> Result<Self> {
        let raw = api_url.unwrap_or(ESTUARY_URL);
        let api_url = Url::parse(raw).map_err(|err| Error::malformed(raw, err))?;
        Ok(Self {
            api_url,
            token: token.to_owned(),
            gateway: GatewayBackend::create(gateway_url)?,
            client: reqwest::Client::new(),
        })
    }

    fn authed(&self, endpoint: &str) -> Result<Url> {
        let mut url = self
            .api_url
            .join(endpoint)
            .map_err(|err| Error::malformed(endpoint, err))?;
        url.set_password(Some(&self.token))
            .map_err(|()| Error::malformed(self.api_url.as_str(), "cannot carry credentials"))?;
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Backend for EstuaryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Estuary
    }

    async fn get(&self, uri: &IpfsUri, opts: GetOpts) -> Result<ByteStream> {
        self.gateway.get(uri, opts).await
    }

    async fn get_size(&self, uri: &IpfsUri, signal: Option<CancellationToken>) -> Result<u64> {
        self.gateway.get_size(uri, signal).await
    }

    async fn upload_file(
        &self,
        source: ByteSource,
        file_name: Option<&str>,
        signal: Option<CancellationToken>,
    ) -> Result<IpfsUri> {
        let file_name = file_name
            .map(str::to_owned)
            .or_else(|| source.name().map(str::to_owned));
        let url = self.authed("content/add")?;
        log::debug!("estuary upload to {}", self.api_url);

        let response =
            post_multipart(&self.client, url, source, file_name.as_deref(), "data", signal).await?;
        let cid = parse_add_response(&response.text().await?)?;
        IpfsUri::parse(&format!("ipfs://{cid}/"))
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

#[derive(Debug, Deserialize)]
struct AddResponse {
    cid: String,
}

fn parse_add_response(text: &str) -> Result<String> {
    let response: AddResponse = serde_json::from_str(text)?;
    Ok(response.cid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_defaults() {
        let backend = EstuaryBackend::create("secret", None, None).unwrap();
        assert_eq!(backend.api_url.as_str(), ESTUARY_URL);
        assert_eq!(backend.kind(), BackendKind::Estuary);
    }

    #[test]
    fn test_parse_add_response() {
        assert_eq!(
            parse_add_response(r#"{"cid":"bafycontent","estuaryId":12}"#).unwrap(),
            "bafycontent"
        );
    }

    #[tokio::test]
    async fn test_car_upload_not_supported() {
        let backend = EstuaryBackend::create("secret", None, None).unwrap();
        let err = backend
            .upload_car(ByteSource::from("car bytes"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NotSupported {
                backend: BackendKind::Estuary,
                ..
            }
        ));
    }
}
