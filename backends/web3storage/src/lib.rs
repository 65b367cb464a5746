use autoipfs_backend_gateway::GatewayBackend;
use autoipfs_core::transport::{post_multipart, post_raw_body};
use autoipfs_core::{
    Backend, BackendKind, ByteSource, ByteStream, Error, GetOpts, IpfsUri, Result,
    WEB3_STORAGE_URL,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

const CAR_CONTENT_TYPE: &str = "application/vnd.ipld.car";

/// Pinning-service backend over the web3.storage HTTP API.
///
/// Uploads go to the API with a bearer token; reads are served through a
/// public gateway since the service exposes no direct read endpoint.
#[derive(Debug, Clone)]
pub struct Web3StorageBackend {
    api_url: Url,
    token: String,
    gateway: GatewayBackend,
    client: reqwest::Client,
}

impl Web3StorageBackend {
    pub fn create(
        token: &str,
        api_url: Option<&str>,
        gateway_url: Option<&str>,
    ) -> Result<Self> {
        let raw = api_url.unwrap_or(WEB3_STORAGE_URL);
        let api_url = Url::parse(raw).map_err(|err| Error::malformed(raw, err))?;
        Ok(Self {
            api_url,
            token: token.to_owned(),
            gateway: GatewayBackend::create(gateway_url)?,
            client: reqwest::Client::new(),
        })
    }

    /// Endpoint URL with the token embedded as URL password; the transport
    /// layer strips it back out into a `Bearer` header before sending.
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
impl Backend for Web3StorageBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Web3Storage
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
        let url = self.authed("upload")?;
        log::debug!("web3.storage upload to {}", self.api_url);

        let response =
            post_multipart(&self.client, url, source, file_name.as_deref(), "file", signal).await?;
        file_upload_uri(&response.text().await?)
    }

    async fn upload_car(
        &self,
        source: ByteSource,
        signal: Option<CancellationToken>,
    ) -> Result<Vec<IpfsUri>> {
        let url = self.authed("car")?;
        log::debug!("web3.storage car upload to {}", self.api_url);

        let response = post_raw_body(&self.client, url, source, CAR_CONTENT_TYPE, signal).await?;
        parse_upload_response(&response.text().await?)?
            .into_iter()
            .map(|cid| IpfsUri::parse(&format!("ipfs://{cid}/")))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct UploadRecord {
    cid: String,
}

/// The service answers uploads with newline-delimited JSON records, one
/// per root. A single-object body is the one-record case of the same
/// format.
fn parse_upload_response(text: &str) -> Result<Vec<String>> {
    let mut cids = Vec::new();
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        let record: UploadRecord = serde_json::from_str(line)?;
        cids.push(record.cid);
    }
    if cids.is_empty() {
        return Err(Error::UnexpectedResponse(
            "empty upload response".to_string(),
        ));
    }
    Ok(cids)
}

/// A file upload has exactly one root; the entry is addressed by CID
/// alone, whatever name the form carried.
fn file_upload_uri(text: &str) -> Result<IpfsUri> {
    let cids = parse_upload_response(text)?;
    IpfsUri::parse(&format!("ipfs://{}/", cids[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_defaults() {
        let backend = Web3StorageBackend::create("secret", None, None).unwrap();
        assert_eq!(backend.api_url.as_str(), WEB3_STORAGE_URL);
        assert_eq!(backend.kind(), BackendKind::Web3Storage);
    }

    #[test]
    fn test_authed_embeds_token_as_password() {
        let backend = Web3StorageBackend::create("secret", None, None).unwrap();
        let url = backend.authed("car").unwrap();
        assert_eq!(url.password(), Some("secret"));
        assert_eq!(url.path(), "/car");
    }

    #[test]
    fn test_parse_upload_response_single_record() {
        assert_eq!(
            parse_upload_response(r#"{"cid":"bafyroot"}"#).unwrap(),
            vec!["bafyroot"]
        );
        assert!(parse_upload_response("not json").is_err());
        assert!(matches!(
            parse_upload_response("\n  \n"),
            Err(Error::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_parse_upload_response_one_root_per_record() {
        let body = concat!(
            r#"{"cid":"bafyroot1"}"#,
            "\n",
            r#"{"cid":"bafyroot2"}"#,
            "\n",
        );
        assert_eq!(
            parse_upload_response(body).unwrap(),
            vec!["bafyroot1", "bafyroot2"]
        );
    }

    #[test]
    fn test_file_upload_addressed_by_cid_alone() {
        let uri = file_upload_uri(r#"{"cid":"bafyroot"}"#).unwrap();
        assert_eq!(uri.to_string(), "ipfs://bafyroot/");
    }

    #[tokio::test]
    async fn test_clear_not_supported() {
        let backend = Web3StorageBackend::create("secret", None, None).unwrap();
        let uri: IpfsUri = "ipfs://bafytest/".parse().unwrap();
        assert!(matches!(
            backend.clear(&uri, None).await,
            Err(Error::NotSupported { .. })
        ));
    }
}
