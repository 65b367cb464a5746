use autoipfs_core::transport::{check_error, post_multipart, response_stream, with_signal};
use autoipfs_core::{
    Backend, BackendKind, ByteSource, ByteStream, Error, GetOpts, IpfsUri, Result,
    DEFAULT_DAEMON_API_URL,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Backend over a locally running Kubo daemon's `/api/v0` HTTP API.
///
/// All calls are POSTs with query-string arguments, per the Kubo RPC
/// convention. Uploads pin by default; a failed upload is not rolled back,
/// so callers that need cleanup after a partial failure call
/// [`Backend::clear`] explicitly.
#[derive(Debug, Clone)]
pub struct DaemonBackend {
    api_url: Url,
    client: reqwest::Client,
}

impl DaemonBackend {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn create(api_url: Option<&str>) -> Result<Self> {
        let raw = api_url.unwrap_or(DEFAULT_DAEMON_API_URL);
        let api_url = Url::parse(raw).map_err(|err| Error::malformed(raw, err))?;
        Ok(Self::new(api_url))
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    fn endpoint(&self, endpoint: &str, arg: &str) -> Result<Url> {
        let mut url = self
            .api_url
            .join(endpoint)
            .map_err(|err| Error::malformed(endpoint, err))?;
        url.query_pairs_mut().append_pair("arg", arg);
        Ok(url)
    }

    fn ipld_path(uri: &IpfsUri) -> String {
        format!("/{}/{}{}", uri.scheme(), uri.cid(), uri.path())
    }

    async fn size_via_ls(&self, arg: &str, signal: Option<CancellationToken>) -> Result<u64> {
        let url = self.endpoint("api/v0/ls", arg)?;
        let printable = url.to_string();
        let request = self.client.post(url);
        let response =
            with_signal(signal, async move { check_error(request.send().await?).await }).await?;
        let listing: LsResponse = response.json().await?;

        let links = listing
            .objects
            .into_iter()
            .next()
            .map(|object| object.links)
            .unwrap_or_default();
        if links.is_empty() {
            // A leaf block lists nothing; the dag/stat fallback handles it.
            return Err(Error::SizeUnavailable { url: printable });
        }
        Ok(links.iter().map(|link| link.size).sum())
    }

    async fn size_via_dag_stat(&self, arg: &str, signal: Option<CancellationToken>) -> Result<u64> {
        let mut url = self.endpoint("api/v0/dag/stat", arg)?;
        url.query_pairs_mut().append_pair("progress", "false");
        let printable = url.to_string();
        let request = self.client.post(url);
        let response =
            with_signal(signal, async move { check_error(request.send().await?).await }).await?;
        let text = response.text().await?;
        parse_dag_stat_response(&text)
            .ok_or(Error::SizeUnavailable { url: printable })
    }
}

#[async_trait::async_trait]
impl Backend for DaemonBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Daemon
    }

    async fn get(&self, uri: &IpfsUri, opts: GetOpts) -> Result<ByteStream> {
        let start = opts.start.unwrap_or(0);
        if let Some(end) = opts.end {
            if end < start {
                return Err(Error::malformed(
                    uri.to_string(),
                    format!("byte range end {end} precedes start {start}"),
                ));
            }
        }

        // CAR negotiation maps to dag/export; everything else is cat.
        let url = if opts.format.as_deref() == Some("car") {
            self.endpoint("api/v0/dag/export", uri.cid())?
        } else {
            let mut url = self.endpoint("api/v0/cat", &Self::ipld_path(uri))?;
            {
                let mut pairs = url.query_pairs_mut();
                if let Some(start) = opts.start {
                    pairs.append_pair("offset", &start.to_string());
                }
                if let Some(end) = opts.end {
                    pairs.append_pair("length", &(end - start + 1).to_string());
                }
            }
            url
        };
        log::debug!("daemon get {url}");

        let request = self.client.post(url);
        let response = with_signal(opts.signal.clone(), async move {
            check_error(request.send().await?).await
        })
        .await?;
        Ok(response_stream(response, opts.signal))
    }

    async fn get_size(&self, uri: &IpfsUri, signal: Option<CancellationToken>) -> Result<u64> {
        let arg = Self::ipld_path(uri);
        match self.size_via_ls(&arg, signal.clone()).await {
            Ok(size) => Ok(size),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(err) => {
                log::debug!("ls size lookup failed for {arg} ({err}), trying dag/stat");
                self.size_via_dag_stat(&arg, signal).await
            }
        }
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

        let mut url = self
            .api_url
            .join("api/v0/add")
            .map_err(|err| Error::malformed("api/v0/add", err))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("cid-version", "1")
                .append_pair("inline", "true")
                .append_pair("raw-leaves", "true");
            // Named content gets wrapped in a synthetic directory so the
            // returned URI addresses the entry by name, not a bare block.
            if file_name.is_some() {
                pairs.append_pair("wrap-with-directory", "true");
            }
        }

        let response =
            post_multipart(&self.client, url, source, file_name.as_deref(), "file", signal).await?;
        let text = response.text().await?;
        parse_add_response(&text, file_name.as_deref())
    }

    async fn upload_car(
        &self,
        source: ByteSource,
        signal: Option<CancellationToken>,
    ) -> Result<Vec<IpfsUri>> {
        let mut url = self
            .api_url
            .join("api/v0/dag/import")
            .map_err(|err| Error::malformed("api/v0/dag/import", err))?;
        url.query_pairs_mut().append_pair("allow-big-block", "true");

        let response = post_multipart(&self.client, url, source, None, "file", signal).await?;
        let text = response.text().await?;
        parse_import_response(&text)
    }

    async fn clear(&self, uri: &IpfsUri, signal: Option<CancellationToken>) -> Result<()> {
        let url = self.endpoint("api/v0/pin/rm", &format!("/ipfs/{}", uri.cid()))?;
        log::debug!("daemon unpin {url}");
        let request = self.client.post(url);
        with_signal(signal, async move { check_error(request.send().await?).await }).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct LsResponse {
    #[serde(rename = "Objects", default)]
    objects: Vec<LsObject>,
}

#[derive(Debug, Deserialize)]
struct LsObject {
    #[serde(rename = "Links", default)]
    links: Vec<LsLink>,
}

#[derive(Debug, Deserialize)]
struct LsLink {
    #[serde(rename = "Size", default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct AddRecord {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct ImportRecord {
    #[serde(rename = "Root")]
    root: Option<ImportRoot>,
}

#[derive(Debug, Deserialize)]
struct ImportRoot {
    #[serde(rename = "Cid")]
    cid: CidRef,
}

#[derive(Debug, Deserialize)]
struct CidRef {
    #[serde(rename = "/")]
    cid: String,
}

#[derive(Debug, Deserialize)]
struct DagStatRecord {
    #[serde(rename = "TotalSize")]
    total_size: Option<NumericField>,
    #[serde(rename = "Size")]
    size: Option<NumericField>,
}

/// Kubo has emitted sizes both as numbers and as decimal strings across
/// versions; accept either.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumericField {
    Number(u64),
    Text(String),
}

impl NumericField {
    fn value(&self) -> Option<u64> {
        match self {
            NumericField::Number(value) => Some(*value),
            NumericField::Text(text) => text.parse().ok(),
        }
    }
}

fn ndjson_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter(|line| !line.trim().is_empty())
}

/// Parses the NDJSON body of `api/v0/add`. With a wrapper directory in
/// play the daemon reports the directory with an empty `Name` and the URI
/// addresses the named entry inside it.
fn parse_add_response(text: &str, wrapped_name: Option<&str>) -> Result<IpfsUri> {
    let records: Vec<AddRecord> = ndjson_lines(text)
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;

    if let Some(name) = wrapped_name {
        let dir = records
            .iter()
            .find(|record| record.name.is_empty())
            .or_else(|| records.last())
            .ok_or_else(|| Error::UnexpectedResponse("empty add response".to_string()))?;
        return IpfsUri::parse(&format!("ipfs://{}/{}", dir.hash, name));
    }

    let first = records
        .first()
        .ok_or_else(|| Error::UnexpectedResponse("empty add response".to_string()))?;
    IpfsUri::parse(&format!("ipfs://{}/", first.hash))
}

/// Parses the NDJSON body of `api/v0/dag/import`, skipping stats records.
fn parse_import_response(text: &str) -> Result<Vec<IpfsUri>> {
    let mut roots = Vec::new();
    for line in ndjson_lines(text) {
        let record: ImportRecord = serde_json::from_str(line)?;
        if let Some(root) = record.root {
            roots.push(IpfsUri::parse(&format!("ipfs://{}/", root.cid.cid))?);
        }
    }
    if roots.is_empty() {
        return Err(Error::UnexpectedResponse(
            "no roots in dag/import response".to_string(),
        ));
    }
    Ok(roots)
}

fn parse_dag_stat_response(text: &str) -> Option<u64> {
    let line = ndjson_lines(text).last()?;
    let record: DagStatRecord = serde_json::from_str(line).ok()?;
    record
        .total_size
        .as_ref()
        .and_then(NumericField::value)
        .or_else(|| record.size.as_ref().and_then(NumericField::value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_response_bare_block() {
        let body = r#"{"Name":"","Hash":"bafyfile","Size":"11"}"#;
        let uri = parse_add_response(body, None).unwrap();
        assert_eq!(uri.to_string(), "ipfs://bafyfile/");
    }

    #[test]
    fn test_parse_add_response_wrapped_addresses_named_entry() {
        let body = concat!(
            r#"{"Name":"example.txt","Hash":"bafyfile","Size":"11"}"#,
            "\n",
            r#"{"Name":"","Hash":"bafydir","Size":"69"}"#,
            "\n",
        );
        let uri = parse_add_response(body, Some("example.txt")).unwrap();
        assert_eq!(uri.to_string(), "ipfs://bafydir/example.txt");
    }

    #[test]
    fn test_parse_add_response_empty_body() {
        assert!(matches!(
            parse_add_response("", None),
            Err(Error::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_parse_import_response_skips_stats_records() {
        let body = concat!(
            r#"{"Root":{"Cid":{"/":"bafyroot"},"PinErrorMsg":""}}"#,
            "\n",
            r#"{"Stats":{"BlockCount":2,"BlockBytesCount":116}}"#,
            "\n",
        );
        let roots = parse_import_response(body).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].to_string(), "ipfs://bafyroot/");
    }

    #[test]
    fn test_parse_import_response_without_roots() {
        let body = r#"{"Stats":{"BlockCount":0,"BlockBytesCount":0}}"#;
        assert!(matches!(
            parse_import_response(body),
            Err(Error::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_parse_dag_stat_number_and_string_sizes() {
        assert_eq!(
            parse_dag_stat_response(r#"{"Size":11,"NumBlocks":1}"#),
            Some(11)
        );
        assert_eq!(
            parse_dag_stat_response(r#"{"Size":"11","NumBlocks":1}"#),
            Some(11)
        );
        assert_eq!(
            parse_dag_stat_response(r#"{"TotalSize":42,"NumBlocks":3}"#),
            Some(42)
        );
        assert_eq!(parse_dag_stat_response(""), None);
    }

    #[test]
    fn test_endpoint_builds_query_arg() {
        let backend = DaemonBackend::create(None).unwrap();
        let url = backend
            .endpoint("api/v0/cat", "/ipfs/bafytest/a.txt")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9090/api/v0/cat?arg=%2Fipfs%2Fbafytest%2Fa.txt"
        );
    }

    #[test]
    fn test_create_rejects_invalid_url() {
        assert!(matches!(
            DaemonBackend::create(Some("::not-a-url::")),
            Err(Error::MalformedUri { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_rejects_inverted_range() {
        let backend = DaemonBackend::create(None).unwrap();
        let uri: IpfsUri = "ipfs://bafytest/".parse().unwrap();
        let err = backend
            .get(
                &uri,
                GetOpts {
                    start: Some(5),
                    end: Some(2),
                    ..Default::default()
                },
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::MalformedUri { .. }));
    }
}
