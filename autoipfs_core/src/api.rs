use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::source::ByteSource;
use crate::uri::IpfsUri;

/// Canonical chunked-byte representation used across all backends.
pub type ByteStream = Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Unpin + 'static>;

/// Ports an embedded browser daemon may expose its HTTP API on.
pub const BRAVE_PORTS: [u16; 5] = [45001, 45002, 45003, 45004, 45005];
pub const W3S_LINK_URL: &str = "https://w3s.link/";
pub const WEB3_STORAGE_URL: &str = "https://api.web3.storage/";
pub const ESTUARY_URL: &str = "https://api.estuary.tech/";
pub const DEFAULT_DAEMON_API_URL: &str = "http://localhost:9090/";

/// The closed set of backend kinds this workspace knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "agregore")]
    Agregore,
    #[serde(rename = "daemon")]
    Daemon,
    #[serde(rename = "web3.storage")]
    Web3Storage,
    #[serde(rename = "estuary")]
    Estuary,
    #[serde(rename = "readonly")]
    ReadonlyGateway,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Agregore => "agregore",
            BackendKind::Daemon => "daemon",
            BackendKind::Web3Storage => "web3.storage",
            BackendKind::Estuary => "estuary",
            BackendKind::ReadonlyGateway => "readonly",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "agregore" => Ok(BackendKind::Agregore),
            "daemon" => Ok(BackendKind::Daemon),
            "web3.storage" => Ok(BackendKind::Web3Storage),
            "estuary" => Ok(BackendKind::Estuary),
            "readonly" => Ok(BackendKind::ReadonlyGateway),
            other => Err(Error::UnknownBackendKind(other.to_string())),
        }
    }
}

/// Configuration for one detected backend.
///
/// Carries no live connection; descriptors are rebuilt on every detection
/// pass and turned into clients by the `autoipfs` facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    #[serde(rename = "type")]
    pub kind: BackendKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
}

/// Options for [`Backend::get`]. `start`/`end` are byte offsets, `end`
/// inclusive, matching HTTP Range semantics. `format` requests an
/// alternative block encoding (e.g. `car`) where the backend supports
/// content negotiation.
#[derive(Debug, Clone, Default)]
pub struct GetOpts {
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub format: Option<String>,
    pub signal: Option<CancellationToken>,
}

/// The uniform client contract every backend adapter implements.
///
/// Implementations are stateless between calls apart from their bound
/// configuration, and may be used concurrently from multiple call sites.
/// A [`ByteSource`] passed to an upload is consumed exactly once.
#[async_trait]
pub trait Backend: fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> BackendKind;

    /// Reads content as a lazy byte stream, optionally ranged.
    async fn get(&self, uri: &IpfsUri, opts: GetOpts) -> Result<ByteStream>;

    /// Reports the content size in bytes.
    async fn get_size(&self, uri: &IpfsUri, signal: Option<CancellationToken>) -> Result<u64>;

    /// Uploads one file; returns the URI addressing it.
    async fn upload_file(
        &self,
        source: ByteSource,
        file_name: Option<&str>,
        signal: Option<CancellationToken>,
    ) -> Result<IpfsUri>;

    /// Uploads a CAR payload; returns one URI per root the archive declares.
    async fn upload_car(
        &self,
        source: ByteSource,
        signal: Option<CancellationToken>,
    ) -> Result<Vec<IpfsUri>>;

    /// Best-effort removal of previously uploaded content.
    async fn clear(&self, _uri: &IpfsUri, _signal: Option<CancellationToken>) -> Result<()> {
        Err(Error::NotSupported {
            backend: self.kind(),
            operation: "clear",
        })
    }
}
