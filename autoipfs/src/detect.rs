//! Concurrent probing of the environment for usable backends.
//!
//! Probe outcomes other than a confirmed capability mean "candidate
//! absent", and the result is simply a shorter descriptor list; only
//! invalid configuration (an unparseable daemon URL) is an error. Probes
//! run concurrently and each is bounded by the configured timeout, so one
//! dead endpoint cannot stall the pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use autoipfs_core::fetch::ScopedFetch;
use autoipfs_core::{
    BackendDescriptor, BackendKind, Error, Result, BRAVE_PORTS, DEFAULT_DAEMON_API_URL,
    ESTUARY_URL, WEB3_STORAGE_URL, W3S_LINK_URL,
};
use futures::future::{select_ok, BoxFuture};
use http::Method;
use url::Url;

/// A known-present directory every IPFS node can resolve; used to check
/// whether a scheme handler actually answers.
const AGREGORE_PROBE_URI: &str = "ipfs://bafyaabakaieac/";

/// Hook for environments that must rewrite the `Origin` of daemon API
/// requests (embedded browser daemons reject cross-origin calls
/// otherwise). Called with the API URL of the embedded daemon that
/// answered; installed at most once per [`Detector`].
pub trait OriginRewrite: std::fmt::Debug + Send + Sync + 'static {
    fn install(&self, api_url: &Url);
}

/// What to look for and how. The defaults probe only free capabilities
/// and keep the public gateway as a last resort.
#[derive(Debug, Clone)]
pub struct DetectOptions {
    pub daemon_url: Option<String>,
    pub web3_storage_token: Option<String>,
    pub web3_storage_url: Option<String>,
    pub estuary_token: Option<String>,
    pub estuary_url: Option<String>,
    pub gateway_url: Option<String>,
    /// Include a read-only public gateway candidate.
    pub readonly: bool,
    /// Upper bound per probe, in milliseconds.
    pub timeout_ms: u64,
    pub scoped_fetch: Option<Arc<dyn ScopedFetch>>,
    pub origin_rewrite: Option<Arc<dyn OriginRewrite>>,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            daemon_url: None,
            web3_storage_token: None,
            web3_storage_url: None,
            estuary_token: None,
            estuary_url: None,
            gateway_url: None,
            readonly: true,
            timeout_ms: 1000,
            scoped_fetch: None,
            origin_rewrite: None,
        }
    }
}

/// One detection pass over an environment.
#[derive(Debug)]
pub struct Detector {
    opts: DetectOptions,
    client: reqwest::Client,
    rewrite_installed: AtomicBool,
}

impl Detector {
    pub fn new(opts: DetectOptions) -> Self {
        Self {
            opts,
            client: reqwest::Client::new(),
            rewrite_installed: AtomicBool::new(false),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.opts.timeout_ms)
    }

    /// Runs every probe concurrently and returns the candidates in default
    /// priority order.
    pub async fn detect(&self) -> Result<Vec<BackendDescriptor>> {
        let raw = self.opts.daemon_url.as_deref().unwrap_or(DEFAULT_DAEMON_API_URL);
        let configured_url = Url::parse(raw).map_err(|err| Error::malformed(raw, err))?;

        let (agregore, configured, embedded) = tokio::join!(
            self.probe_agregore(),
            self.probe_daemon_at(configured_url),
            self.probe_embedded_daemon(),
        );
        if let Some(url) = &embedded {
            self.install_origin_rewrite(url);
        }

        let mut detected = Vec::new();
        if agregore {
            detected.push(BackendDescriptor {
                kind: BackendKind::Agregore,
                url: "ipfs://localhost/".to_string(),
                authorization: None,
                gateway_url: None,
            });
        }
        for daemon_url in daemon_candidates(configured, embedded) {
            detected.push(BackendDescriptor {
                kind: BackendKind::Daemon,
                url: daemon_url.to_string(),
                authorization: None,
                gateway_url: None,
            });
        }
        if let Some(token) = &self.opts.web3_storage_token {
            detected.push(BackendDescriptor {
                kind: BackendKind::Web3Storage,
                url: self
                    .opts
                    .web3_storage_url
                    .clone()
                    .unwrap_or_else(|| WEB3_STORAGE_URL.to_string()),
                authorization: Some(token.clone()),
                gateway_url: self.opts.gateway_url.clone(),
            });
        }
        if let Some(token) = &self.opts.estuary_token {
            detected.push(BackendDescriptor {
                kind: BackendKind::Estuary,
                url: self
                    .opts
                    .estuary_url
                    .clone()
                    .unwrap_or_else(|| ESTUARY_URL.to_string()),
                authorization: Some(token.clone()),
                gateway_url: self.opts.gateway_url.clone(),
            });
        }
        if self.opts.readonly {
            detected.push(BackendDescriptor {
                kind: BackendKind::ReadonlyGateway,
                url: self
                    .opts
                    .gateway_url
                    .clone()
                    .unwrap_or_else(|| W3S_LINK_URL.to_string()),
                authorization: None,
                gateway_url: None,
            });
        }

        tracing::debug!(candidates = detected.len(), "detection pass finished");
        Ok(detected)
    }

    fn install_origin_rewrite(&self, api_url: &Url) {
        let Some(rewrite) = &self.opts.origin_rewrite else {
            return;
        };
        if !self.rewrite_installed.swap(true, Ordering::SeqCst) {
            rewrite.install(api_url);
        }
    }

    /// The scheme is supported iff the exchange completes at all; an error
    /// status still proves a handler answered.
    async fn probe_agregore(&self) -> bool {
        let Some(fetch) = &self.opts.scoped_fetch else {
            return false;
        };
        let Ok(request) = http::Request::builder()
            .method(Method::GET)
            .uri(AGREGORE_PROBE_URI)
            .body(None)
        else {
            return false;
        };
        matches!(
            tokio::time::timeout(self.timeout(), fetch.fetch(request)).await,
            Ok(Ok(_))
        )
    }

    async fn probe_daemon_at(&self, url: Url) -> Option<Url> {
        match self.check_daemon(url.clone()).await {
            Ok(()) => Some(url),
            Err(err) => {
                tracing::debug!("no daemon at {url}: {err}");
                None
            }
        }
    }

    /// Races the candidate ports of an embedded browser daemon; the first
    /// responder wins and the remaining probes are discarded.
    async fn probe_embedded_daemon(&self) -> Option<Url> {
        let probes: Vec<BoxFuture<'_, Result<Url>>> = BRAVE_PORTS
            .iter()
            .filter_map(|port| Url::parse(&format!("http://127.0.0.1:{port}/")).ok())
            .map(|url| {
                let fut: BoxFuture<'_, Result<Url>> = Box::pin(async move {
                    self.check_daemon(url.clone()).await?;
                    Ok(url)
                });
                fut
            })
            .collect();

        match select_ok(probes).await {
            Ok((url, _discarded)) => Some(url),
            Err(_) => None,
        }
    }

    /// A daemon is present when `api/v0/version` answers at all: 2xx, or
    /// 405 from servers that reject the method but are clearly listening.
    async fn check_daemon(&self, api_url: Url) -> Result<()> {
        let url = api_url
            .join("api/v0/version")
            .map_err(|err| Error::malformed(api_url.as_str(), err))?;
        let send = self.client.post(url).send();
        let response = tokio::time::timeout(self.timeout(), send)
            .await
            .map_err(|_| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "probe timed out",
                ))
            })??;
        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::METHOD_NOT_ALLOWED {
            Ok(())
        } else {
            Err(Error::Http {
                status: status.as_u16(),
                body: String::new(),
            })
        }
    }
}

fn daemon_candidates(configured: Option<Url>, embedded: Option<Url>) -> Vec<Url> {
    let mut candidates = Vec::new();
    if let Some(url) = configured {
        candidates.push(url);
    }
    if let Some(url) = embedded {
        if !candidates.contains(&url) {
            candidates.push(url);
        }
    }
    candidates
}

/// Convenience wrapper for a one-shot detection pass.
pub async fn detect(opts: &DetectOptions) -> Result<Vec<BackendDescriptor>> {
    Detector::new(opts.clone()).detect().await
}
