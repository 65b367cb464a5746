use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Error, Result};

/// A parsed `scheme://cid/path` content identifier.
///
/// The `cid` is treated as an opaque string; nothing here hashes or
/// validates it. `path` always begins with `/` (an absent path normalizes
/// to `/`), so the string form round-trips losslessly through [`Display`]
/// and [`IpfsUri::parse`].
///
/// Both the authority form (`ipfs://cid/path`) and the path-only form
/// (`ipfs:/cid/path`) parse to the same triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IpfsUri {
    scheme: String,
    cid: String,
    path: String,
}

impl IpfsUri {
    pub fn new(
        scheme: impl Into<String>,
        cid: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        let mut path = path.into();
        if path.is_empty() {
            path.push('/');
        } else if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Self {
            scheme: scheme.into(),
            cid: cid.into(),
            path,
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let url =
            Url::parse(input).map_err(|err| Error::malformed(input, err))?;
        let scheme = url.scheme().to_string();

        if let Some(host) = url.host_str().filter(|host| !host.is_empty()) {
            return Ok(Self::new(scheme, host, url.path()));
        }

        // Path-only form: the first segment is the cid, the rest is the path.
        let raw = url.path().trim_start_matches('/');
        let mut segments = raw.splitn(2, '/');
        let cid = segments.next().unwrap_or_default();
        if cid.is_empty() {
            return Err(Error::malformed(input, "neither authority nor a usable first segment"));
        }
        let rest = segments.next().unwrap_or_default();
        Ok(Self::new(scheme, cid, format!("/{rest}")))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn cid(&self) -> &str {
        &self.cid
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Builds `<gateway>/<scheme>/<cid><path>` for gateway-relayed reads.
    pub fn to_gateway_url(&self, gateway: &Url) -> Result<Url> {
        let relative = format!("/{}/{}{}", self.scheme, self.cid, self.path);
        gateway
            .join(&relative)
            .map_err(|err| Error::malformed(&relative, err))
    }
}

impl fmt::Display for IpfsUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.cid, self.path)
    }
}

impl FromStr for IpfsUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        IpfsUri::parse(s)
    }
}
