//! Turning detected candidates into a live client.

use std::sync::Arc;

use autoipfs_backend_agregore::AgregoreBackend;
use autoipfs_backend_daemon::DaemonBackend;
use autoipfs_backend_estuary::EstuaryBackend;
use autoipfs_backend_gateway::GatewayBackend;
use autoipfs_backend_web3storage::Web3StorageBackend;
use autoipfs_core::fetch::ScopedFetch;
use autoipfs_core::{Backend, BackendDescriptor, BackendKind, Error, Result};

use crate::detect::{detect, DetectOptions};

/// Preference order when the caller expresses none: local and free before
/// remote and paid, writable before read-only.
pub const DEFAULT_PRIORITY: [BackendKind; 5] = [
    BackendKind::Agregore,
    BackendKind::Daemon,
    BackendKind::Web3Storage,
    BackendKind::Estuary,
    BackendKind::ReadonlyGateway,
];

/// Picks the candidate whose kind comes first in `priority`, detection
/// order breaking ties; [`Error::NoBackendAvailable`] when nothing
/// matches. Pass [`DEFAULT_PRIORITY`] for the standard order.
pub fn default_choice<'a>(
    detected: &'a [BackendDescriptor],
    priority: &[BackendKind],
) -> Result<&'a BackendDescriptor> {
    priority
        .iter()
        .find_map(|kind| detected.iter().find(|descriptor| descriptor.kind == *kind))
        .ok_or(Error::NoBackendAvailable)
}

/// Builds a live client from one descriptor. The Agregore kind needs the
/// environment's [`ScopedFetch`] capability handed back in.
pub fn instantiate(
    descriptor: &BackendDescriptor,
    scoped_fetch: Option<Arc<dyn ScopedFetch>>,
) -> Result<Arc<dyn Backend>> {
    match descriptor.kind {
        BackendKind::Agregore => {
            let fetch = scoped_fetch.ok_or(Error::NotSupported {
                backend: BackendKind::Agregore,
                operation: "construction without a scoped fetch",
            })?;
            Ok(Arc::new(AgregoreBackend::new(fetch)))
        }
        BackendKind::Daemon => Ok(Arc::new(DaemonBackend::create(Some(&descriptor.url))?)),
        BackendKind::Web3Storage => {
            let token = descriptor.authorization.as_deref().ok_or(Error::NotSupported {
                backend: BackendKind::Web3Storage,
                operation: "unauthenticated access",
            })?;
            Ok(Arc::new(Web3StorageBackend::create(
                token,
                Some(&descriptor.url),
                descriptor.gateway_url.as_deref(),
            )?))
        }
        BackendKind::Estuary => {
            let token = descriptor.authorization.as_deref().ok_or(Error::NotSupported {
                backend: BackendKind::Estuary,
                operation: "unauthenticated access",
            })?;
            Ok(Arc::new(EstuaryBackend::create(
                token,
                Some(&descriptor.url),
                descriptor.gateway_url.as_deref(),
            )?))
        }
        BackendKind::ReadonlyGateway => {
            Ok(Arc::new(GatewayBackend::create(Some(&descriptor.url))?))
        }
    }
}

/// Selects from detected candidates, by explicit kind or default
/// priority, and instantiates the winner.
pub fn choose(
    detected: &[BackendDescriptor],
    kind: Option<BackendKind>,
    scoped_fetch: Option<Arc<dyn ScopedFetch>>,
) -> Result<Arc<dyn Backend>> {
    let descriptor = match kind {
        Some(kind) => detected
            .iter()
            .find(|descriptor| descriptor.kind == kind)
            .ok_or(Error::NoBackendAvailable)?,
        None => default_choice(detected, &DEFAULT_PRIORITY)?,
    };
    instantiate(descriptor, scoped_fetch)
}

/// One-call entry point: detect, then pick the best candidate.
pub async fn create(opts: DetectOptions) -> Result<Arc<dyn Backend>> {
    let scoped_fetch = opts.scoped_fetch.clone();
    let detected = detect(&opts).await?;
    choose(&detected, None, scoped_fetch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoipfs_core::{ESTUARY_URL, W3S_LINK_URL, WEB3_STORAGE_URL};

    fn descriptor(kind: BackendKind) -> BackendDescriptor {
        let (url, authorization) = match kind {
            BackendKind::Agregore => ("ipfs://localhost/".to_string(), None),
            BackendKind::Daemon => ("http://localhost:9090/".to_string(), None),
            BackendKind::Web3Storage => {
                (WEB3_STORAGE_URL.to_string(), Some("token".to_string()))
            }
            BackendKind::Estuary => (ESTUARY_URL.to_string(), Some("token".to_string())),
            BackendKind::ReadonlyGateway => (W3S_LINK_URL.to_string(), None),
        };
        BackendDescriptor {
            kind,
            url,
            authorization,
            gateway_url: None,
        }
    }

    #[test]
    fn test_default_choice_follows_priority() {
        let detected = vec![
            descriptor(BackendKind::Estuary),
            descriptor(BackendKind::Web3Storage),
        ];
        let chosen = default_choice(&detected, &DEFAULT_PRIORITY).unwrap();
        assert_eq!(chosen.kind, BackendKind::Web3Storage);

        let detected = vec![
            descriptor(BackendKind::ReadonlyGateway),
            descriptor(BackendKind::Daemon),
        ];
        let chosen = default_choice(&detected, &DEFAULT_PRIORITY).unwrap();
        assert_eq!(chosen.kind, BackendKind::Daemon);
    }

    #[test]
    fn test_default_choice_honors_caller_priority() {
        let detected = vec![
            descriptor(BackendKind::Daemon),
            descriptor(BackendKind::ReadonlyGateway),
        ];
        let chosen =
            default_choice(&detected, &[BackendKind::ReadonlyGateway, BackendKind::Daemon])
                .unwrap();
        assert_eq!(chosen.kind, BackendKind::ReadonlyGateway);

        // Kinds outside the given order are never chosen.
        assert!(matches!(
            default_choice(&detected, &[BackendKind::Estuary]),
            Err(Error::NoBackendAvailable)
        ));
    }

    #[test]
    fn test_default_choice_empty() {
        assert!(matches!(
            default_choice(&[], &DEFAULT_PRIORITY),
            Err(Error::NoBackendAvailable)
        ));
    }

    #[test]
    fn test_choose_by_explicit_kind() {
        let detected = vec![
            descriptor(BackendKind::Daemon),
            descriptor(BackendKind::ReadonlyGateway),
        ];
        let backend = choose(&detected, Some(BackendKind::ReadonlyGateway), None).unwrap();
        assert_eq!(backend.kind(), BackendKind::ReadonlyGateway);

        assert!(matches!(
            choose(&detected, Some(BackendKind::Estuary), None),
            Err(Error::NoBackendAvailable)
        ));
    }

    #[test]
    fn test_instantiate_every_kind() {
        for kind in [
            BackendKind::Daemon,
            BackendKind::Web3Storage,
            BackendKind::Estuary,
            BackendKind::ReadonlyGateway,
        ] {
            let backend = instantiate(&descriptor(kind), None).unwrap();
            assert_eq!(backend.kind(), kind);
        }
    }

    #[test]
    fn test_agregore_requires_scoped_fetch() {
        assert!(matches!(
            instantiate(&descriptor(BackendKind::Agregore), None),
            Err(Error::NotSupported { .. })
        ));
    }

    #[test]
    fn test_instantiate_without_token_fails() {
        let mut web3 = descriptor(BackendKind::Web3Storage);
        web3.authorization = None;
        assert!(matches!(
            instantiate(&web3, None),
            Err(Error::NotSupported { .. })
        ));
    }
}
