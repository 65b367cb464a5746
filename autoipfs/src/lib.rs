//! Backend-agnostic IPFS client.
//!
//! Probes the environment for whatever IPFS access it offers (a browser
//! scheme handler, a local daemon, a pinning-service token, or just the
//! public gateway), ranks the candidates, and hands back one uniform
//! [`Backend`] client.
//!
//! ```no_run
//! use autoipfs::{create, DetectOptions};
//!
//! # async fn run() -> autoipfs::Result<()> {
//! let backend = create(DetectOptions::default()).await?;
//! let uri = backend.upload_file("Hello World".into(), None, None).await?;
//! println!("{uri}");
//! # Ok(())
//! # }
//! ```

pub mod choose;
pub mod detect;

pub use autoipfs_backend_agregore::AgregoreBackend;
pub use autoipfs_backend_daemon::DaemonBackend;
pub use autoipfs_backend_estuary::EstuaryBackend;
pub use autoipfs_backend_gateway::GatewayBackend;
pub use autoipfs_backend_web3storage::Web3StorageBackend;
pub use autoipfs_core::fetch::{FetchRequest, FetchResponse, ScopedFetch};
pub use autoipfs_core::source::{collect_bytes, Blob, ByteSource};
pub use autoipfs_core::{
    Backend, BackendDescriptor, BackendKind, ByteStream, Error, GetOpts, IpfsUri, Result,
};

pub use choose::{choose, create, default_choice, instantiate, DEFAULT_PRIORITY};
pub use detect::{detect, DetectOptions, Detector, OriginRewrite};
