//! Core auto-ipfs types and traits.
//!
//! This crate defines the pieces shared by every auto-ipfs crate:
//!
//! - The [`Backend`] trait, the uniform operation set every adapter
//!   implements (`get`, `get_size`, `upload_file`, `upload_car`, `clear`).
//! - [`IpfsUri`], the parsed `ipfs://<cid>/<path>` / `ipns://...` identifier
//!   every successful upload produces and every read consumes.
//! - [`ByteSource`] and [`ByteStream`], the streaming normalization layer
//!   that lets uploads accept buffers, strings, named blobs, or lazy chunk
//!   streams interchangeably.
//! - Transport helpers ([`transport`]) for authenticated, ranged, and
//!   multipart HTTP exchanges, plus cancellation plumbing.
//! - The [`ScopedFetch`] capability used by environments that expose the
//!   `ipfs://` scheme directly instead of an HTTP endpoint.
//!
//! Concrete adapters live in the `backends/` crates; detection and
//! selection live in the `autoipfs` facade crate.

pub mod api;
pub mod error;
pub mod fetch;
pub mod source;
pub mod transport;
pub mod uri;

// Test utilities (behind feature flag)
#[cfg(feature = "testutil")]
pub mod testutil;

// --- Core Public Surface ---

pub use api::{
    Backend, BackendDescriptor, BackendKind, ByteStream, GetOpts, BRAVE_PORTS,
    DEFAULT_DAEMON_API_URL, ESTUARY_URL, W3S_LINK_URL, WEB3_STORAGE_URL,
};
pub use error::{Error, Result};
pub use fetch::{FetchRequest, FetchResponse, ScopedFetch};
pub use source::{collect_bytes, Blob, ByteSource};
pub use uri::IpfsUri;
