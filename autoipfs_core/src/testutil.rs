//! Test utilities for `Backend` implementations.
//!
//! This module provides a conformance suite that can be run against any
//! `Backend` implementation to verify the uniform client contract.
//!
//! # Usage
//!
//! In your backend crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! autoipfs_core = { workspace = true, features = ["testutil"] }
//! ```
//!
//! In your test file:
//!
//! ```ignore
//! use autoipfs_core::testutil::BackendTests;
//!
//! #[tokio::test]
//! async fn test_my_backend() {
//!     let backend = MyBackend::create(...);
//!     BackendTests::new(&backend).run_all().await.unwrap();
//! }
//! ```

use bytes::Bytes;

use crate::api::{Backend, GetOpts};
use crate::error::Result;
use crate::source::{collect_bytes, Blob, ByteSource};

const EXAMPLE_DATA: &str = "Hello World";
const EXAMPLE_NAME: &str = "example.txt";

/// Conformance suite for `Backend` implementations.
///
/// Uploads the same content through every `ByteSource` shape and verifies
/// that reads, ranged reads, and size lookups agree.
pub struct BackendTests<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B: Backend + ?Sized> BackendTests<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Run all tests.
    pub async fn run_all(&self) -> Result<()> {
        self.test_upload_roundtrip_all_shapes().await?;
        self.test_ranged_get().await?;
        Ok(())
    }

    fn shapes() -> Vec<ByteSource> {
        vec![
            ByteSource::from(Bytes::from_static(EXAMPLE_DATA.as_bytes())),
            ByteSource::from(EXAMPLE_DATA),
            ByteSource::from(Blob::named(EXAMPLE_NAME, EXAMPLE_DATA.as_bytes().to_vec())),
            ByteSource::from_chunks([
                Bytes::from_static(b"Hello "),
                Bytes::from_static(b"World"),
            ]),
        ]
    }

    /// Upload, read back, and size-check every input shape.
    pub async fn test_upload_roundtrip_all_shapes(&self) -> Result<()> {
        for source in Self::shapes() {
            let uri = self
                .backend
                .upload_file(source, Some(EXAMPLE_NAME), None)
                .await?;

            let size = self.backend.get_size(&uri, None).await?;
            assert_eq!(
                size,
                EXAMPLE_DATA.len() as u64,
                "size should match uploaded content"
            );

            let stream = self.backend.get(&uri, GetOpts::default()).await?;
            let bytes = collect_bytes(stream).await?;
            assert_eq!(
                bytes.as_ref(),
                EXAMPLE_DATA.as_bytes(),
                "content should round-trip"
            );
        }
        Ok(())
    }

    /// Ranged reads with an inclusive end bound and with an open end.
    pub async fn test_ranged_get(&self) -> Result<()> {
        let uri = self
            .backend
            .upload_file(ByteSource::from(EXAMPLE_DATA), Some(EXAMPLE_NAME), None)
            .await?;

        let stream = self
            .backend
            .get(
                &uri,
                GetOpts {
                    start: Some(0),
                    end: Some(4),
                    ..Default::default()
                },
            )
            .await?;
        assert_eq!(collect_bytes(stream).await?.as_ref(), b"Hello");

        let stream = self
            .backend
            .get(
                &uri,
                GetOpts {
                    start: Some(6),
                    ..Default::default()
                },
            )
            .await?;
        assert_eq!(collect_bytes(stream).await?.as_ref(), b"World");

        Ok(())
    }
}
