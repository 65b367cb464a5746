//! Integration tests against a real Kubo daemon.
//!
//! Run a local daemon with its API listening on the default address and
//! execute with `cargo test -- --ignored`.

use autoipfs_backend_daemon::DaemonBackend;
use autoipfs_core::source::collect_bytes;
use autoipfs_core::testutil::BackendTests;
use autoipfs_core::{Backend, ByteSource, GetOpts};

fn local_daemon() -> DaemonBackend {
    DaemonBackend::create(Some("http://localhost:5001/")).unwrap()
}

#[tokio::test]
#[ignore = "requires a running Kubo daemon"]
async fn test_daemon_conformance() {
    let backend = local_daemon();
    BackendTests::new(&backend).run_all().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Kubo daemon"]
async fn test_daemon_car_roundtrip() {
    let backend = local_daemon();

    let uri = backend
        .upload_file(ByteSource::from("Hello World"), Some("example.txt"), None)
        .await
        .unwrap();

    let stream = backend
        .get(
            &uri,
            GetOpts {
                format: Some("car".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let car = collect_bytes(stream).await.unwrap();
    assert!(!car.is_empty());

    let roots = backend
        .upload_car(ByteSource::from(car.to_vec()), None)
        .await
        .unwrap();
    assert!(!roots.is_empty());
}

#[tokio::test]
#[ignore = "requires a running Kubo daemon"]
async fn test_daemon_clear_unpins() {
    let backend = local_daemon();

    let uri = backend
        .upload_file(ByteSource::from("pin me"), None, None)
        .await
        .unwrap();
    backend.clear(&uri, None).await.unwrap();
}
