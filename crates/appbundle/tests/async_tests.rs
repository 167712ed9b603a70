//! Tests for the blocking-pool wrappers behind the `tokio` feature.

#![cfg(feature = "tokio")]

use appbundle::{AddFileOptions, Bundle, CreateOptions, ErrorKind, ParseOptions, SerializeOptions};

fn sample() -> Bundle {
    let mut bundle = Bundle::create_empty(&CreateOptions::default()).unwrap();
    bundle
        .add_file("index.js", b"export {}".to_vec(), &AddFileOptions::default())
        .unwrap();
    bundle.set_entrypoint("main", "index.js").unwrap();
    bundle
}

#[tokio::test]
async fn parse_async_and_to_bytes_async_round_trip() {
    let bundle = sample();

    let bytes = bundle
        .to_bytes_async(SerializeOptions::default())
        .await
        .unwrap();
    let parsed = Bundle::parse_async(bytes.clone(), ParseOptions::default())
        .await
        .unwrap();

    assert_eq!(parsed.manifest(), bundle.manifest());
    assert_eq!(&*parsed.read_file("index.js").unwrap(), b"export {}");
    assert_eq!(bytes, bundle.to_bytes(&SerializeOptions::default()).unwrap());
}

#[tokio::test]
async fn parse_async_propagates_errors() {
    let err = Bundle::parse_async(b"not a zip".to_vec(), ParseOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ArchiveCorrupt);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parse_async_concurrent_tasks() {
    let bytes = sample().to_bytes(&SerializeOptions::default()).unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let bytes = bytes.clone();
            tokio::spawn(async move { Bundle::parse_async(bytes, ParseOptions::default()).await })
        })
        .collect();

    for task in tasks {
        let bundle = task.await.unwrap().unwrap();
        assert_eq!(bundle.resolve_entrypoint("main").as_deref(), Some("index.js"));
    }
}
