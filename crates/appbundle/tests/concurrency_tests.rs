//! Concurrency tests
//!
//! These tests verify that concurrent queries and payload reads on a shared
//! bundle don't deadlock, corrupt data, or fetch the same payload twice.

use appbundle::{AddFileOptions, Bundle, CreateOptions, ParseOptions, SerializeOptions};
use std::sync::{Arc, Barrier};
use std::thread;

fn archive_backed(files: usize) -> Bundle {
    let mut bundle = Bundle::create_empty(&CreateOptions::default()).unwrap();
    for i in 0..files {
        bundle
            .add_file(
                &format!("files/{i}.bin"),
                vec![i as u8; 4096],
                &AddFileOptions::default(),
            )
            .unwrap();
    }
    bundle.set_entrypoint("main", "files/0.bin").unwrap();

    let bytes = bundle.to_bytes(&SerializeOptions::default()).unwrap();
    Bundle::parse(bytes, &ParseOptions::default()).unwrap()
}

#[test]
fn test_concurrent_reads_of_same_path_share_one_fetch() {
    let bundle = Arc::new(archive_backed(4));
    let num_threads = 20;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let bundle = Arc::clone(&bundle);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // Wait for all threads to be ready
                barrier.wait();
                bundle.read_file("files/2.bin").expect("Should read payload")
            })
        })
        .collect();

    let payloads: Vec<Arc<[u8]>> = handles
        .into_iter()
        .map(|h| h.join().expect("Thread should complete"))
        .collect();

    // Every caller got the very same cached buffer
    assert!(payloads.iter().all(|p| Arc::ptr_eq(p, &payloads[0])));
    assert_eq!(&*payloads[0], &[2u8; 4096][..]);
}

#[test]
fn test_concurrent_reads_of_different_paths() {
    let files = 8;
    let bundle = Arc::new(archive_backed(files));
    let barrier = Arc::new(Barrier::new(files));

    let handles: Vec<_> = (0..files)
        .map(|i| {
            let bundle = Arc::clone(&bundle);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..10 {
                    let data = bundle
                        .read_file(&format!("files/{i}.bin"))
                        .expect("Should read payload");
                    assert!(data.iter().all(|b| *b == i as u8));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should complete");
    }
}

#[test]
fn test_concurrent_queries_and_validation() {
    let bundle = Arc::new(archive_backed(16));
    let num_threads = 10;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let bundle = Arc::clone(&bundle);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                assert_eq!(bundle.file_count(), 16);
                assert_eq!(bundle.resolve_entrypoint("main").as_deref(), Some("files/0.bin"));
                assert!(bundle.validate().valid);
                bundle
                    .to_bytes(&SerializeOptions::default())
                    .expect("Should serialize")
            })
        })
        .collect();

    let outputs: Vec<Vec<u8>> = handles
        .into_iter()
        .map(|h| h.join().expect("Thread should complete"))
        .collect();

    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_clones_read_independently_across_threads() {
    let original = archive_backed(4);
    let num_threads = 4;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let mut copy = original.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                copy.update_file("files/1.bin", vec![i as u8], None)
                    .expect("Should update");
                copy.read_file("files/1.bin").expect("Should read").to_vec()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().expect("Thread should complete"), vec![i as u8]);
    }
    assert_eq!(&*original.read_file("files/1.bin").unwrap(), &[1u8; 4096][..]);
}
