#![allow(non_snake_case)]

use super::*;
use crate::ErrorKind;

fn raw_zip(entries: &[(&str, &[u8], CompressionMethod)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data, method) in entries {
        let options = SimpleFileOptions::default().compression_method(*method);
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn sample_entries() -> ArchiveEntries {
    let mut entries = ArchiveEntries::new();
    entries.insert(MANIFEST_FILE.to_string(), br#"{"formatVersion":1,"fileCount":2}"#.to_vec());
    entries.insert("index.js".to_string(), b"console.log('hi')".to_vec());
    entries.insert("assets/logo.svg".to_string(), b"<svg/>".to_vec());
    entries
}

#[test]
fn encode___then_decode___preserves_entries() {
    let entries = sample_entries();

    let bytes = encode(&entries, &SerializeOptions::default()).unwrap();
    let decoded = decode(&bytes).unwrap();

    assert_eq!(decoded, entries);
}

#[test]
fn encode___deterministic___produces_identical_bytes() {
    let entries = sample_entries();
    let options = SerializeOptions::default();

    let first = encode(&entries, &options).unwrap();
    let second = encode(&entries, &options).unwrap();

    assert_eq!(first, second);
}

#[test]
fn encode___writes_manifest_first_then_sorted_paths() {
    let bytes = encode(&sample_entries(), &SerializeOptions::default()).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

    let names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();

    assert_eq!(names, vec!["manifest.json", "assets/logo.svg", "index.js"]);
}

#[test]
fn decode___not_a_zip___returns_archive_corrupt() {
    let err = decode(b"not a zip file").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ArchiveCorrupt);
}

#[test]
fn decode___truncated_trailer___returns_archive_corrupt() {
    let bytes = encode(&sample_entries(), &SerializeOptions::default()).unwrap();

    let err = decode(&bytes[..bytes.len() - 22]).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ArchiveCorrupt);
}

#[test]
fn decode___corrupted_payload___fails_checksum() {
    let payload = b"0123456789abcdefghij";
    let mut bytes = raw_zip(&[("data.bin", payload, CompressionMethod::Stored)]);
    let offset = bytes
        .windows(payload.len())
        .position(|window| window == payload)
        .unwrap();
    bytes[offset] ^= 0xFF;

    let err = decode(&bytes).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ArchiveCorrupt);
}

#[test]
fn ArchiveReader___open___indexes_without_manifest() {
    let bytes = raw_zip(&[("a.txt", b"aaa", CompressionMethod::Deflated)]);

    let reader = ArchiveReader::open(Arc::from(bytes)).unwrap();

    assert_eq!(reader.len(), 1);
    assert!(reader.read_manifest().unwrap().is_none());
    let meta = reader.entry("a.txt").unwrap();
    assert_eq!(meta.length, 3);
    assert!(meta.compressed);
}

#[test]
fn ArchiveReader___open___records_stored_entries_as_uncompressed() {
    let bytes = raw_zip(&[("a.txt", b"aaa", CompressionMethod::Stored)]);

    let reader = ArchiveReader::open(Arc::from(bytes)).unwrap();

    assert!(!reader.entry("a.txt").unwrap().compressed);
}

#[test]
fn ArchiveReader___open___normalizes_leading_slash() {
    let bytes = raw_zip(&[("/dist/app.js", b"x", CompressionMethod::Deflated)]);

    let reader = ArchiveReader::open(Arc::from(bytes)).unwrap();

    assert_eq!(reader.read("dist/app.js").unwrap(), b"x");
}

#[test]
fn ArchiveReader___open___traversal_entry___returns_invalid_path() {
    let bytes = raw_zip(&[("../evil.sh", b"rm -rf", CompressionMethod::Stored)]);

    let err = ArchiveReader::open(Arc::from(bytes)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidPath);
}

#[test]
fn ArchiveReader___open___colliding_paths___returns_duplicate_path() {
    let bytes = raw_zip(&[
        ("a.txt", b"one", CompressionMethod::Stored),
        ("/a.txt", b"two", CompressionMethod::Stored),
    ]);

    let err = ArchiveReader::open(Arc::from(bytes)).unwrap_err();

    assert!(matches!(err, BundleError::DuplicatePath { ref path } if path == "a.txt"));
}

#[test]
fn ArchiveReader___inventory___lists_lengths() {
    let bytes = encode(&sample_entries(), &SerializeOptions::default()).unwrap();
    let reader = ArchiveReader::open(Arc::from(bytes)).unwrap();

    let inventory = reader.inventory();

    assert_eq!(inventory.len(), 2);
    assert_eq!(inventory["index.js"], 17);
    assert!(!inventory.contains_key(MANIFEST_FILE));
}

#[test]
fn ArchiveReader___read___missing_path___returns_file_not_found() {
    let bytes = encode(&sample_entries(), &SerializeOptions::default()).unwrap();
    let reader = ArchiveReader::open(Arc::from(bytes)).unwrap();

    let err = reader.read("nope.js").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FileNotFound);
}

#[test]
fn ArchiveReader___clone___reads_independently() {
    let bytes = encode(&sample_entries(), &SerializeOptions::default()).unwrap();
    let reader = ArchiveReader::open(Arc::from(bytes)).unwrap();

    let copy = reader.clone();
    drop(reader);

    assert_eq!(copy.read("assets/logo.svg").unwrap(), b"<svg/>");
}

#[test]
fn ArchiveWriter___stored_entry___is_not_compressed() {
    let mut writer = ArchiveWriter::new(&SerializeOptions::default());
    writer.write_entry("raw.bin", &[1, 2, 3], false).unwrap();
    let bytes = writer.finish().unwrap();

    let reader = ArchiveReader::open(Arc::from(bytes)).unwrap();

    assert!(!reader.entry("raw.bin").unwrap().compressed);
    assert_eq!(reader.read("raw.bin").unwrap(), vec![1, 2, 3]);
}

#[test]
fn ArchiveReader___read___recorded_length_disagrees___returns_archive_corrupt() {
    let mut bytes = raw_zip(&[("a.txt", b"hello", CompressionMethod::Stored)]);
    // Uncompressed size sits 24 bytes into the central directory header.
    let header = bytes
        .windows(4)
        .position(|window| window == b"PK\x01\x02")
        .unwrap();
    bytes[header + 24..header + 28].copy_from_slice(&3u32.to_le_bytes());
    let reader = ArchiveReader::open(Arc::from(bytes)).unwrap();
    assert_eq!(reader.entry("a.txt").unwrap().length, 3);

    let err = reader.read("a.txt").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ArchiveCorrupt);
    match err {
        BundleError::LengthMismatch {
            path,
            expected,
            actual,
        } => {
            assert_eq!(path, "a.txt");
            assert_eq!(expected, 3);
            assert_eq!(actual, 5);
        }
        other => panic!("expected length mismatch, got {other:?}"),
    }
}
