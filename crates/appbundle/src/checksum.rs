//! SHA-256 payload checksums in `sha256:<hex>` form.

use sha2::{Digest, Sha256};

const PREFIX: &str = "sha256:";

/// Compute SHA256 hash of data and return as hex string.
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Checksum string as stored in the manifest listing.
pub fn format_checksum(data: &[u8]) -> String {
    format!("{PREFIX}{}", compute_sha256(data))
}

/// Verify SHA256 checksum of data.
pub fn verify_sha256(data: &[u8], expected: &str) -> bool {
    // Handle both "sha256:xxx" and raw "xxx" formats
    let expected_hex = expected.strip_prefix(PREFIX).unwrap_or(expected);

    compute_sha256(data).eq_ignore_ascii_case(expected_hex)
}
