use base64::Engine;
use sha2::{Digest, Sha256};

/// SHA-256 content hash, base64 encoded. Used to correlate log lines for the
/// same document across runs without logging its contents.
pub fn compute_content_hash(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    base64::engine::general_purpose::STANDARD.encode(hash)
}

/// First 12 characters of the content hash, enough for log correlation.
pub fn short_digest(bytes: &[u8]) -> String {
    let mut digest = compute_content_hash(bytes);
    digest.truncate(12);
    digest
}
