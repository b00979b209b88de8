use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256, used to fingerprint model artifacts.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
