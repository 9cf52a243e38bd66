use sha2::{Digest, Sha256};

/// Hash a bearer token (SHA-256 hex).
/// Wizards remember their owner by this digest, never by the raw token.
pub fn hash_access_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}
