//! Salted API key hashing
//!
//! Stored hashes use the format `hex(salt):hex(sha256(key || salt))`.
//! Comparison is constant-time over the digest bytes.

use sha2::{Digest, Sha256};

/// Hash `key` with `salt` into the stored `salt:digest` form.
pub fn hash_key(key: &str, salt: &[u8]) -> String {
    format!("{}:{}", hex::encode(salt), hex::encode(digest(key, salt)))
}

/// Verify an API key against a stored hash using constant-time comparison.
pub fn verify_key_hash(candidate_key: &str, stored_hash: &str) -> bool {
    let Some((salt, hash)) = stored_hash.split_once(':') else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (hex::decode(salt), hex::decode(hash)) else {
        return false;
    };

    let candidate_hash = digest(candidate_key, &salt);
    if hash.len() != candidate_hash.len() {
        return false;
    }

    hash.iter()
        .zip(candidate_hash.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn digest(key: &str, salt: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(salt);
    hasher.finalize().to_vec()
}
