//! Stable content hashing for remote file names

use sha2::{Digest, Sha256};

/// First 16 hex digits of the SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_short() {
        let a = content_hash("streamparse==5.0.0\n");
        assert_eq!(a.len(), 16);
        assert_eq!(a, content_hash("streamparse==5.0.0\n"));
        assert_ne!(a, content_hash("streamparse==4.0.0\n"));
    }
}
