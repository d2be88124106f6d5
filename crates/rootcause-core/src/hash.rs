//! Content hashing for chunk deduplication and cache keys.

use sha2::{Digest, Sha256};

/// SHA-256 of `content`, as lowercase hex.
///
/// The digest depends on the text alone, so identical chunk text produced
/// by different files or strategies shares one cache entry.
pub fn generate_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            generate_content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_deterministic() {
        let a = generate_content_hash("function foo() {}");
        let b = generate_content_hash("function foo() {}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, generate_content_hash("function foo() { }"));
    }
}
