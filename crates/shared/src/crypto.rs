//! Cryptographic utilities for bearer tokens and share links.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Random bytes behind an approval bearer token (256 bits).
const BEARER_TOKEN_BYTES: usize = 32;

/// Random bytes behind a retreat share link.
const SHARE_LINK_BYTES: usize = 9;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates a high-entropy, URL-safe opaque bearer token.
///
/// The returned value is meant to be transmitted exactly once; callers persist
/// only `sha256_hex(token)`.
pub fn generate_bearer_token() -> String {
    random_url_safe(BEARER_TOKEN_BYTES)
}

/// Generates the opaque token used in public registration URLs.
pub fn generate_share_link() -> String {
    random_url_safe(SHARE_LINK_BYTES)
}

/// Returns a short, non-reversible fingerprint of a secret suitable for logs.
pub fn fingerprint(secret: &str) -> String {
    sha256_hex(secret).chars().take(8).collect()
}

fn random_url_safe(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_sha256_hex_empty_string() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hex_unicode() {
        assert_eq!(sha256_hex("inscrição").len(), 64);
    }

    #[test]
    fn test_bearer_token_is_url_safe() {
        let token = generate_bearer_token();
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_bearer_token_uniqueness() {
        assert_ne!(generate_bearer_token(), generate_bearer_token());
    }

    #[test]
    fn test_bearer_token_hash_differs_from_token() {
        let token = generate_bearer_token();
        let hash = sha256_hex(&token);
        assert_ne!(hash, token);
        assert!(!hash.contains(&token));
    }

    #[test]
    fn test_share_link_length() {
        assert_eq!(generate_share_link().len(), 12);
    }

    #[test]
    fn test_fingerprint_is_prefix_of_hash() {
        let fp = fingerprint("secret-value");
        assert_eq!(fp.len(), 8);
        assert!(sha256_hex("secret-value").starts_with(&fp));
    }
}
