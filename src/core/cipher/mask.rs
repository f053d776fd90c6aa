//! Display masking and comparison-safe hashing.
//!
//! Used by reporting; the cipher itself never calls these.

use sha2::{Digest, Sha256};

/// Mask character used in all masked output.
pub const MASK_CHAR: char = '*';

/// Length of the mask run appended after the visible prefix.
const MASK_RUN: usize = 8;

/// Secrets shorter than this are masked entirely.
pub const MIN_MASK_LEN: usize = 8;

/// Show the first `visible` characters followed by a run of mask characters.
///
/// Secrets shorter than [`MIN_MASK_LEN`], or not longer than `visible`,
/// are fully masked. The run length is fixed so the output never reveals
/// the secret's length.
pub fn mask_secret(secret: &str, visible: usize) -> String {
    let len = secret.chars().count();
    if len < MIN_MASK_LEN || len <= visible {
        return MASK_CHAR.to_string().repeat(MASK_RUN);
    }

    let prefix: String = secret.chars().take(visible).collect();
    format!("{}{}", prefix, MASK_CHAR.to_string().repeat(MASK_RUN))
}

/// Mask an identifier, keeping its first and last two characters.
pub fn mask_identifier(identifier: &str) -> String {
    let chars: Vec<char> = identifier.chars().collect();
    if chars.len() <= 4 {
        return MASK_CHAR.to_string().repeat(4);
    }

    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, MASK_CHAR.to_string().repeat(4), tail)
}

/// Truncated SHA-256 hex digest for equality checks without exposure.
pub fn hash_for_comparison(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret_shows_prefix() {
        assert_eq!(mask_secret("supersecretvalue", 4), "supe********");
    }

    #[test]
    fn test_mask_secret_short_is_fully_masked() {
        assert_eq!(mask_secret("abc", 4), "********");
        assert_eq!(mask_secret("1234567", 2), "********");
        assert_eq!(mask_secret("", 0), "********");
    }

    #[test]
    fn test_mask_secret_does_not_leak_length() {
        assert_eq!(
            mask_secret("abcdefghij", 2).len(),
            mask_secret("abcdefghijklmnopqrstuvwxyz", 2).len()
        );
    }

    #[test]
    fn test_mask_secret_unicode() {
        assert_eq!(mask_secret("пароль-секрет", 3), "пар********");
    }

    #[test]
    fn test_mask_identifier() {
        assert_eq!(mask_identifier("db_password"), "db****rd");
        assert_eq!(mask_identifier("abcd"), "****");
    }

    #[test]
    fn test_hash_for_comparison() {
        let a = hash_for_comparison("value");
        assert_eq!(a, hash_for_comparison("value"));
        assert_ne!(a, hash_for_comparison("other"));
        assert_eq!(a.len(), 16);
        assert!(!a.contains("value"));
    }
}
