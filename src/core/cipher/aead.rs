//! AES-256-GCM sealing.
//!
//! Sealed blobs are `nonce || ciphertext || tag`; text tokens are the
//! standard base64 encoding of a sealed blob.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::trace;

use super::key::{KeyMetadata, MasterKey};
use crate::core::types::CipherToken;
use crate::error::{CipherError, Result};

/// Size of the AES-256-GCM tag in bytes.
const TAG_LEN: usize = 16;

fn sealing_key(key: &[u8]) -> Result<LessSafeKey> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| CipherError::InvalidKey("key must be 32 bytes".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Seal `plaintext` under a raw 32-byte key with a fresh random nonce.
pub(crate) fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let key = sealing_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new().fill(&mut nonce_bytes).map_err(|_| {
        CipherError::EncryptionFailed("failed to generate random nonce".to_string())
    })?;

    let mut in_out = plaintext.to_vec();
    in_out.reserve(TAG_LEN);
    key.seal_in_place_append_tag(
        Nonce::assume_unique_for_key(nonce_bytes),
        Aad::empty(),
        &mut in_out,
    )
    .map_err(|_| CipherError::EncryptionFailed("seal failed".to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&in_out);
    Ok(sealed)
}

/// Open a blob produced by [`seal`].
///
/// Wrong keys, truncation and tampering all surface as `DecryptionFailed`.
pub(crate) fn open(key: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(CipherError::DecryptionFailed("ciphertext too short".to_string()).into());
    }

    let key = sealing_key(key)?;
    let (nonce_bytes, body) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| CipherError::DecryptionFailed("invalid nonce".to_string()))?;

    let mut in_out = body.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| {
            CipherError::DecryptionFailed(
                "authentication failed (wrong key or corrupted data)".to_string(),
            )
        })?;

    Ok(plaintext.to_vec())
}

/// Immutable cipher bound to one master key.
///
/// Handed out as `Arc<MasterCipher>` so a key rotation never mutates a
/// cipher another thread is using.
pub struct MasterCipher {
    key: MasterKey,
}

impl std::fmt::Debug for MasterCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterCipher")
            .field("key_id", &self.key.key_id())
            .finish()
    }
}

impl MasterCipher {
    /// Bind a cipher to `key`.
    pub fn new(key: MasterKey) -> Self {
        Self { key }
    }

    /// Identifier of the bound key.
    pub fn key_id(&self) -> &str {
        self.key.key_id()
    }

    /// Metadata of the bound key.
    pub fn metadata(&self) -> &KeyMetadata {
        self.key.metadata()
    }

    /// The bound key.
    pub fn key(&self) -> &MasterKey {
        &self.key
    }

    /// Encrypt raw bytes. Empty input yields empty output.
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }
        trace!(plaintext_len = plaintext.len(), "encrypting");
        seal(self.key.as_bytes(), plaintext)
    }

    /// Decrypt raw bytes. Empty input yields empty output.
    pub fn decrypt_bytes(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        trace!(ciphertext_len = ciphertext.len(), "decrypting");
        open(self.key.as_bytes(), ciphertext)
    }

    /// Encrypt a string into a base64 token.
    pub fn encrypt(&self, plaintext: &str) -> Result<CipherToken> {
        let sealed = self.encrypt_bytes(plaintext.as_bytes())?;
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a base64 token produced by [`MasterCipher::encrypt`].
    pub fn decrypt(&self, token: &str) -> Result<String> {
        if token.is_empty() {
            return Ok(String::new());
        }
        let sealed = STANDARD
            .decode(token.trim())
            .map_err(|e| CipherError::DecryptionFailed(format!("invalid base64: {}", e)))?;
        let plaintext = self.decrypt_bytes(&sealed)?;
        String::from_utf8(plaintext)
            .map_err(|e| CipherError::DecryptionFailed(format!("UTF-8 error: {}", e)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> MasterCipher {
        MasterCipher::new(MasterKey::generate().unwrap())
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = cipher();
        let token = cipher.encrypt("Hello, World!").unwrap();

        assert_ne!(token, "Hello, World!");
        assert_eq!(cipher.decrypt(&token).unwrap(), "Hello, World!");
    }

    #[test]
    fn test_empty_passthrough() {
        let cipher = cipher();
        assert_eq!(cipher.encrypt("").unwrap(), "");
        assert_eq!(cipher.decrypt("").unwrap(), "");
        assert!(cipher.encrypt_bytes(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_nonce_is_fresh() {
        let cipher = cipher();
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_foreign_key_fails() {
        let token = cipher().encrypt("secret").unwrap();
        let err = cipher().decrypt(&token).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Cipher(CipherError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_malformed_token_fails() {
        let cipher = cipher();
        assert!(cipher.decrypt("not base64 !!!").is_err());
        assert!(cipher.decrypt("AAAA").is_err());
    }

    #[test]
    fn test_tampered_blob_fails() {
        let cipher = cipher();
        let mut sealed = cipher.encrypt_bytes(b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(cipher.decrypt_bytes(&sealed).is_err());
    }
}
