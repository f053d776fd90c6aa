//! Passphrase key derivation (PBKDF2-HMAC-SHA256).

use std::num::NonZeroU32;

use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::core::constants::{DERIVE_ITERATIONS, KEY_LEN, SALT_LEN};
use crate::error::{CipherError, Result};

/// A 32-byte key derived from a passphrase, wiped on drop.
pub type DerivedKey = Zeroizing<[u8; KEY_LEN]>;

/// Fill a new buffer of `len` bytes from the system CSPRNG.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| CipherError::EncryptionFailed("random source failure".to_string()))?;
    Ok(bytes)
}

/// Derive a key with an explicit salt and iteration count.
pub fn derive_with(passphrase: &[u8], salt: &[u8], iterations: u32) -> Result<DerivedKey> {
    let rounds = NonZeroU32::new(iterations)
        .ok_or_else(|| CipherError::InvalidKey("iteration count must be non-zero".to_string()))?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        rounds,
        salt,
        passphrase,
        &mut key[..],
    );
    Ok(key)
}

/// Derive a key from `passphrase` using the fixed default iteration count.
///
/// A random salt is generated when none is supplied. The salt is returned
/// so it can be stored next to whatever the key protects.
pub fn derive_key(passphrase: &str, salt: Option<&[u8]>) -> Result<(DerivedKey, Vec<u8>)> {
    let salt = match salt {
        Some(salt) => salt.to_vec(),
        None => random_bytes(SALT_LEN)?,
    };
    let key = derive_with(passphrase.as_bytes(), &salt, DERIVE_ITERATIONS)?;
    Ok((key, salt))
}
