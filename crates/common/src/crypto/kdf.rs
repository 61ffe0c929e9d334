//! Password-based key derivation
//!
//! Turns a vault secret plus a per-user salt into a 256-bit AES-GCM key using
//! PBKDF2-HMAC-SHA256 with a fixed iteration count. The derivation is
//! deterministic and stateless: the same `(secret, salt)` always yields the
//! same key.

use std::fmt;

use aes_gcm::{Aes256Gcm, Key, KeyInit};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::CryptoError;

/// PBKDF2 iteration count
pub const KDF_ITERATIONS: u32 = 100_000;
/// Size of the derived AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// A 256-bit symmetric key derived from a vault secret
///
/// The key bytes are wiped from memory when the value is dropped. The type is
/// intentionally not serializable.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey(Zeroizing<[u8; KEY_SIZE]>);

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

impl DerivedKey {
    /// Get a reference to the raw key bytes
    pub fn bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub(crate) fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0[..]))
    }
}

/// Derive a key on the calling thread
///
/// This burns [`KDF_ITERATIONS`] rounds of HMAC-SHA256; async callers should go
/// through [`derive_key`] instead.
///
/// # Errors
///
/// Returns [`CryptoError::EmptySecret`] if `secret` is empty. A missing secret
/// is a locked vault and callers are expected to check for it before asking
/// for a key.
pub fn derive_key_blocking(secret: &str, salt: &str) -> Result<DerivedKey, CryptoError> {
    if secret.is_empty() {
        return Err(CryptoError::EmptySecret);
    }

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha256>(
        secret.as_bytes(),
        salt.as_bytes(),
        KDF_ITERATIONS,
        &mut key[..],
    );
    Ok(DerivedKey(key))
}

/// Derive a key without blocking the async runtime
pub async fn derive_key(secret: &str, salt: &str) -> Result<DerivedKey, CryptoError> {
    let secret = Zeroizing::new(secret.to_owned());
    let salt = salt.to_owned();
    tokio::task::spawn_blocking(move || derive_key_blocking(&secret, &salt)).await?
}
