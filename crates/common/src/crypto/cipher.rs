//! Authenticated encryption of single property values
//!
//! Payload layout, base64 (standard alphabet, padded):
//!
//! ```text
//! nonce (12 bytes) || ciphertext (n bytes) || tag (16 bytes)
//! ```
//!
//! An empty plaintext therefore encodes to exactly 28 bytes, or 40 base64
//! characters, which is where the [`is_encrypted`] length threshold comes from.

use std::fmt;

use aes_gcm::aead::Aead;
use aes_gcm::Nonce;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::kdf::{derive_key, DerivedKey};
use super::CryptoError;

/// Size of the AES-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of the AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;
/// Shortest string [`is_encrypted`] will classify as a payload
pub const MIN_PAYLOAD_LEN: usize = 40;
/// Marker returned by [`decrypt`] when a payload fails to authenticate
pub const DECRYPTION_ERROR: &str = " [DECRYPTION_ERROR] ";

/// A base64 encoded `nonce || ciphertext || tag` produced by [`FieldCipher::encrypt`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedPayload(String);

impl EncryptedPayload {
    /// Wrap a stored string that is believed to be a payload
    ///
    /// No validation happens here; a wrong guess surfaces as a decryption
    /// failure later.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<EncryptedPayload> for String {
    fn from(payload: EncryptedPayload) -> Self {
        payload.0
    }
}

/// Result of attempting to reveal a stored value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// The payload authenticated and decoded
    Plain(String),
    /// No vault secret is available; the value stays sealed
    Locked,
    /// The payload did not authenticate under the derived key
    Failed,
}

impl DecryptOutcome {
    /// Plaintext, or the decryption error marker
    ///
    /// Returns `None` only for [`DecryptOutcome::Locked`].
    pub fn display(&self) -> Option<&str> {
        match self {
            DecryptOutcome::Plain(text) => Some(text),
            DecryptOutcome::Locked => None,
            DecryptOutcome::Failed => Some(DECRYPTION_ERROR),
        }
    }
}

/// Field cipher bound to one derived key
///
/// Deriving a key costs a full PBKDF2 run, so callers that touch several values
/// in one pass (an edit session, an aggregation over children) derive once and
/// reuse the cipher. The key is dropped, and zeroed, with the cipher.
#[derive(Debug, Clone)]
pub struct FieldCipher {
    key: DerivedKey,
}

impl From<DerivedKey> for FieldCipher {
    fn from(key: DerivedKey) -> Self {
        Self { key }
    }
}

impl FieldCipher {
    /// Derive the key for `(secret, salt)` and bind a cipher to it
    pub async fn derive(secret: &str, salt: &str) -> Result<Self, CryptoError> {
        Ok(derive_key(secret, salt).await?.into())
    }

    /// Encrypt a plaintext value
    ///
    /// A random nonce is drawn for every call.
    ///
    /// # Errors
    ///
    /// Returns an error only if the OS RNG fails.
    pub fn encrypt(&self, plain_text: &str) -> Result<EncryptedPayload, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes).map_err(|e| CryptoError::Rng(e.to_string()))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .key
            .cipher()
            .encrypt(nonce, plain_text.as_bytes())
            .map_err(|_| CryptoError::Authentication)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);

        Ok(EncryptedPayload(STANDARD.encode(out)))
    }

    /// Decrypt a payload, reporting why it failed
    pub fn try_decrypt(&self, payload: &str) -> Result<String, CryptoError> {
        let data = STANDARD.decode(payload)?;
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Truncated(data.len()));
        }

        let (nonce, sealed) = data.split_at(NONCE_SIZE);
        let plain = self
            .key
            .cipher()
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::Authentication)?;

        Ok(String::from_utf8(plain)?)
    }

    /// Decrypt a payload, substituting [`DECRYPTION_ERROR`] on failure
    pub fn decrypt(&self, payload: &str) -> String {
        match self.try_decrypt(payload) {
            Ok(plain) => plain,
            Err(e) => {
                tracing::error!("field decryption failed, invalid key or corrupted data: {}", e);
                DECRYPTION_ERROR.to_string()
            }
        }
    }
}

/// Encrypt `plain_text` under the key derived from `(secret, salt)`
pub async fn encrypt(
    plain_text: &str,
    secret: &str,
    salt: &str,
) -> Result<EncryptedPayload, CryptoError> {
    FieldCipher::derive(secret, salt).await?.encrypt(plain_text)
}

/// Decrypt `payload` under the key derived from `(secret, salt)`
///
/// Never fails: any error (empty secret, bad base64, wrong key, tampering) is
/// logged and turned into [`DECRYPTION_ERROR`].
pub async fn decrypt(payload: &str, secret: &str, salt: &str) -> String {
    match FieldCipher::derive(secret, salt).await {
        Ok(cipher) => cipher.decrypt(payload),
        Err(e) => {
            tracing::error!("field decryption failed, could not derive key: {}", e);
            DECRYPTION_ERROR.to_string()
        }
    }
}

/// Heuristic check for whether a stored string is an encrypted payload
///
/// True for strings of at least [`MIN_PAYLOAD_LEN`] characters made only of
/// `A-Z a-z 0-9 + / =`. This is a guess from the value's shape, not a
/// cryptographic check: long alphanumeric plain text is misclassified.
pub fn is_encrypted(value: &str) -> bool {
    value.len() >= MIN_PAYLOAD_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}
