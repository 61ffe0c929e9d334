//! Cryptographic primitives for client-side field encryption
//!
//! This module provides everything the property layer needs to keep
//! confidential values sealed before they leave the client:
//!
//! - **Key Derivation**: PBKDF2-HMAC-SHA256 over the user's vault secret,
//!   salted with the user id, producing a 256-bit AES key
//! - **Field Encryption**: AES-256-GCM over single scalar values, encoded as
//!   base64 `nonce || ciphertext || tag`
//! - **Classification**: a heuristic that decides whether a stored value
//!   looks like an encrypted payload
//!
//! # Security Model
//!
//! ## Keys
//! A [`DerivedKey`] is a pure function of `(secret, salt)`. Nothing is ever
//! stored: keys are recomputed on demand and may only be held in memory for the
//! lifetime of a single edit or aggregation pass. Using the user id as salt
//! means two users who happen to pick the same secret still get different keys.
//!
//! ## Nonces
//! Every call to [`FieldCipher::encrypt`] draws a fresh 96-bit nonce from the
//! OS RNG. Callers cannot supply a nonce, so reuse under the same key is not
//! expressible through this API.
//!
//! ## Failures
//! Decryption failures never propagate out of [`decrypt`]: they are logged and
//! replaced by the [`DECRYPTION_ERROR`] sentinel so a rendering field can show
//! a visible marker instead of crashing or echoing ciphertext.
//!
//! ## Known limitation
//! [`is_encrypted`] is a shape heuristic (length >= 40, base64 alphabet only).
//! Plain text that happens to match the shape is misclassified as ciphertext,
//! and nothing in the stored value marks it otherwise.

mod cipher;
mod kdf;

pub use cipher::{
    decrypt, encrypt, is_encrypted, DecryptOutcome, EncryptedPayload, FieldCipher,
    DECRYPTION_ERROR, MIN_PAYLOAD_LEN, NONCE_SIZE, TAG_SIZE,
};
pub use kdf::{derive_key, derive_key_blocking, DerivedKey, KDF_ITERATIONS, KEY_SIZE};

/// Errors that can occur during key derivation or field encryption
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Key derivation was asked to run without a secret
    #[error("vault secret is empty")]
    EmptySecret,
    /// The AEAD rejected the input (wrong key, tampered or truncated payload)
    #[error("authentication failed")]
    Authentication,
    /// The payload is not valid base64
    #[error("payload decode error: {0}")]
    Decode(#[from] base64::DecodeError),
    /// The payload is too short to contain a nonce and a tag
    #[error("payload too short: {0} bytes")]
    Truncated(usize),
    /// Decrypted bytes were not valid UTF-8
    #[error("plaintext is not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// The OS RNG failed while drawing a nonce
    #[error("failed to generate nonce: {0}")]
    Rng(String),
    /// A blocking crypto task was cancelled or panicked
    #[error("crypto task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
