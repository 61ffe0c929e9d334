//! Session state threaded through every operation that needs a user or a key
//!
//! The vault secret is read-only for everything in this crate. It is set and
//! cleared by whatever owns authentication; components only ever receive a
//! [`SessionContext`] by reference.

use std::fmt;

use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::{CryptoError, FieldCipher};

/// The user's master passphrase, held in memory only
///
/// Not serializable, redacted in `Debug`, zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultSecret(Zeroizing<String>);

impl VaultSecret {
    /// Wrap a secret, treating an empty string as no secret at all
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return None;
        }
        Some(Self(Zeroizing::new(secret)))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VaultSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultSecret([REDACTED])")
    }
}

/// Current user plus an optional vault secret
#[derive(Debug, Clone)]
pub struct SessionContext {
    user_id: Uuid,
    vault: Option<VaultSecret>,
}

impl SessionContext {
    /// A session with a locked vault
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            vault: None,
        }
    }

    /// Attach a vault secret, unlocking confidential values
    pub fn with_vault(mut self, secret: Option<VaultSecret>) -> Self {
        self.vault = secret;
        self
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Salt used for key derivation, the hyphenated user id
    pub fn salt(&self) -> String {
        self.user_id.to_string()
    }

    pub fn vault(&self) -> Option<&VaultSecret> {
        self.vault.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.vault.is_none()
    }

    /// Derive this session's field cipher
    ///
    /// Returns `Ok(None)` when the vault is locked.
    pub async fn cipher(&self) -> Result<Option<FieldCipher>, CryptoError> {
        match &self.vault {
            Some(secret) => Ok(Some(
                FieldCipher::derive(secret.expose(), &self.salt()).await?,
            )),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_secret_is_locked() {
        assert!(VaultSecret::new("").is_none());
        let session = SessionContext::new(Uuid::new_v4()).with_vault(VaultSecret::new(""));
        assert!(session.is_locked());
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let session =
            SessionContext::new(Uuid::new_v4()).with_vault(VaultSecret::new("hunter2"));
        let debug = format!("{:?}", session);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_salt_is_hyphenated_user_id() {
        let id = Uuid::parse_str("0b5d6c38-7d6e-4a0f-9f3e-2f7c1d1e2a3b").unwrap();
        assert_eq!(
            SessionContext::new(id).salt(),
            "0b5d6c38-7d6e-4a0f-9f3e-2f7c1d1e2a3b"
        );
    }

    #[tokio::test]
    async fn test_locked_session_has_no_cipher() {
        let session = SessionContext::new(Uuid::new_v4());
        assert!(session.cipher().await.unwrap().is_none());
    }
}
