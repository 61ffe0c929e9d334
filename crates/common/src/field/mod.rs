//! Per-property field controllers
//!
//! A [`SmartField`] bridges one property key between its stored form and an
//! editable value:
//!
//! - **Decrypt on read**: stored values that look encrypted are revealed with
//!   the session's vault secret, or shown empty when the vault is locked
//! - **Encrypt on write**: confidential fields are sealed before they reach
//!   either the property service or the collaborative map, so every replica
//!   converges on ciphertext
//! - **Debounced persistence**: edits are written after a quiet period or on
//!   blur, whichever comes first
//! - **Edit wins while focused**: inbound updates are held back while the user
//!   is typing and applied once the edit is committed
//!
//! ```text
//!            focus                 input               debounce / blur
//!  Synced ---------> Editing ---------------> DirtyPending ----------> Persisting
//!    ^  \                                          ^                    |   |
//!    |   \ encrypted + vault    encrypted, no vault |  write failed      |   |
//!    |    v                          v             +--------------------+   |
//!    | Decrypting                 Locked                                    |
//!    +--------------------------------------------------------------------+
//!                                  write ok
//! ```

mod smart_field;
mod state;

use std::time::Duration;

pub use smart_field::SmartField;
pub use state::{CommitOutcome, FieldSnapshot, FieldState, FieldStatus};

/// Default quiet period before an edit is persisted
pub const DEFAULT_FIELD_DEBOUNCE: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldConfig {
    /// Quiet period after the last keystroke before persisting
    pub debounce: Duration,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_FIELD_DEBOUNCE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("vault is locked")]
    Locked,
    #[error("crypto error: {0}")]
    Crypto(#[from] crate::crypto::CryptoError),
    #[error("property error: {0}")]
    Property(#[from] crate::store::PropertyError),
}
