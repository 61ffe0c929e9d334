use crate::property::PropertyValue;

/// Where a field controller is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    /// Display matches the last known stored value
    Synced,
    /// A stored payload is being decrypted
    Decrypting,
    /// The stored value is encrypted and no vault secret is available
    Locked,
    /// The input has focus and no unsaved change
    Editing,
    /// The user changed the value and it has not been persisted yet
    DirtyPending,
    /// A write is in flight
    Persisting,
}

/// Indicator shown next to the input
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldStatus {
    #[default]
    Idle,
    /// The last write succeeded
    Saved,
    /// The last write failed; the edited value is kept for retry
    Error(String),
}

/// Everything a view needs to render a field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
    pub state: FieldState,
    /// Value for the input; never raw ciphertext
    pub display: PropertyValue,
    pub status: FieldStatus,
    pub placeholder: &'static str,
}

/// What a commit did
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Display equals the last stored value; nothing written
    Unchanged,
    /// The field is read-only; nothing written
    ReadOnly,
    /// A confidential value needs the vault and it is locked; nothing written
    Locked,
    /// Written; carries the stored form (ciphertext for confidential fields)
    Persisted(PropertyValue),
    /// Written, but a newer edit arrived meanwhile and is still pending
    Superseded(PropertyValue),
    /// The write failed; the edit is kept
    Failed(String),
}
