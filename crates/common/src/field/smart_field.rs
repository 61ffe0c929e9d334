use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{watch, Mutex as AsyncMutex, OnceCell};
use uuid::Uuid;

use super::state::{CommitOutcome, FieldSnapshot, FieldState, FieldStatus};
use super::{FieldConfig, FieldError};
use crate::crypto::{FieldCipher, DECRYPTION_ERROR};
use crate::debounce::DebounceTimer;
use crate::property::{FieldDefinition, FieldType, PropertyValue};
use crate::session::SessionContext;
use crate::store::{CollabMap, PropertyService};

#[derive(Debug)]
struct FieldInner {
    state: FieldState,
    focused: bool,
    /// Current input value, always plaintext
    value: PropertyValue,
    /// Plaintext of the last value known to be stored
    baseline: PropertyValue,
    /// Stored form of the last value known to be stored
    stored: PropertyValue,
    /// The user changed `value` and it has not been written
    dirty: bool,
    edit_seq: u64,
    sync_seq: u64,
    /// Inbound value held back while the user edits
    deferred: Option<PropertyValue>,
    status: FieldStatus,
}

struct Shared {
    doc_id: Uuid,
    field: FieldDefinition,
    session: SessionContext,
    service: Arc<dyn PropertyService>,
    collab: Option<Arc<dyn CollabMap>>,
    timer: DebounceTimer,
    inner: Mutex<FieldInner>,
    snapshots: watch::Sender<FieldSnapshot>,
    /// Derived once per controller, on first use
    cipher: OnceCell<FieldCipher>,
    /// Serializes writes so an older value can never land after a newer one
    write_lock: AsyncMutex<()>,
}

/// Controller for one property of one document
///
/// Cheap to clone; clones share state. The debounce timer holds a clone while
/// a write is scheduled, so a pending edit is still flushed if every other
/// handle is dropped.
#[derive(Clone)]
pub struct SmartField {
    shared: Arc<Shared>,
}

impl fmt::Debug for SmartField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartField")
            .field("doc_id", &self.shared.doc_id)
            .field("key", &self.shared.field.key)
            .field("state", &self.state())
            .finish()
    }
}

impl SmartField {
    /// Create a controller with an empty value
    ///
    /// Feed the stored value through [`SmartField::apply_remote`] to populate
    /// it.
    pub fn new(
        doc_id: Uuid,
        field: FieldDefinition,
        session: SessionContext,
        service: Arc<dyn PropertyService>,
        collab: Option<Arc<dyn CollabMap>>,
        config: FieldConfig,
    ) -> Self {
        let inner = FieldInner {
            state: FieldState::Synced,
            focused: false,
            value: PropertyValue::Null,
            baseline: PropertyValue::Null,
            stored: PropertyValue::Null,
            dirty: false,
            edit_seq: 0,
            sync_seq: 0,
            deferred: None,
            status: FieldStatus::Idle,
        };
        let (snapshots, _) = watch::channel(FieldSnapshot {
            state: FieldState::Synced,
            display: PropertyValue::Null,
            status: FieldStatus::Idle,
            placeholder: field.placeholder(),
        });

        Self {
            shared: Arc::new(Shared {
                doc_id,
                field,
                session,
                service,
                collab,
                timer: DebounceTimer::new(config.debounce),
                inner: Mutex::new(inner),
                snapshots,
                cipher: OnceCell::new(),
                write_lock: AsyncMutex::new(()),
            }),
        }
    }

    pub fn doc_id(&self) -> Uuid {
        self.shared.doc_id
    }

    pub fn field(&self) -> &FieldDefinition {
        &self.shared.field
    }

    pub fn key(&self) -> &str {
        &self.shared.field.key
    }

    pub fn state(&self) -> FieldState {
        self.shared.inner.lock().state
    }

    pub fn is_focused(&self) -> bool {
        self.shared.inner.lock().focused
    }

    /// Whether an inbound value is waiting for the edit to finish
    pub fn has_deferred_remote(&self) -> bool {
        self.shared.inner.lock().deferred.is_some()
    }

    /// Whether a debounced write is scheduled
    pub fn has_pending_write(&self) -> bool {
        self.shared.timer.is_pending()
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    /// Value to show in the input
    pub fn display(&self) -> PropertyValue {
        self.snapshot().display
    }

    /// Watch for snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<FieldSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Accept a stored value from the service or a collaborator
    ///
    /// Held back while the field is focused or has unsaved changes. Encrypted
    /// values are decrypted with the session's vault secret; without one the
    /// field becomes [`FieldState::Locked`] and shows nothing.
    pub async fn apply_remote(&self, stored: PropertyValue) {
        let seq = {
            let mut inner = self.shared.inner.lock();
            if inner.focused || inner.dirty {
                tracing::debug!(
                    doc_id = %self.shared.doc_id,
                    key = %self.shared.field.key,
                    "holding inbound value while editing"
                );
                inner.deferred = Some(stored);
                return;
            }
            if inner.state == FieldState::Synced && inner.stored == stored {
                return;
            }

            inner.sync_seq += 1;
            inner.stored = stored.clone();

            if !stored.is_encrypted() {
                let value = normalize(stored);
                inner.value = value.clone();
                inner.baseline = value;
                inner.state = FieldState::Synced;
                self.publish(&inner);
                return;
            }

            if self.shared.session.is_locked() {
                inner.value = PropertyValue::Null;
                inner.baseline = PropertyValue::Null;
                inner.state = FieldState::Locked;
                self.publish(&inner);
                return;
            }

            inner.state = FieldState::Decrypting;
            self.publish(&inner);
            inner.sync_seq
        };

        let payload = stored.as_str().unwrap_or_default();
        let plain = match self.cipher().await {
            Ok(cipher) => cipher.decrypt(payload),
            Err(e) => {
                tracing::error!(key = %self.shared.field.key, "failed to derive field key: {}", e);
                DECRYPTION_ERROR.to_string()
            }
        };

        let mut inner = self.shared.inner.lock();
        if inner.sync_seq != seq {
            // a newer value arrived while decrypting
            return;
        }
        if inner.dirty {
            // the user typed over the value before it was revealed
            inner.deferred = Some(stored);
            return;
        }
        let value = PropertyValue::Text(plain);
        inner.value = value.clone();
        inner.baseline = value;
        inner.state = if inner.focused {
            FieldState::Editing
        } else {
            FieldState::Synced
        };
        self.publish(&inner);
    }

    /// The input gained focus
    pub fn focus(&self) {
        let mut inner = self.shared.inner.lock();
        inner.focused = true;
        if inner.state == FieldState::Synced {
            inner.state = FieldState::Editing;
        }
        self.publish(&inner);
    }

    /// The user changed the input
    ///
    /// Schedules a write after the debounce period, replacing any write
    /// already scheduled. Returns `false` when the change was refused because
    /// the field is read-only or locked.
    pub fn input(&self, value: impl Into<PropertyValue>) -> bool {
        if self.shared.field.read_only {
            return false;
        }
        {
            let mut inner = self.shared.inner.lock();
            if inner.state == FieldState::Locked {
                return false;
            }
            inner.value = value.into();
            inner.dirty = true;
            inner.edit_seq += 1;
            inner.status = FieldStatus::Idle;
            if inner.state != FieldState::Persisting {
                inner.state = FieldState::DirtyPending;
            }
            self.publish(&inner);
        }

        let this = self.clone();
        self.shared.timer.reset(async move {
            this.commit().await;
        });
        true
    }

    /// The input lost focus
    ///
    /// Unsaved changes are written right away. Otherwise any inbound value
    /// held back during the edit is applied.
    pub async fn blur(&self) -> CommitOutcome {
        self.shared.timer.cancel();
        let needs_commit = {
            let mut inner = self.shared.inner.lock();
            inner.focused = false;
            inner.dirty && !inner.value.same_as(&inner.baseline)
        };
        if needs_commit && !self.shared.field.read_only {
            return self.commit().await;
        }

        let deferred = {
            let mut inner = self.shared.inner.lock();
            inner.dirty = false;
            if matches!(inner.state, FieldState::Editing | FieldState::DirtyPending) {
                inner.state = FieldState::Synced;
            }
            self.publish(&inner);
            inner.deferred.take()
        };
        if let Some(stored) = deferred {
            self.apply_remote(stored).await;
        }
        CommitOutcome::Unchanged
    }

    /// Write the current value now if it differs from the stored one
    ///
    /// Called by the debounce timer and on blur. Failures are reported
    /// through the outcome and the field status; the edited value is kept.
    pub async fn commit(&self) -> CommitOutcome {
        if self.shared.field.read_only {
            return CommitOutcome::ReadOnly;
        }
        let _write = self.shared.write_lock.lock().await;

        let (value, seq) = {
            let mut inner = self.shared.inner.lock();
            if inner.value.same_as(&inner.baseline) {
                inner.dirty = false;
                inner.state = match inner.state {
                    FieldState::Locked | FieldState::Decrypting => inner.state,
                    _ if inner.focused => FieldState::Editing,
                    _ => FieldState::Synced,
                };
                self.publish(&inner);
                return CommitOutcome::Unchanged;
            }
            if self.shared.field.confidential
                && !inner.value.is_blank()
                && self.shared.session.is_locked()
            {
                tracing::warn!(
                    key = %self.shared.field.key,
                    "confidential field not saved: vault is locked"
                );
                inner.status = FieldStatus::Error(FieldError::Locked.to_string());
                self.publish(&inner);
                return CommitOutcome::Locked;
            }
            inner.state = FieldState::Persisting;
            self.publish(&inner);
            (inner.value.clone(), inner.edit_seq)
        };

        let result = self.persist(&value).await;

        let mut inner = self.shared.inner.lock();
        match result {
            Ok(stored) => {
                inner.baseline = value;
                inner.stored = stored.clone();
                inner.status = FieldStatus::Saved;
                if inner.deferred.take().is_some() {
                    tracing::debug!(
                        key = %self.shared.field.key,
                        "inbound value superseded by local edit"
                    );
                }
                if inner.edit_seq == seq {
                    inner.dirty = false;
                    inner.state = if inner.focused {
                        FieldState::Editing
                    } else {
                        FieldState::Synced
                    };
                    self.publish(&inner);
                    CommitOutcome::Persisted(stored)
                } else {
                    inner.state = FieldState::DirtyPending;
                    self.publish(&inner);
                    CommitOutcome::Superseded(stored)
                }
            }
            Err(e) => {
                tracing::warn!(
                    doc_id = %self.shared.doc_id,
                    key = %self.shared.field.key,
                    "failed to save field: {}",
                    e
                );
                let message = e.to_string();
                inner.status = FieldStatus::Error(message.clone());
                inner.state = FieldState::DirtyPending;
                self.publish(&inner);
                CommitOutcome::Failed(message)
            }
        }
    }

    /// Write `value` to the service and the collaborative map
    async fn persist(&self, value: &PropertyValue) -> Result<PropertyValue, FieldError> {
        let field = &self.shared.field;
        let mut stored = match (field.field_type, value) {
            (FieldType::Money, PropertyValue::Text(text)) => parse_amount(text)
                .map(PropertyValue::Number)
                .unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        };

        if field.confidential && !stored.is_blank() {
            if self.shared.session.is_locked() {
                return Err(FieldError::Locked);
            }
            let payload = self.cipher().await?.encrypt(&stored.normalized())?;
            stored = payload.into();
        }

        self.shared
            .service
            .update_property(
                self.shared.doc_id,
                &field.key,
                stored.clone(),
                Some(self.shared.session.user_id()),
            )
            .await?;

        if let Some(collab) = &self.shared.collab {
            if collab.get(&field.key).as_ref() != Some(&stored) {
                collab.set(&field.key, stored.clone());
            }
        }

        Ok(stored)
    }

    /// The session's cipher, derived on first use
    ///
    /// Only call when the vault is unlocked.
    async fn cipher(&self) -> Result<FieldCipher, FieldError> {
        let secret = self.shared.session.vault().ok_or(FieldError::Locked)?;
        let salt = self.shared.session.salt();
        let cipher = self
            .shared
            .cipher
            .get_or_try_init(|| FieldCipher::derive(secret.expose(), &salt))
            .await?;
        Ok(cipher.clone())
    }

    fn publish(&self, inner: &FieldInner) {
        self.shared.snapshots.send_replace(FieldSnapshot {
            state: inner.state,
            display: self.visible(inner),
            status: inner.status.clone(),
            placeholder: self.shared.field.placeholder(),
        });
    }

    /// What the input may show for the current value
    fn visible(&self, inner: &FieldInner) -> PropertyValue {
        if inner.state == FieldState::Locked {
            return PropertyValue::Null;
        }
        match (self.shared.field.field_type, &inner.value) {
            (FieldType::Money, PropertyValue::Number(_)) => inner.value.clone(),
            (FieldType::Money, PropertyValue::Text(text))
                if text.is_empty() || parse_amount(text).is_some() =>
            {
                inner.value.clone()
            }
            (FieldType::Money, _) => PropertyValue::Null,
            _ => inner.value.clone(),
        }
    }
}

/// Stored plaintext as it should appear in the input
///
/// Numeric zero and the string `"0"` both become the number zero.
fn normalize(stored: PropertyValue) -> PropertyValue {
    match stored {
        PropertyValue::Text(text) if text == "0" => PropertyValue::Number(0.0),
        PropertyValue::Number(n) if n == 0.0 => PropertyValue::Number(0.0),
        other => other,
    }
}

fn parse_amount(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::crypto;
    use crate::session::VaultSecret;
    use crate::store::{MemoryCollabMap, MemoryPropertyService, WorkspaceNode};

    struct Fixture {
        field: SmartField,
        service: MemoryPropertyService,
        collab: MemoryCollabMap,
        doc_id: Uuid,
    }

    fn fixture(definition: FieldDefinition, session: SessionContext) -> Fixture {
        let doc_id = Uuid::new_v4();
        let service = MemoryPropertyService::new();
        service.insert(WorkspaceNode::new(doc_id, Some("note")));
        let collab = MemoryCollabMap::new();
        let field = SmartField::new(
            doc_id,
            definition,
            session,
            Arc::new(service.clone()),
            Some(Arc::new(collab.clone())),
            FieldConfig::default(),
        );
        Fixture {
            field,
            service,
            collab,
            doc_id,
        }
    }

    fn plain(key: &str) -> Fixture {
        fixture(
            FieldDefinition::new(key, FieldType::Text),
            SessionContext::new(Uuid::new_v4()),
        )
    }

    #[tokio::test]
    async fn test_remote_plain_value_is_shown() {
        let f = plain("status");
        f.field.apply_remote("todo".into()).await;
        assert_eq!(f.field.display(), PropertyValue::from("todo"));
        assert_eq!(f.field.state(), FieldState::Synced);
    }

    #[tokio::test]
    async fn test_zero_string_normalizes_to_number() {
        let f = plain("count");
        f.field.apply_remote("0".into()).await;
        assert_eq!(f.field.display(), PropertyValue::Number(0.0));

        // blur with the same zero does not write
        f.field.focus();
        f.field.input(PropertyValue::Number(0.0));
        assert_eq!(f.field.blur().await, CommitOutcome::Unchanged);
        assert!(f.service.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_write() {
        let f = plain("status");
        f.field.focus();
        assert!(f.field.input("doing"));
        assert_eq!(f.field.state(), FieldState::DirtyPending);

        tokio::time::sleep(Duration::from_millis(1499)).await;
        assert!(f.service.writes().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let writes = f.service.writes_to(f.doc_id, "status");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].value, PropertyValue::from("doing"));
        // still focused
        assert_eq!(f.field.state(), FieldState::Editing);
        assert_eq!(f.collab.get("status"), Some(PropertyValue::from("doing")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_write_once_with_last_value() {
        let f = plain("title");
        f.field.focus();
        for text in ["h", "he", "hel", "hell", "hello"] {
            f.field.input(text);
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        tokio::time::sleep(Duration::from_millis(2000)).await;

        let writes = f.service.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].value, PropertyValue::from("hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blur_writes_immediately() {
        let f = plain("status");
        f.field.focus();
        f.field.input("done");

        let outcome = f.field.blur().await;
        assert_eq!(outcome, CommitOutcome::Persisted("done".into()));
        assert!(!f.field.has_pending_write());
        assert_eq!(f.field.state(), FieldState::Synced);
        assert_eq!(f.field.snapshot().status, FieldStatus::Saved);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(f.service.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_read_only_refuses_input() {
        let f = fixture(
            FieldDefinition::new("sealed_at", FieldType::Text).read_only(),
            SessionContext::new(Uuid::new_v4()),
        );
        f.field.apply_remote("yesterday".into()).await;
        f.field.focus();
        assert!(!f.field.input("today"));
        assert_eq!(f.field.blur().await, CommitOutcome::Unchanged);
        assert_eq!(f.field.commit().await, CommitOutcome::ReadOnly);
        assert!(f.service.writes().is_empty());
        assert_eq!(f.field.display(), PropertyValue::from("yesterday"));
    }

    #[tokio::test]
    async fn test_remote_held_while_focused_then_applied() {
        let f = plain("status");
        f.field.apply_remote("todo".into()).await;
        f.field.focus();

        f.field.apply_remote("doing".into()).await;
        assert_eq!(f.field.display(), PropertyValue::from("todo"));
        assert!(f.field.has_deferred_remote());

        f.field.blur().await;
        assert_eq!(f.field.display(), PropertyValue::from("doing"));
        assert!(f.service.writes().is_empty());
    }

    #[tokio::test]
    async fn test_local_edit_beats_held_remote() {
        let f = plain("status");
        f.field.apply_remote("todo".into()).await;
        f.field.focus();
        f.field.input("done");
        f.field.apply_remote("doing".into()).await;

        let outcome = f.field.blur().await;
        assert_eq!(outcome, CommitOutcome::Persisted("done".into()));
        assert!(!f.field.has_deferred_remote());
        assert_eq!(f.field.display(), PropertyValue::from("done"));
        assert_eq!(f.service.property(f.doc_id, "status"), Some("done".into()));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_value() {
        let f = plain("status");
        f.service.fail_writes(Some("offline"));
        f.field.focus();
        f.field.input("done");

        let outcome = f.field.blur().await;
        assert!(matches!(outcome, CommitOutcome::Failed(ref m) if m.contains("offline")));
        let snapshot = f.field.snapshot();
        assert_eq!(snapshot.display, PropertyValue::from("done"));
        assert_eq!(snapshot.state, FieldState::DirtyPending);
        assert!(matches!(snapshot.status, FieldStatus::Error(_)));
        assert!(f.collab.get("status").is_none());

        // retry once the service is back
        f.service.fail_writes(None);
        assert_eq!(f.field.blur().await, CommitOutcome::Persisted("done".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_write_cannot_overwrite_newer() {
        let f = plain("status");
        f.service.set_write_delay(Some(Duration::from_millis(1000)));

        f.field.focus();
        f.field.input("first");
        let first = {
            let field = f.field.clone();
            tokio::spawn(async move { field.blur().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.field.state(), FieldState::Persisting);

        f.field.focus();
        f.field.input("second");
        let second = f.field.blur().await;

        assert_eq!(first.await.unwrap(), CommitOutcome::Superseded("first".into()));
        assert_eq!(second, CommitOutcome::Persisted("second".into()));
        assert_eq!(f.service.property(f.doc_id, "status"), Some("second".into()));
        assert_eq!(f.field.state(), FieldState::Synced);
    }

    #[tokio::test]
    async fn test_money_written_as_number_and_guarded_on_display() {
        let f = fixture(
            FieldDefinition::new("amount", FieldType::Money),
            SessionContext::new(Uuid::new_v4()),
        );
        f.field.focus();
        f.field.input("12.50");
        assert_eq!(f.field.blur().await, CommitOutcome::Persisted(12.5.into()));
        assert_eq!(f.service.property(f.doc_id, "amount"), Some(12.5.into()));

        f.field.apply_remote("not a number".into()).await;
        assert_eq!(f.field.display(), PropertyValue::Null);
    }

    #[tokio::test]
    async fn test_locked_field_shows_nothing_and_refuses_edits() {
        let f = fixture(
            FieldDefinition::new("salary", FieldType::Text).confidential(),
            SessionContext::new(Uuid::new_v4()),
        );
        let ciphertext = "A".repeat(44);
        f.field.apply_remote(ciphertext.into()).await;

        let snapshot = f.field.snapshot();
        assert_eq!(snapshot.state, FieldState::Locked);
        assert_eq!(snapshot.display, PropertyValue::Null);
        assert_eq!(snapshot.placeholder, "[ENCRYPTED_STREAM]");

        f.field.focus();
        assert!(!f.field.input("1000"));
        f.field.blur().await;
        assert!(f.service.writes().is_empty());
    }

    #[tokio::test]
    async fn test_confidential_value_is_sealed_everywhere() {
        let user_id = Uuid::new_v4();
        let session = SessionContext::new(user_id).with_vault(VaultSecret::new("correct horse"));
        let f = fixture(
            FieldDefinition::new("salary", FieldType::Text).confidential(),
            session.clone(),
        );

        f.field.focus();
        f.field.input("90000");
        let stored = match f.field.blur().await {
            CommitOutcome::Persisted(stored) => stored,
            other => panic!("unexpected outcome: {:?}", other),
        };

        assert!(stored.is_encrypted());
        assert_eq!(f.service.property(f.doc_id, "salary"), Some(stored.clone()));
        assert_eq!(f.collab.get("salary"), Some(stored.clone()));
        assert_eq!(f.field.display(), PropertyValue::from("90000"));
        let payload = stored.as_str().unwrap();
        assert_eq!(
            crypto::decrypt(payload, "correct horse", &user_id.to_string()).await,
            "90000"
        );

        // a second replica reveals it
        let other = fixture(
            FieldDefinition::new("salary", FieldType::Text).confidential(),
            session,
        );
        other.field.apply_remote(stored).await;
        assert_eq!(other.field.state(), FieldState::Synced);
        assert_eq!(other.field.display(), PropertyValue::from("90000"));
    }

    #[tokio::test]
    async fn test_confidential_write_needs_vault() {
        let f = fixture(
            FieldDefinition::new("salary", FieldType::Text).confidential(),
            SessionContext::new(Uuid::new_v4()),
        );
        f.field.focus();
        f.field.input("90000");
        assert_eq!(f.field.blur().await, CommitOutcome::Locked);
        assert!(f.service.writes().is_empty());
        assert!(matches!(f.field.snapshot().status, FieldStatus::Error(_)));
    }

    #[tokio::test]
    async fn test_wrong_secret_shows_sentinel() {
        let user_id = Uuid::new_v4();
        let payload = crypto::encrypt("secret", "right", &user_id.to_string())
            .await
            .unwrap();
        let f = fixture(
            FieldDefinition::new("note", FieldType::Text).confidential(),
            SessionContext::new(user_id).with_vault(VaultSecret::new("wrong")),
        );
        f.field.apply_remote(payload.into()).await;
        assert_eq!(f.field.display(), PropertyValue::from(DECRYPTION_ERROR));
        assert_eq!(f.field.state(), FieldState::Synced);
    }
}
