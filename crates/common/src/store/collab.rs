use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::property::{PropertyBag, PropertyValue};

/// Capacity of the change notification channel
const EVENT_CAPACITY: usize = 256;

/// Where a change to the collaborative map came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written through this replica
    Local,
    /// Merged in from a peer
    Remote,
}

/// Notification that one or more keys changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollabEvent {
    pub keys: Vec<String>,
    pub origin: ChangeOrigin,
}

/// The `properties` map of a collaborative document
///
/// Replication and merge semantics belong to the collaborative layer; this
/// crate only reads and sets single keys and listens for changes.
pub trait CollabMap: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<PropertyValue>;

    fn set(&self, key: &str, value: PropertyValue);

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Current contents of the map
    fn snapshot(&self) -> PropertyBag;

    /// Subscribe to change notifications
    fn observe(&self) -> broadcast::Receiver<CollabEvent>;
}

/// A standalone collaborative map held in memory
///
/// [`MemoryCollabMap::merge_remote`] stands in for updates arriving from
/// peers.
#[derive(Debug, Clone)]
pub struct MemoryCollabMap {
    entries: Arc<RwLock<PropertyBag>>,
    events: broadcast::Sender<CollabEvent>,
}

impl Default for MemoryCollabMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCollabMap {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(PropertyBag::new())),
            events,
        }
    }

    /// Apply a batch of updates as if a peer had sent them
    pub fn merge_remote(&self, updates: PropertyBag) {
        if updates.is_empty() {
            return;
        }
        let keys: Vec<String> = updates.keys().cloned().collect();
        {
            let mut entries = self.entries.write();
            entries.extend(updates);
        }
        self.notify(keys, ChangeOrigin::Remote);
    }

    fn notify(&self, keys: Vec<String>, origin: ChangeOrigin) {
        // no subscribers is fine
        let _ = self.events.send(CollabEvent { keys, origin });
    }
}

impl CollabMap for MemoryCollabMap {
    fn get(&self, key: &str) -> Option<PropertyValue> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: PropertyValue) {
        {
            let mut entries = self.entries.write();
            if entries.get(key) == Some(&value) {
                return;
            }
            entries.insert(key.to_string(), value);
        }
        self.notify(vec![key.to_string()], ChangeOrigin::Local);
    }

    fn snapshot(&self) -> PropertyBag {
        self.entries.read().clone()
    }

    fn observe(&self) -> broadcast::Receiver<CollabEvent> {
        self.events.subscribe()
    }
}
