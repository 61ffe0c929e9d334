//! One document's property bag, kept in step across service and peers
//!
//! A [`PropertyMirror`] loads the persisted bag, seeds the collaborative map
//! with any keys it lacks, and then follows the map: every change is merged
//! into the local bag and handed to the field controller registered for that
//! key. Changes from peers also re-arm the trigger for classes with an
//! aggregation rule.
//! It never writes a whole bag anywhere; all writes stay single-key.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::field::SmartField;
use crate::property::{PropertyBag, PropertyValue};
use crate::store::{ChangeOrigin, CollabEvent, CollabMap, PropertyError, PropertyService};
use crate::trigger::{AggregationTarget, AutoAggregationTrigger};

#[derive(Debug, Default)]
struct MirrorState {
    title: String,
    class_id: Option<String>,
    bag: PropertyBag,
}

#[derive(Debug)]
struct MirrorInner {
    doc_id: Uuid,
    service: Arc<dyn PropertyService>,
    collab: Arc<dyn CollabMap>,
    trigger: Option<AutoAggregationTrigger>,
    state: RwLock<MirrorState>,
    fields: RwLock<HashMap<String, SmartField>>,
}

#[derive(Debug, Clone)]
pub struct PropertyMirror {
    inner: Arc<MirrorInner>,
}

impl PropertyMirror {
    pub fn new(
        doc_id: Uuid,
        service: Arc<dyn PropertyService>,
        collab: Arc<dyn CollabMap>,
        trigger: Option<AutoAggregationTrigger>,
    ) -> Self {
        Self {
            inner: Arc::new(MirrorInner {
                doc_id,
                service,
                collab,
                trigger,
                state: RwLock::new(MirrorState::default()),
                fields: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn doc_id(&self) -> Uuid {
        self.inner.doc_id
    }

    pub fn title(&self) -> String {
        self.inner.state.read().title.clone()
    }

    pub fn class_id(&self) -> Option<String> {
        self.inner.state.read().class_id.clone()
    }

    /// Current merged bag
    pub fn bag(&self) -> PropertyBag {
        self.inner.state.read().bag.clone()
    }

    pub fn get(&self, key: &str) -> Option<PropertyValue> {
        self.inner.state.read().bag.get(key).cloned()
    }

    /// Fetch the document and reconcile it with what is already known
    ///
    /// Values already held locally win over the fetched ones. Keys missing
    /// from the collaborative map are seeded; present keys are left alone.
    pub async fn load(&self) -> Result<PropertyBag, PropertyError> {
        let doc = self.inner.service.get_doc(self.inner.doc_id).await?;

        let merged = {
            let mut state = self.inner.state.write();
            let mut merged = doc.properties;
            merged.extend(std::mem::take(&mut state.bag));
            state.bag = merged.clone();
            state.title = doc.title;
            state.class_id = doc.class_id;
            merged
        };

        let mut seeded = 0;
        for (key, value) in &merged {
            if !self.inner.collab.contains(key) {
                self.inner.collab.set(key, value.clone());
                seeded += 1;
            }
        }
        tracing::debug!(doc_id = %self.inner.doc_id, keys = merged.len(), seeded, "document loaded");

        for (key, value) in &merged {
            if let Some(field) = self.field(key) {
                field.apply_remote(value.clone()).await;
            }
        }
        self.arm_trigger();

        Ok(merged)
    }

    /// Register the controller for one key and feed it the current value
    pub async fn attach(&self, field: SmartField) {
        let key = field.key().to_string();
        let current = self.get(&key);
        self.inner.fields.write().insert(key, field.clone());
        if let Some(value) = current {
            field.apply_remote(value).await;
        }
    }

    pub fn field(&self, key: &str) -> Option<SmartField> {
        self.inner.fields.read().get(key).cloned()
    }

    /// Merge a change from the collaborative map
    ///
    /// Returns the keys whose value changed. Every changed key is forwarded
    /// to its registered field, whatever the origin; a field ignores its own
    /// echo and holds values back while being edited. Only changes made by
    /// peers re-arm the aggregation trigger, so an aggregation result written
    /// locally cannot schedule itself again.
    pub async fn apply_collab_change(&self, event: &CollabEvent) -> Vec<String> {
        let mut changed = Vec::new();
        {
            let mut state = self.inner.state.write();
            for key in &event.keys {
                let Some(value) = self.inner.collab.get(key) else {
                    continue;
                };
                if state.bag.get(key) != Some(&value) {
                    state.bag.insert(key.clone(), value);
                    changed.push(key.clone());
                }
            }
        }

        for key in &changed {
            let (Some(field), Some(value)) = (self.field(key), self.get(key)) else {
                continue;
            };
            field.apply_remote(value).await;
        }
        if event.origin == ChangeOrigin::Remote && !changed.is_empty() {
            self.arm_trigger();
        }
        changed
    }

    /// Re-read every key of the collaborative map as if a peer changed it
    pub async fn resync(&self) -> Vec<String> {
        let keys = self.inner.collab.snapshot().into_keys().collect();
        self.apply_collab_change(&CollabEvent {
            keys,
            origin: ChangeOrigin::Remote,
        })
        .await
    }

    /// Follow the collaborative map until it closes
    pub fn spawn_observer(&self) -> JoinHandle<()> {
        let mut events = self.inner.collab.observe();
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        this.apply_collab_change(&event).await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(doc_id = %this.inner.doc_id, missed, "collab observer lagged, resyncing");
                        this.resync().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn arm_trigger(&self) {
        let Some(trigger) = &self.inner.trigger else {
            return;
        };
        let (class_id, bag) = {
            let state = self.inner.state.read();
            match &state.class_id {
                Some(class_id) => (class_id.clone(), state.bag.clone()),
                None => return,
            }
        };
        trigger.arm(
            AggregationTarget::new(self.inner.doc_id, class_id)
                .with_properties(bag)
                .with_collab(self.inner.collab.clone()),
        );
    }
}
