use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::provider::{DocumentMeta, PropertyError, PropertyService, WorkspaceNode};
use crate::property::{Archetype, PropertyBag, PropertyValue};

/// One recorded call to [`PropertyService::update_property`]
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyWrite {
    pub doc_id: Uuid,
    pub key: String,
    pub value: PropertyValue,
    pub user_id: Option<Uuid>,
}

/// In-memory property service using HashMaps
///
/// Single tenant: [`PropertyService::get_all_docs`] returns every stored
/// document regardless of user. Every successful write is recorded so callers
/// can inspect exactly what was persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryPropertyService {
    inner: Arc<RwLock<MemoryPropertyServiceInner>>,
}

#[derive(Debug, Default)]
struct MemoryPropertyServiceInner {
    /// Documents keyed by id, in insertion order via `order`
    docs: HashMap<Uuid, WorkspaceNode>,
    order: Vec<Uuid>,
    archetypes: Vec<Archetype>,
    /// Successful writes, oldest first
    writes: Vec<PropertyWrite>,
    /// When set, every write fails with this message
    fail_writes: Option<String>,
    /// Simulated round trip applied to writes
    write_delay: Option<Duration>,
}

fn lock_error(e: impl std::fmt::Display) -> PropertyError {
    PropertyError::Provider(anyhow::anyhow!("failed to acquire lock: {}", e))
}

impl MemoryPropertyService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document
    pub fn insert(&self, node: WorkspaceNode) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if !inner.docs.contains_key(&node.id) {
            inner.order.push(node.id);
        }
        inner.docs.insert(node.id, node);
    }

    pub fn set_archetypes(&self, archetypes: Vec<Archetype>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.archetypes = archetypes;
    }

    /// Make every subsequent write fail (or succeed again with `None`)
    pub fn fail_writes(&self, message: Option<&str>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.fail_writes = message.map(str::to_string);
    }

    /// Delay every subsequent write by `delay`
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.write_delay = delay;
    }

    /// Current properties of a document
    pub fn properties(&self, doc_id: Uuid) -> Option<PropertyBag> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.docs.get(&doc_id).map(|d| d.properties.clone())
    }

    /// Current value of a single property
    pub fn property(&self, doc_id: Uuid, key: &str) -> Option<PropertyValue> {
        self.properties(doc_id).and_then(|mut bag| bag.remove(key))
    }

    /// All successful writes, oldest first
    pub fn writes(&self) -> Vec<PropertyWrite> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.writes.clone()
    }

    /// Successful writes to one key of one document
    pub fn writes_to(&self, doc_id: Uuid, key: &str) -> Vec<PropertyWrite> {
        self.writes()
            .into_iter()
            .filter(|w| w.doc_id == doc_id && w.key == key)
            .collect()
    }
}

#[async_trait]
impl PropertyService for MemoryPropertyService {
    async fn get_doc(&self, doc_id: Uuid) -> Result<DocumentMeta, PropertyError> {
        let inner = self.inner.read().map_err(lock_error)?;
        inner
            .docs
            .get(&doc_id)
            .cloned()
            .map(DocumentMeta::from)
            .ok_or(PropertyError::NotFound(doc_id))
    }

    async fn update_property(
        &self,
        doc_id: Uuid,
        key: &str,
        value: PropertyValue,
        user_id: Option<Uuid>,
    ) -> Result<(), PropertyError> {
        let delay = {
            let inner = self.inner.read().map_err(lock_error)?;
            if let Some(message) = &inner.fail_writes {
                return Err(PropertyError::Rejected {
                    status: 500,
                    message: message.clone(),
                });
            }
            inner.write_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.write().map_err(lock_error)?;
        let doc = inner
            .docs
            .get_mut(&doc_id)
            .ok_or(PropertyError::NotFound(doc_id))?;

        if key == "title" {
            doc.title = value.normalized();
        } else {
            doc.properties.insert(key.to_string(), value.clone());
        }

        inner.writes.push(PropertyWrite {
            doc_id,
            key: key.to_string(),
            value,
            user_id,
        });

        Ok(())
    }

    async fn get_all_docs(&self, _user_id: Uuid) -> Result<Vec<WorkspaceNode>, PropertyError> {
        let inner = self.inner.read().map_err(lock_error)?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.docs.get(id).cloned())
            .collect())
    }

    async fn get_archetypes(&self) -> Result<Vec<Archetype>, PropertyError> {
        let inner = self.inner.read().map_err(lock_error)?;
        Ok(inner.archetypes.clone())
    }
}
