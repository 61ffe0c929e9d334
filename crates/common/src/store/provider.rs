use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::property::{deserialize_bag_lenient, Archetype, PropertyBag, PropertyValue};

/// A single document as returned by [`PropertyService::get_doc`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_bag_lenient")]
    pub properties: PropertyBag,
}

/// A document summary as returned by [`PropertyService::get_all_docs`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceNode {
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_bag_lenient")]
    pub properties: PropertyBag,
}

impl WorkspaceNode {
    pub fn new(id: Uuid, class_id: Option<&str>) -> Self {
        Self {
            id,
            title: String::new(),
            parent_id: None,
            class_id: class_id.map(str::to_string),
            properties: PropertyBag::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn is_child_of(&self, parent_id: Uuid) -> bool {
        self.parent_id == Some(parent_id)
    }
}

impl From<WorkspaceNode> for DocumentMeta {
    fn from(node: WorkspaceNode) -> Self {
        Self {
            id: node.id,
            title: node.title,
            class_id: node.class_id,
            parent_id: node.parent_id,
            properties: node.properties,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PropertyError {
    #[error("document not found: {0}")]
    NotFound(Uuid),
    /// The service answered but refused the request
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unhandled property provider error: {0}")]
    Provider(#[from] anyhow::Error),
}

/// Read/write access to persisted document properties
///
/// Implementations own the wire format and storage layout. Writes are
/// single-key upserts; a provider must never replace a whole bag in response
/// to [`PropertyService::update_property`].
#[async_trait]
pub trait PropertyService: Send + Sync + Debug {
    /// Fetch one document with its properties
    async fn get_doc(&self, doc_id: Uuid) -> Result<DocumentMeta, PropertyError>;

    /// Upsert a single property
    ///
    /// # Arguments
    /// * `doc_id` - The document to write to
    /// * `key` - The property key; `title` writes the document title
    /// * `value` - The value to persist, ciphertext for confidential fields
    /// * `user_id` - The acting user, when known
    async fn update_property(
        &self,
        doc_id: Uuid,
        key: &str,
        value: PropertyValue,
        user_id: Option<Uuid>,
    ) -> Result<(), PropertyError>;

    /// List every document visible to a user
    async fn get_all_docs(&self, user_id: Uuid) -> Result<Vec<WorkspaceNode>, PropertyError>;

    /// List the document classes and their schemas
    async fn get_archetypes(&self) -> Result<Vec<Archetype>, PropertyError>;

    /// Direct children of a document
    async fn get_children(
        &self,
        parent_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<WorkspaceNode>, PropertyError> {
        Ok(self
            .get_all_docs(user_id)
            .await?
            .into_iter()
            .filter(|doc| doc.is_child_of(parent_id))
            .collect())
    }
}
