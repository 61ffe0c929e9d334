//! Class-scoped behavior actions
//!
//! A behavior action is a named computation attached to a document class. It
//! reads the document and, for aggregations, its children, computes a single
//! value and writes it back as one property. The [`BehaviorRegistry`] maps
//! classes to their actions and the [`ActionDispatcher`] runs them, catching
//! every failure at its boundary.

mod actions;
mod dispatch;
mod registry;

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::CryptoError;
use crate::property::{PropertyBag, PropertyValue};
use crate::session::SessionContext;
use crate::store::{PropertyError, PropertyService};

pub use actions::{AggregateBalance, AggregateProgress, ArchiveNode, CycleStatus, SealNote};
pub use dispatch::{ActionDispatcher, DispatchOutcome};
pub use registry::BehaviorRegistry;

/// The property an action wrote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub key: String,
    pub value: PropertyValue,
}

impl ActionResult {
    pub fn new(key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("property error: {0}")]
    Property(#[from] PropertyError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("no user in session")]
    MissingUser,
    #[error("no action {action_id} for class {class_id}")]
    Unknown { class_id: String, action_id: String },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Everything an action may read while it runs
pub struct ActionContext<'a> {
    pub service: &'a dyn PropertyService,
    pub session: &'a SessionContext,
    pub doc_id: Uuid,
    /// The document's properties as the caller currently sees them
    pub properties: &'a PropertyBag,
}

impl ActionContext<'_> {
    /// The acting user, required by anything that lists documents
    pub fn user_id(&self) -> Result<Uuid, ActionError> {
        let user_id = self.session.user_id();
        if user_id.is_nil() {
            return Err(ActionError::MissingUser);
        }
        Ok(user_id)
    }

    /// Persist the action's single result
    pub async fn write(&self, result: ActionResult) -> Result<ActionResult, ActionError> {
        self.service
            .update_property(
                self.doc_id,
                &result.key,
                result.value.clone(),
                Some(self.session.user_id()),
            )
            .await?;
        Ok(result)
    }
}

#[async_trait]
pub trait BehaviorAction: Send + Sync + Debug {
    /// Stable identifier, unique within a class
    fn id(&self) -> &'static str;

    /// Human readable name for buttons and listings
    fn label(&self) -> &'static str;

    /// Compute and persist the action's result
    ///
    /// Writes at most one property, and only once the value is fully
    /// computed.
    async fn execute(&self, ctx: &ActionContext<'_>) -> Result<ActionResult, ActionError>;
}
