//! Shared helpers for property sync integration tests
#![allow(dead_code)]

use std::sync::Arc;

use common::crypto;
use common::field::{FieldConfig, SmartField};
use common::property::{FieldDefinition, PropertyValue};
use common::session::{SessionContext, VaultSecret};
use common::store::{CollabMap, MemoryPropertyService, PropertyService, WorkspaceNode};
use uuid::Uuid;

pub const VAULT_SECRET: &str = "correct horse battery staple";

/// A user with an in-memory workspace
pub struct TestWorkspace {
    pub service: MemoryPropertyService,
    pub user_id: Uuid,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            service: MemoryPropertyService::new(),
            user_id: Uuid::new_v4(),
        }
    }

    pub fn unlocked(&self) -> SessionContext {
        SessionContext::new(self.user_id).with_vault(VaultSecret::new(VAULT_SECRET))
    }

    pub fn locked(&self) -> SessionContext {
        SessionContext::new(self.user_id)
    }

    pub fn service(&self) -> Arc<dyn PropertyService> {
        Arc::new(self.service.clone())
    }

    /// Seal a value the way a confidential field would store it
    pub async fn seal(&self, plain: &str) -> PropertyValue {
        crypto::encrypt(plain, VAULT_SECRET, &self.user_id.to_string())
            .await
            .unwrap()
            .into()
    }

    /// Add a document of `class_id` and return its id
    pub fn doc(&self, class_id: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.service.insert(WorkspaceNode::new(id, Some(class_id)));
        id
    }

    /// Add a ledger whose entries carry the given `value` properties
    pub fn ledger(&self, values: Vec<PropertyValue>) -> Uuid {
        let ledger = self.doc("ledger");
        for value in values {
            self.service.insert(
                WorkspaceNode::new(Uuid::new_v4(), Some("entry"))
                    .with_parent(ledger)
                    .with_property("value", value),
            );
        }
        ledger
    }

    pub fn field(
        &self,
        doc_id: Uuid,
        definition: FieldDefinition,
        session: SessionContext,
        collab: Option<Arc<dyn CollabMap>>,
    ) -> SmartField {
        SmartField::new(
            doc_id,
            definition,
            session,
            self.service(),
            collab,
            FieldConfig::default(),
        )
    }
}
