use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use uuid::Uuid;

use common::behavior::BehaviorRegistry;
use common::field::{CommitOutcome, SmartField};
use common::mirror::PropertyMirror;
use common::property::{FieldDefinition, FieldType, PropertyValue};
use common::session::SessionContext;
use common::store::{CollabMap, MemoryCollabMap, PropertyError, PropertyService};
use common::trigger::{AggregationEvent, AutoAggregationTrigger};

use crate::state::AppConfig;

/// One property edit, as typed on the command line
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub doc_id: Uuid,
    pub key: String,
    pub value: String,
    /// Store encrypted even if the class schema does not say so
    pub confidential: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditReport {
    pub outcome: CommitOutcome,
    /// The aggregation the document load scheduled, once it ran
    pub aggregation: Option<AggregationEvent>,
}

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("failed to load document: {0}")]
    Property(#[from] PropertyError),
    #[error("property {0} is read-only")]
    ReadOnly(String),
    #[error("property {0} is confidential and the vault is locked")]
    Locked(String),
    #[error("write failed: {0}")]
    Failed(String),
}

/// Edit one property the way an open document would
///
/// The document is loaded into a mirror, which schedules the class's
/// aggregation with the configured delay. The value then goes through a
/// field controller (encrypting it when the field is confidential) and is
/// committed as on blur. If an aggregation was scheduled, this waits for it
/// to run before returning.
pub async fn edit_property(
    service: Arc<dyn PropertyService>,
    session: SessionContext,
    config: &AppConfig,
    request: EditRequest,
) -> Result<EditReport, EditError> {
    let registry = Arc::new(BehaviorRegistry::builtin());
    let collab: Arc<dyn CollabMap> = Arc::new(MemoryCollabMap::new());
    let trigger = AutoAggregationTrigger::new(
        registry,
        service.clone(),
        session.clone(),
        config.trigger_config(),
    );
    let mut events = trigger.subscribe();

    let mirror = PropertyMirror::new(
        request.doc_id,
        service.clone(),
        collab.clone(),
        Some(trigger.clone()),
    );
    mirror.load().await?;

    let definition = field_definition(service.as_ref(), mirror.class_id(), &request).await?;
    let field = SmartField::new(
        request.doc_id,
        definition,
        session,
        service,
        Some(collab),
        config.field_config(),
    );
    mirror.attach(field.clone()).await;

    field.focus();
    if !field.input(PropertyValue::from(request.value.as_str())) {
        field.blur().await;
        return Err(if field.field().read_only {
            EditError::ReadOnly(request.key)
        } else {
            EditError::Locked(request.key)
        });
    }

    let outcome = match field.blur().await {
        CommitOutcome::ReadOnly => return Err(EditError::ReadOnly(request.key)),
        CommitOutcome::Locked => return Err(EditError::Locked(request.key)),
        CommitOutcome::Failed(message) => return Err(EditError::Failed(message)),
        outcome => outcome,
    };
    tracing::info!(doc_id = %request.doc_id, key = %request.key, "property edited");

    let aggregation = await_aggregation(&trigger, &mut events, request.doc_id).await;
    Ok(EditReport {
        outcome,
        aggregation,
    })
}

async fn field_definition(
    service: &dyn PropertyService,
    class_id: Option<String>,
    request: &EditRequest,
) -> Result<FieldDefinition, PropertyError> {
    let mut definition = None;
    if let Some(class_id) = class_id {
        let archetypes = service.get_archetypes().await?;
        definition = archetypes
            .iter()
            .find(|archetype| archetype.id == class_id)
            .and_then(|archetype| archetype.field(&request.key))
            .cloned();
    }

    let definition =
        definition.unwrap_or_else(|| FieldDefinition::new(request.key.clone(), FieldType::Text));
    Ok(if request.confidential {
        definition.confidential()
    } else {
        definition
    })
}

async fn await_aggregation(
    trigger: &AutoAggregationTrigger,
    events: &mut broadcast::Receiver<AggregationEvent>,
    doc_id: Uuid,
) -> Option<AggregationEvent> {
    // read before draining: once unscheduled, the event is already queued
    let scheduled = trigger.is_scheduled(doc_id);
    loop {
        match events.try_recv() {
            Ok(event) if event.doc_id == doc_id => return Some(event),
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Closed) => return None,
        }
    }
    if !scheduled {
        return None;
    }

    tracing::debug!(doc_id = %doc_id, "waiting for scheduled aggregation");
    loop {
        match events.recv().await {
            Ok(event) if event.doc_id == doc_id => return Some(event),
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return None,
        }
    }
}
