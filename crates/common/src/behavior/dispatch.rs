use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{ActionContext, ActionError, ActionResult, BehaviorAction, BehaviorRegistry};
use crate::property::PropertyBag;
use crate::session::SessionContext;
use crate::store::{CollabMap, PropertyService};

/// How a dispatched action ended
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Written to the service and applied to the collaborative map
    Applied(ActionResult),
    /// The action failed; nothing was applied locally
    Failed(String),
    /// Another action from this dispatcher is still running
    Busy,
}

impl DispatchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, DispatchOutcome::Applied(_))
    }
}

/// Runs behavior actions one at a time
///
/// Every error, and any panic, raised by an action stops here and becomes a
/// [`DispatchOutcome::Failed`]. On success the result is also set in the
/// collaborative map so other replicas see it without a reload.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    registry: Arc<BehaviorRegistry>,
    service: Arc<dyn PropertyService>,
    collab: Option<Arc<dyn CollabMap>>,
    in_flight: Arc<Mutex<Option<&'static str>>>,
}

/// Clears the in-flight slot when the dispatch ends or is dropped
struct InFlight<'a>(&'a Mutex<Option<&'static str>>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

impl ActionDispatcher {
    pub fn new(
        registry: Arc<BehaviorRegistry>,
        service: Arc<dyn PropertyService>,
        collab: Option<Arc<dyn CollabMap>>,
    ) -> Self {
        Self {
            registry,
            service,
            collab,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Same dispatcher, applying results to another collaborative map
    ///
    /// The copy shares the in-flight slot, so it still refuses to overlap
    /// with runs started by the original.
    pub fn with_collab(&self, collab: Option<Arc<dyn CollabMap>>) -> Self {
        Self {
            collab,
            ..self.clone()
        }
    }

    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    /// Id of the action currently running, if any
    pub fn in_flight(&self) -> Option<&'static str> {
        *self.in_flight.lock()
    }

    fn begin(&self, action_id: &'static str) -> Option<InFlight<'_>> {
        let mut slot = self.in_flight.lock();
        if slot.is_some() {
            return None;
        }
        *slot = Some(action_id);
        Some(InFlight(&self.in_flight))
    }

    /// Look up an action by class and id and run it
    pub async fn dispatch_named(
        &self,
        class_id: &str,
        action_id: &str,
        session: &SessionContext,
        doc_id: Uuid,
        properties: &PropertyBag,
    ) -> DispatchOutcome {
        match self.registry.find(class_id, action_id) {
            Some(action) => {
                self.dispatch(action.as_ref(), session, doc_id, properties)
                    .await
            }
            None => {
                let e = ActionError::Unknown {
                    class_id: class_id.to_string(),
                    action_id: action_id.to_string(),
                };
                tracing::warn!("{}", e);
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }

    /// Run an action against a document
    pub async fn dispatch(
        &self,
        action: &dyn BehaviorAction,
        session: &SessionContext,
        doc_id: Uuid,
        properties: &PropertyBag,
    ) -> DispatchOutcome {
        let Some(_in_flight) = self.begin(action.id()) else {
            tracing::debug!(action = action.id(), "dispatcher busy");
            return DispatchOutcome::Busy;
        };

        let ctx = ActionContext {
            service: self.service.as_ref(),
            session,
            doc_id,
            properties,
        };

        match AssertUnwindSafe(action.execute(&ctx)).catch_unwind().await {
            Ok(Ok(result)) => {
                if let Some(collab) = &self.collab {
                    if collab.get(&result.key).as_ref() != Some(&result.value) {
                        collab.set(&result.key, result.value.clone());
                    }
                }
                tracing::info!(action = action.id(), %doc_id, key = %result.key, "action applied");
                DispatchOutcome::Applied(result)
            }
            Ok(Err(e)) => {
                tracing::error!(action = action.id(), %doc_id, "action failed: {}", e);
                DispatchOutcome::Failed(e.to_string())
            }
            Err(_) => {
                tracing::error!(action = action.id(), %doc_id, "action panicked");
                DispatchOutcome::Failed(format!("action {} panicked", action.id()))
            }
        }
    }
}
