use std::collections::HashMap;
use std::sync::Arc;

use super::actions::{AggregateBalance, AggregateProgress, ArchiveNode, CycleStatus, SealNote};
use super::BehaviorAction;

/// Actions available per document class
///
/// Class actions come first, in registration order, followed by the common
/// actions every class shares.
#[derive(Debug, Clone, Default)]
pub struct BehaviorRegistry {
    classes: HashMap<String, Vec<Arc<dyn BehaviorAction>>>,
    common: Vec<Arc<dyn BehaviorAction>>,
}

impl BehaviorRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every built-in action
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("note", SealNote);
        registry.register("ledger", AggregateBalance);
        registry.register("task", CycleStatus);
        registry.register("project", AggregateProgress);
        registry.register_common(ArchiveNode);
        registry
    }

    pub fn register(&mut self, class_id: &str, action: impl BehaviorAction + 'static) {
        self.classes
            .entry(class_id.to_string())
            .or_default()
            .push(Arc::new(action));
    }

    pub fn register_common(&mut self, action: impl BehaviorAction + 'static) {
        self.common.push(Arc::new(action));
    }

    /// Actions for a class, ending with the common ones
    ///
    /// Unknown classes get only the common actions.
    pub fn actions_for_class(&self, class_id: &str) -> Vec<Arc<dyn BehaviorAction>> {
        self.classes
            .get(class_id)
            .into_iter()
            .flatten()
            .chain(self.common.iter())
            .cloned()
            .collect()
    }

    /// Look up one action available to a class
    pub fn find(&self, class_id: &str, action_id: &str) -> Option<Arc<dyn BehaviorAction>> {
        self.actions_for_class(class_id)
            .into_iter()
            .find(|action| action.id() == action_id)
    }

    /// Classes with at least one class-specific action
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }
}
