//! Debounced automatic aggregation
//!
//! Some classes keep a derived property current without anyone pressing a
//! button: a ledger recomputes its balance shortly after it is opened and
//! whenever its inputs change. [`AutoAggregationTrigger::arm`] schedules the
//! class's aggregation action after a quiet period; arming again before it
//! fires restarts the wait. Nothing is scheduled while the vault is locked.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::behavior::{ActionDispatcher, BehaviorRegistry, DispatchOutcome};
use crate::debounce::DebounceTimer;
use crate::property::PropertyBag;
use crate::session::SessionContext;
use crate::store::{CollabMap, PropertyService};

/// Default quiet period before an aggregation runs
pub const DEFAULT_AGGREGATION_DELAY: Duration = Duration::from_millis(1500);

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub delay: Duration,
    /// Class id to the action run for it
    pub rules: HashMap<String, String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_AGGREGATION_DELAY,
            rules: HashMap::from([("ledger".to_string(), "aggregate_balance".to_string())]),
        }
    }
}

impl TriggerConfig {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_rule(mut self, class_id: impl Into<String>, action_id: impl Into<String>) -> Self {
        self.rules.insert(class_id.into(), action_id.into());
        self
    }
}

/// A document whose derived property should be refreshed
#[derive(Debug, Clone)]
pub struct AggregationTarget {
    pub doc_id: Uuid,
    pub class_id: String,
    pub properties: PropertyBag,
    /// Where to apply the result locally
    pub collab: Option<Arc<dyn CollabMap>>,
}

impl AggregationTarget {
    pub fn new(doc_id: Uuid, class_id: impl Into<String>) -> Self {
        Self {
            doc_id,
            class_id: class_id.into(),
            properties: PropertyBag::new(),
            collab: None,
        }
    }

    pub fn with_properties(mut self, properties: PropertyBag) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_collab(mut self, collab: Arc<dyn CollabMap>) -> Self {
        self.collab = Some(collab);
        self
    }
}

/// Emitted every time a scheduled aggregation runs
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationEvent {
    pub doc_id: Uuid,
    pub action_id: String,
    pub outcome: DispatchOutcome,
}

/// Pending work for one (document, action); the latest arm wins
#[derive(Debug)]
struct Scheduled {
    timer: DebounceTimer,
    dispatcher: ActionDispatcher,
    target: AggregationTarget,
}

type ScheduleKey = (Uuid, String);

#[derive(Debug)]
struct TriggerInner {
    registry: Arc<BehaviorRegistry>,
    service: Arc<dyn PropertyService>,
    session: SessionContext,
    config: TriggerConfig,
    /// One timer per (document, action)
    scheduled: Mutex<HashMap<ScheduleKey, Scheduled>>,
    events: broadcast::Sender<AggregationEvent>,
}

#[derive(Debug, Clone)]
pub struct AutoAggregationTrigger {
    inner: Arc<TriggerInner>,
}

impl AutoAggregationTrigger {
    pub fn new(
        registry: Arc<BehaviorRegistry>,
        service: Arc<dyn PropertyService>,
        session: SessionContext,
        config: TriggerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(TriggerInner {
                registry,
                service,
                session,
                config,
                scheduled: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AggregationEvent> {
        self.inner.events.subscribe()
    }

    /// Schedule the aggregation for `target`, restarting any pending wait
    ///
    /// Returns `false` without scheduling anything when the class has no
    /// aggregation rule or the vault is locked.
    pub fn arm(&self, target: AggregationTarget) -> bool {
        let Some(action_id) = self.inner.config.rules.get(&target.class_id).cloned() else {
            return false;
        };
        if self.inner.session.is_locked() {
            tracing::debug!(doc_id = %target.doc_id, "vault locked, auto aggregation skipped");
            return false;
        }

        let doc_id = target.doc_id;
        let key = (doc_id, action_id);
        let timer = {
            let mut scheduled = self.inner.scheduled.lock();
            match scheduled.get_mut(&key) {
                Some(entry) => {
                    entry.dispatcher = entry.dispatcher.with_collab(target.collab.clone());
                    entry.target = target;
                    entry.timer.clone()
                }
                None => {
                    let entry = Scheduled {
                        timer: DebounceTimer::new(self.inner.config.delay),
                        dispatcher: ActionDispatcher::new(
                            self.inner.registry.clone(),
                            self.inner.service.clone(),
                            target.collab.clone(),
                        ),
                        target,
                    };
                    let timer = entry.timer.clone();
                    scheduled.insert(key.clone(), entry);
                    timer
                }
            }
        };

        tracing::debug!(doc_id = %doc_id, action = %key.1, "auto aggregation armed");
        self.schedule(&timer, key);
        true
    }

    fn schedule(&self, timer: &DebounceTimer, key: ScheduleKey) {
        let this = self.clone();
        timer.reset(async move {
            this.fire(key).await;
        });
    }

    async fn fire(&self, key: ScheduleKey) {
        let (dispatcher, target) = {
            let scheduled = self.inner.scheduled.lock();
            match scheduled.get(&key) {
                Some(entry) => (entry.dispatcher.clone(), entry.target.clone()),
                None => return,
            }
        };
        let (doc_id, action_id) = key.clone();

        tracing::info!(doc_id = %doc_id, action = %action_id, "running auto aggregation");
        let outcome = dispatcher
            .dispatch_named(
                &target.class_id,
                &action_id,
                &self.inner.session,
                doc_id,
                &target.properties,
            )
            .await;

        let busy = outcome == DispatchOutcome::Busy;
        // no subscribers is fine
        let _ = self.inner.events.send(AggregationEvent {
            doc_id,
            action_id,
            outcome,
        });

        let retry = {
            let mut scheduled = self.inner.scheduled.lock();
            match scheduled.get(&key).map(|entry| entry.timer.clone()) {
                // armed again while running; that run covers it
                Some(timer) if timer.is_pending() => None,
                // an earlier run is still going; retry once it had time to finish
                Some(timer) if busy => Some(timer),
                Some(_) => {
                    scheduled.remove(&key);
                    None
                }
                None => None,
            }
        };
        if let Some(timer) = retry {
            self.schedule(&timer, key);
        }
    }

    /// Drop every pending aggregation for a document
    ///
    /// Returns how many were pending. Runs already in progress finish but
    /// are not retried.
    pub fn cancel(&self, doc_id: Uuid) -> usize {
        let mut cancelled = 0;
        self.inner.scheduled.lock().retain(|(id, _), entry| {
            if *id != doc_id {
                return true;
            }
            if entry.timer.cancel() {
                cancelled += 1;
            }
            false
        });
        cancelled
    }

    /// Whether an aggregation for a document is waiting or still running
    ///
    /// Turns false only after the run's event has been sent.
    pub fn is_scheduled(&self, doc_id: Uuid) -> bool {
        self.inner
            .scheduled
            .lock()
            .keys()
            .any(|(id, _)| *id == doc_id)
    }

    /// Whether an aggregation is waiting to run for a document
    pub fn is_pending(&self, doc_id: Uuid) -> bool {
        let scheduled = self.inner.scheduled.lock();
        scheduled
            .iter()
            .any(|((id, _), entry)| *id == doc_id && entry.timer.is_pending())
    }
}
