/**
 * Class-scoped behavior actions.
 *  - Registry of actions per document class
 *  - Built-in aggregations and state toggles
 *  - Dispatcher that contains action failures
 */
pub mod behavior;
/**
 * Client-side field encryption.
 *  - PBKDF2 key derivation from the vault secret
 *  - AES-256-GCM payloads and the
 *    encrypted-value heuristic
 */
pub mod crypto;
/**
 * Cancellable, restartable delayed task
 *  shared by field persistence and
 *  auto-aggregation.
 */
pub mod debounce;
/**
 * Per-property field controllers that
 *  decrypt on read, encrypt on write and
 *  debounce persistence.
 */
pub mod field;
/**
 * Keeps one document's properties in step
 *  between the property service, the
 *  collaborative map and its fields.
 */
pub mod mirror;
/**
 * Property values, bags and class schemas.
 */
pub mod property;
/**
 * The acting user and their vault secret.
 */
pub mod session;
/**
 * Boundaries to the persistence and
 *  collaboration layers, with in-memory
 *  implementations.
 */
pub mod store;
/**
 * Debounced automatic aggregation per
 *  document class.
 */
pub mod trigger;

pub mod prelude {
    pub use crate::behavior::{
        ActionDispatcher, ActionError, ActionResult, BehaviorAction, BehaviorRegistry,
        DispatchOutcome,
    };
    pub use crate::crypto::{decrypt, encrypt, is_encrypted, CryptoError, FieldCipher};
    pub use crate::field::{CommitOutcome, FieldConfig, FieldState, FieldStatus, SmartField};
    pub use crate::mirror::PropertyMirror;
    pub use crate::property::{FieldDefinition, FieldType, PropertyBag, PropertyValue};
    pub use crate::session::{SessionContext, VaultSecret};
    pub use crate::store::{CollabMap, PropertyError, PropertyService};
    pub use crate::trigger::{AggregationTarget, AutoAggregationTrigger, TriggerConfig};
}
