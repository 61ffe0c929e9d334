//! Boundaries to the two external sources of truth for document properties
//!
//! - **[`PropertyService`]**: the persistence tier (remote API or local
//!   invocation layer) that owns documents and their property bags
//! - **[`CollabMap`]**: the per-document `properties` map of the real-time
//!   collaborative document, with change notification
//!
//! Both are consumed through single-key reads and upserts only. Neither is
//! ever overwritten wholesale, so concurrent writers touching different keys
//! do not conflict. Between the two, conflicts on the same key are
//! last-write-wins.
//!
//! In-memory implementations ([`MemoryPropertyService`], [`MemoryCollabMap`])
//! back the tests and any embedding that has no remote tier.

mod collab;
mod memory;
mod provider;

pub use collab::{ChangeOrigin, CollabEvent, CollabMap, MemoryCollabMap};
pub use memory::{MemoryPropertyService, PropertyWrite};
pub use provider::{DocumentMeta, PropertyError, PropertyService, WorkspaceNode};
