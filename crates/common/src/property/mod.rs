//! Document property values and schemas
//!
//! - **[`PropertyValue`]**: closed set of values a property bag can hold
//! - **[`PropertyBag`]**: key/value metadata attached to one document
//! - **[`FieldDefinition`]**: static description of one property, including
//!   whether it is confidential or read-only
//! - **[`Archetype`]**: a document class and its field schema
//!
//! Values travel as plain JSON scalars. An encrypted value is just a
//! [`PropertyValue::Text`] whose contents pass
//! [`is_encrypted`](crate::crypto::is_encrypted); there is no flag on the
//! value itself.

mod schema;
mod value;

pub use schema::{parse_ui_schema, Archetype, FieldDefinition, FieldType, SchemaError, ValueKind};
pub use value::{deserialize_bag_lenient, PropertyBag, PropertyValue};
