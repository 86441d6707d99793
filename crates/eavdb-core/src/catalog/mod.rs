//! Attribute catalog.
//!
//! Entities, attribute descriptors and the metadata provider that resolves
//! attribute codes to their storage.

mod attribute;
mod entity;
mod provider;
mod types;

pub use attribute::{AttributeDescriptor, AttributeSet};
pub use entity::EntityRef;
pub use provider::{AttributeProvider, MemoryAttributeProvider};
pub use types::SqlType;
