//! eavdb core - attribute catalog, SQL grammar and the EAV attribute compiler.
//!
//! Callers filter, order and project entity attributes with the same
//! vocabulary as physical columns. Attribute requests are buffered and
//! compiled once, when SQL is requested, into joins against the typed value
//! tables plus native predicates.

pub mod catalog;
pub mod config;
pub mod error;
pub mod query;

pub use catalog::{
    AttributeDescriptor, AttributeProvider, AttributeSet, EntityRef, MemoryAttributeProvider,
    SqlType,
};
pub use config::QueryConfig;
pub use error::{Error, Result};
pub use query::{
    AttributeQuery, BaseQuery, BindingMode, Dialect, Grammar, ProcessState, SqlGrammar, SqlQuery,
};

/// Re-export protocol types.
pub use eavdb_proto as proto;
