//! eavdb query IR.
//!
//! This crate defines the dialect-neutral types shared by the attribute
//! compiler and the SQL grammar in `eavdb-core`.
//!
//! # Modules
//!
//! - [`value`] - Runtime values bound into queries
//! - [`query`] - Columns, predicates, joins and orderings
//! - [`error`] - IR construction errors

pub mod error;
pub mod query;
pub mod value;

pub use error::Error;

pub use query::{
    Boolean, ColumnRef, CompiledSql, DatePart, JoinClause, JoinCondition, JoinKind, Operator,
    OrderClause, OrderDirection, OrderTarget, SelectColumn, WhereClause,
};
pub use value::Value;
