//! Query building and SQL generation.
//!
//! The physical layer ([`BaseQuery`], [`SqlQuery`], [`Grammar`]) builds and
//! renders plain relational queries. The attribute layer
//! ([`AttributeQuery`]) decorates it with predicates, orderings and
//! projections over EAV attributes, compiled lazily into joins.

mod base;
mod buffer;
mod builder;
mod compiler;
mod grammar;
mod insert;
mod join;
mod projection;

pub use base::{BaseQuery, SqlQuery};
pub use buffer::{OrderRequest, PredicateRequest, QueryBuffer};
pub use builder::{AttributeQuery, EntityContext, ProcessState};
pub use compiler::{AttributeCompiler, StagedAttributes};
pub use grammar::{quote_identifier, BindingMode, Dialect, Grammar, SqlGrammar};
pub use insert::inline_literal;
pub use join::{CachedJoin, JoinCache, JoinMaterializer, JoinPlan};
pub use projection::Projection;
