//! Core error types.

use thiserror::Error;

/// Errors raised by the catalog, the grammar and the attribute compiler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed operator/value combination, rejected at buffering time.
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    /// A referenced attribute code has no descriptor for the entity.
    #[error("unknown attribute '{code}' on entity '{entity}'")]
    UnknownAttribute { entity: String, code: String },

    /// Attribute conditions were buffered on a builder with no owning entity.
    #[error("attribute conditions require an entity context")]
    MissingEntityContext,

    /// The metadata provider could not answer.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// The grammar cannot render the query.
    #[error("grammar error: {0}")]
    Grammar(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] eavdb_proto::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownAttribute {
            entity: "product".into(),
            code: "weight".into(),
        };
        assert_eq!(err.to_string(), "unknown attribute 'weight' on entity 'product'");

        let err: Error = eavdb_proto::Error::UnknownOperator("~".into()).into();
        assert_eq!(err.to_string(), "protocol error: unknown operator: ~");
    }
}
