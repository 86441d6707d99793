//! Protocol error types.

use thiserror::Error;

/// Errors raised while building query IR from loose input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The operator text is not part of the comparison vocabulary.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// A column reference could not be parsed.
    #[error("invalid column reference: {0}")]
    InvalidColumn(String),
}
