//! Entity references.

use serde::{Deserialize, Serialize};

use super::types::SqlType;

/// The entity type owning a set of attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity type code, the attribute namespace.
    pub code: String,
    /// Base table.
    pub table: String,
    /// Primary key column of the base table.
    pub key_column: String,
}

impl EntityRef {
    /// Create an entity keyed by `id`.
    pub fn new(code: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            table: table.into(),
            key_column: "id".to_string(),
        }
    }

    /// Set the primary key column.
    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    /// Value table for dynamic attributes of the given type.
    pub fn value_table(&self, sql_type: SqlType) -> String {
        format!("{}_{}", self.code, sql_type.table_suffix())
    }
}
