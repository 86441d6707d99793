//! Attribute value types.

use serde::{Deserialize, Serialize};

/// SQL type of an attribute's values.
///
/// Dynamic attributes store their values in one table per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Varchar,
    Int,
    Decimal,
    Datetime,
    Text,
}

impl SqlType {
    /// Suffix of the value table holding values of this type.
    pub fn table_suffix(&self) -> &'static str {
        match self {
            SqlType::Varchar => "varchar",
            SqlType::Int => "int",
            SqlType::Decimal => "decimal",
            SqlType::Datetime => "datetime",
            SqlType::Text => "text",
        }
    }
}
