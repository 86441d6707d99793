//! Attribute query configuration.

use serde::{Deserialize, Serialize};

/// Naming conventions used when compiling attribute queries.
///
/// One instance is shared (behind an `Arc`) by a builder and every nested
/// builder it spawns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Projection marker requesting every attribute of the entity.
    pub attribute_wildcard: String,

    /// Suffix appended to an attribute code to form its join alias.
    pub join_alias_suffix: String,

    /// Value column of the dynamic value tables.
    pub value_column: String,

    /// Column of a value table referencing the owning entity row.
    pub entity_key_column: String,

    /// Column of a value table referencing the attribute definition.
    pub attribute_key_column: String,

    /// Column used by `latest()` / `oldest()`.
    pub default_timestamp_column: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            attribute_wildcard: "attr.*".to_string(),
            join_alias_suffix: "_attr".to_string(),
            value_column: "value".to_string(),
            entity_key_column: "entity_id".to_string(),
            attribute_key_column: "attribute_id".to_string(),
            default_timestamp_column: "created_at".to_string(),
        }
    }
}

impl QueryConfig {
    /// Create a configuration with default naming.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attribute wildcard marker.
    pub fn with_attribute_wildcard(mut self, marker: impl Into<String>) -> Self {
        self.attribute_wildcard = marker.into();
        self
    }

    /// Set the join alias suffix.
    pub fn with_join_alias_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.join_alias_suffix = suffix.into();
        self
    }

    /// Set the value column name.
    pub fn with_value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = column.into();
        self
    }

    /// Set the entity key column name.
    pub fn with_entity_key_column(mut self, column: impl Into<String>) -> Self {
        self.entity_key_column = column.into();
        self
    }

    /// Set the attribute key column name.
    pub fn with_attribute_key_column(mut self, column: impl Into<String>) -> Self {
        self.attribute_key_column = column.into();
        self
    }

    /// Set the timestamp column used by `latest()` / `oldest()`.
    pub fn with_default_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.default_timestamp_column = column.into();
        self
    }

    /// Join alias for an attribute code.
    pub fn join_alias(&self, code: &str) -> String {
        format!("{}{}", code, self.join_alias_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueryConfig::default();
        assert_eq!(config.attribute_wildcard, "attr.*");
        assert_eq!(config.join_alias("color"), "color_attr");
        assert_eq!(config.default_timestamp_column, "created_at");
    }

    #[test]
    fn test_builder_methods() {
        let config = QueryConfig::new()
            .with_attribute_wildcard("eav.*")
            .with_join_alias_suffix("_j")
            .with_value_column("val");

        assert_eq!(config.attribute_wildcard, "eav.*");
        assert_eq!(config.join_alias("size"), "size_j");
        assert_eq!(config.value_column, "val");
        assert_eq!(config.entity_key_column, "entity_id");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: QueryConfig =
            serde_json::from_str(r#"{"join_alias_suffix": "_v"}"#).unwrap();
        assert_eq!(config.join_alias_suffix, "_v");
        assert_eq!(config.value_column, "value");
    }
}
