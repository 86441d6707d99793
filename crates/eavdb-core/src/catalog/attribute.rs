//! Attribute descriptors.

use serde::{Deserialize, Serialize};

use super::entity::EntityRef;
use super::types::SqlType;

/// Storage metadata for one attribute code.
///
/// Immutable once loaded. Join and column generation match on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeDescriptor {
    /// Stored as a column of the entity's base table.
    Static {
        code: String,
        column: String,
        sql_type: SqlType,
    },
    /// Stored as rows of a typed value table.
    Dynamic {
        id: i64,
        code: String,
        table: String,
        sql_type: SqlType,
    },
}

impl AttributeDescriptor {
    /// A static attribute whose column shares its code.
    pub fn static_column(code: impl Into<String>, sql_type: SqlType) -> Self {
        let code = code.into();
        AttributeDescriptor::Static {
            column: code.clone(),
            code,
            sql_type,
        }
    }

    /// A dynamic attribute stored in the entity's value table for `sql_type`.
    pub fn dynamic(id: i64, code: impl Into<String>, sql_type: SqlType, entity: &EntityRef) -> Self {
        AttributeDescriptor::Dynamic {
            id,
            code: code.into(),
            table: entity.value_table(sql_type),
            sql_type,
        }
    }

    /// The attribute code.
    pub fn code(&self) -> &str {
        match self {
            AttributeDescriptor::Static { code, .. } | AttributeDescriptor::Dynamic { code, .. } => {
                code
            }
        }
    }

    /// Check if the attribute is a base-table column.
    pub fn is_static(&self) -> bool {
        matches!(self, AttributeDescriptor::Static { .. })
    }

    /// The attribute's SQL type.
    pub fn sql_type(&self) -> SqlType {
        match self {
            AttributeDescriptor::Static { sql_type, .. }
            | AttributeDescriptor::Dynamic { sql_type, .. } => *sql_type,
        }
    }
}

/// Descriptors loaded for one entity, in definition order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSet {
    entity: EntityRef,
    attributes: Vec<AttributeDescriptor>,
}

impl AttributeSet {
    /// Create an empty set for an entity.
    pub fn new(entity: EntityRef) -> Self {
        Self {
            entity,
            attributes: Vec::new(),
        }
    }

    /// Add a descriptor, replacing any previous one with the same code.
    pub fn insert(&mut self, descriptor: AttributeDescriptor) {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.code() == descriptor.code())
        {
            Some(existing) => *existing = descriptor,
            None => self.attributes.push(descriptor),
        }
    }

    /// Add a descriptor (builder form).
    pub fn with(mut self, descriptor: AttributeDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    /// Owning entity.
    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// Look up a descriptor by code.
    pub fn get(&self, code: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.code() == code)
    }

    /// Check if a code is present.
    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// Iterate descriptors in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
