//! Projection resolution.
//!
//! Rewrites the requested select list into base-table columns plus joined
//! attribute columns before attribute predicates are compiled.

use std::collections::BTreeSet;

use eavdb_proto::{ColumnRef, SelectColumn};

use super::join::JoinMaterializer;
use crate::catalog::{AttributeSet, EntityRef};

/// How the requested projection must be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Leave the projection untouched.
    Passthrough,
    /// Every attribute of the entity was requested.
    Wildcard { preserved: Vec<SelectColumn> },
    /// Specific attribute codes were requested.
    Explicit {
        codes: Vec<String>,
        preserved: Vec<SelectColumn>,
    },
}

impl Projection {
    /// Classify a select list.
    ///
    /// Unqualified, unaliased columns are attribute codes. Qualified or
    /// aliased columns and `table.*` are kept as written.
    pub fn classify(columns: &[SelectColumn]) -> Self {
        let mut wildcard = false;
        let mut codes = Vec::new();
        let mut preserved = Vec::new();

        for column in columns {
            match column {
                SelectColumn::All => {}
                SelectColumn::AttributeWildcard => wildcard = true,
                SelectColumn::Column {
                    column: ColumnRef { table: None, name },
                    alias: None,
                } => {
                    if !codes.contains(name) {
                        codes.push(name.clone());
                    }
                }
                other => preserved.push(other.clone()),
            }
        }

        if wildcard {
            Projection::Wildcard { preserved }
        } else if !codes.is_empty() {
            Projection::Explicit { codes, preserved }
        } else {
            Projection::Passthrough
        }
    }

    /// Attribute codes named explicitly.
    pub fn codes(&self) -> &[String] {
        match self {
            Projection::Explicit { codes, .. } => codes,
            _ => &[],
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Projection::Wildcard { .. })
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Projection::Passthrough)
    }

    /// Attribute codes this projection adds to the result.
    pub fn projected<'s>(&'s self, attributes: &'s AttributeSet) -> Vec<&'s str> {
        match self {
            Projection::Passthrough => Vec::new(),
            Projection::Wildcard { .. } => attributes
                .iter()
                .filter(|a| !a.is_static())
                .map(|a| a.code())
                .collect(),
            Projection::Explicit { codes, .. } => codes.iter().map(String::as_str).collect(),
        }
    }

    /// Build the physical select list.
    ///
    /// Emits `table.*`, the preserved columns, then one aliased column per
    /// dynamic attribute in `attributes` order. In the explicit case the
    /// attribute set is the requested codes merged with `referenced`.
    pub fn resolve(
        &self,
        entity: &EntityRef,
        attributes: &AttributeSet,
        referenced: &BTreeSet<String>,
        joins: &mut JoinMaterializer<'_>,
    ) -> Option<Vec<SelectColumn>> {
        let preserved = match self {
            Projection::Passthrough => return None,
            Projection::Wildcard { preserved } | Projection::Explicit { preserved, .. } => {
                preserved
            }
        };

        let mut columns = vec![SelectColumn::TableAll(entity.table.clone())];
        columns.extend(preserved.iter().cloned());

        for descriptor in attributes.iter() {
            if descriptor.is_static() || !self.includes(descriptor.code(), referenced) {
                continue;
            }
            let column = joins.column(descriptor);
            columns.push(SelectColumn::aliased(column, descriptor.code()));
        }
        Some(columns)
    }

    fn includes(&self, code: &str, referenced: &BTreeSet<String>) -> bool {
        match self {
            Projection::Passthrough => false,
            Projection::Wildcard { .. } => true,
            Projection::Explicit { codes, .. } => {
                referenced.contains(code) || codes.iter().any(|c| c == code)
            }
        }
    }
}
