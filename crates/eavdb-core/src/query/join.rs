//! Attribute join materialization.
//!
//! Exposes each attribute as a column: static attributes resolve to a base
//! table column, dynamic ones to the value column of a join against their
//! value table. At most one join is produced per attribute and entity.

use std::collections::{BTreeMap, HashMap};

use eavdb_proto::{ColumnRef, JoinClause, JoinKind};
use tracing::trace;

use crate::catalog::{AttributeDescriptor, EntityRef};
use crate::config::QueryConfig;

/// A join already added for an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedJoin {
    pub alias: String,
    pub column: ColumnRef,
    pub kind: JoinKind,
}

/// Joins materialized by one builder, keyed by (attribute code, entity code).
#[derive(Debug, Clone, Default)]
pub struct JoinCache {
    entries: HashMap<(String, String), CachedJoin>,
}

impl JoinCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &str, entity: &str) -> Option<&CachedJoin> {
        self.entries.get(&(code.to_string(), entity.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, code: &str, entity: &str, join: CachedJoin) {
        self.entries
            .insert((code.to_string(), entity.to_string()), join);
    }

    fn get_mut(&mut self, code: &str, entity: &str) -> Option<&mut CachedJoin> {
        self.entries.get_mut(&(code.to_string(), entity.to_string()))
    }
}

/// Join kind resolved once per attribute code for a compilation pass.
#[derive(Debug, Clone, Default)]
pub struct JoinPlan {
    kinds: BTreeMap<String, JoinKind>,
    pinned: BTreeMap<String, JoinKind>,
}

impl JoinPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a requester. `Inner` wins over `Left`.
    pub fn request(&mut self, code: &str, kind: JoinKind) {
        self.kinds
            .entry(code.to_string())
            .and_modify(|k| *k = k.merge(kind))
            .or_insert(kind);
    }

    /// Fix the kind for a code regardless of other requesters.
    pub fn pin(&mut self, code: &str, kind: JoinKind) {
        self.pinned.insert(code.to_string(), kind);
    }

    /// The resolved kind for a code, `Left` when nothing asked for it.
    pub fn kind(&self, code: &str) -> JoinKind {
        self.pinned
            .get(code)
            .or_else(|| self.kinds.get(code))
            .copied()
            .unwrap_or(JoinKind::Left)
    }
}

/// Produces attribute joins into a staging list.
///
/// Nothing touches the physical query until the caller commits
/// [`JoinMaterializer::into_parts`].
pub struct JoinMaterializer<'a> {
    entity: &'a EntityRef,
    config: &'a QueryConfig,
    plan: &'a JoinPlan,
    cache: JoinCache,
    joins: Vec<JoinClause>,
}

impl<'a> JoinMaterializer<'a> {
    pub fn new(
        entity: &'a EntityRef,
        config: &'a QueryConfig,
        plan: &'a JoinPlan,
        cache: JoinCache,
    ) -> Self {
        Self {
            entity,
            config,
            plan,
            cache,
            joins: Vec::new(),
        }
    }

    /// Column for an attribute, joined with the planned kind.
    pub fn column(&mut self, descriptor: &AttributeDescriptor) -> ColumnRef {
        let kind = self.plan.kind(descriptor.code());
        self.add_attribute_join(descriptor, kind)
    }

    /// Ensure the attribute is joined and return its column.
    ///
    /// A repeated request reuses the existing join. A request for `Inner`
    /// upgrades a staged `Left` join.
    pub fn add_attribute_join(
        &mut self,
        descriptor: &AttributeDescriptor,
        kind: JoinKind,
    ) -> ColumnRef {
        let (id, code, table) = match descriptor {
            AttributeDescriptor::Static { column, .. } => {
                return ColumnRef::qualified(&self.entity.table, column);
            }
            AttributeDescriptor::Dynamic { id, code, table, .. } => (*id, code, table),
        };

        if let Some(cached) = self.cache.get_mut(code, &self.entity.code) {
            trace!(code = %code, alias = %cached.alias, "attribute join cache hit");
            let merged = cached.kind.merge(kind);
            if merged != cached.kind {
                cached.kind = merged;
                let alias = cached.alias.clone();
                if let Some(join) = self
                    .joins
                    .iter_mut()
                    .find(|j| j.reference_name() == alias)
                {
                    join.kind = merged;
                }
            }
            return cached.column.clone();
        }

        let alias = self.config.join_alias(code);
        let join = JoinClause::new(kind, table.as_str())
            .with_alias(alias.as_str())
            .on(
                ColumnRef::qualified(&alias, &self.config.entity_key_column),
                ColumnRef::qualified(&self.entity.table, &self.entity.key_column),
            )
            .on_value(ColumnRef::qualified(&alias, &self.config.attribute_key_column), id);
        let column = ColumnRef::qualified(&alias, &self.config.value_column);

        trace!(code = %code, table = %table, alias = %alias, kind = ?kind, "materialized attribute join");

        self.joins.push(join);
        self.cache.insert(
            code,
            &self.entity.code,
            CachedJoin {
                alias,
                column: column.clone(),
                kind,
            },
        );
        column
    }

    /// Number of joins staged so far.
    pub fn staged(&self) -> usize {
        self.joins.len()
    }

    /// The updated cache and the staged joins, in materialization order.
    pub fn into_parts(self) -> (JoinCache, Vec<JoinClause>) {
        (self.cache, self.joins)
    }
}
