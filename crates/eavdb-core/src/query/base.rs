//! Base query delegate.
//!
//! [`BaseQuery`] is the physical-query capability set the attribute layer
//! decorates. [`SqlQuery`] implements it on top of an injected [`Grammar`].

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use eavdb_proto::{
    CompiledSql, JoinClause, OrderClause, OrderTarget, SelectColumn, Value, WhereClause,
};

use super::grammar::{BindingMode, Grammar};
use crate::error::Result;

/// Physical query state and serialization.
pub trait BaseQuery: Sized + Send + Sync + Debug {
    /// The base table.
    fn table(&self) -> &str;

    /// A fresh, empty query against `table` sharing this query's grammar.
    fn new_query(&self, table: &str) -> Self;

    /// A fresh query for building a parenthesized where group.
    fn for_nested_where(&self) -> Self {
        self.new_query(self.table())
    }

    fn columns(&self) -> &[SelectColumn];

    fn set_columns(&mut self, columns: Vec<SelectColumn>);

    fn joins(&self) -> &[JoinClause];

    fn add_join(&mut self, join: JoinClause);

    fn wheres(&self) -> &[WhereClause];

    fn add_where(&mut self, clause: WhereClause);

    fn orders(&self, target: OrderTarget) -> &[OrderClause];

    fn add_order(&mut self, target: OrderTarget, order: OrderClause);

    fn has_unions(&self) -> bool;

    fn add_union(&mut self, query: Self, all: bool);

    fn set_limit(&mut self, limit: Option<usize>);

    fn set_offset(&mut self, offset: Option<usize>);

    /// Serialize as a SELECT statement.
    fn compile_select(&self) -> Result<CompiledSql>;

    /// Serialize `rows` as an INSERT into the base table.
    fn compile_insert(
        &self,
        rows: &[BTreeMap<String, Value>],
        mode: BindingMode,
    ) -> Result<Option<CompiledSql>>;
}

/// In-memory SELECT query rendered by a [`Grammar`].
#[derive(Debug, Clone)]
pub struct SqlQuery {
    grammar: Arc<dyn Grammar>,
    table: String,
    columns: Vec<SelectColumn>,
    joins: Vec<JoinClause>,
    wheres: Vec<WhereClause>,
    orders: Vec<OrderClause>,
    union_orders: Vec<OrderClause>,
    unions: Vec<(SqlQuery, bool)>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl SqlQuery {
    /// Create an empty query against a table.
    pub fn new(grammar: Arc<dyn Grammar>, table: impl Into<String>) -> Self {
        Self {
            grammar,
            table: table.into(),
            columns: Vec::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            orders: Vec::new(),
            union_orders: Vec::new(),
            unions: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// The grammar this query renders with.
    pub fn grammar(&self) -> &Arc<dyn Grammar> {
        &self.grammar
    }

    /// Union members with their `all` flag.
    pub fn unions(&self) -> &[(SqlQuery, bool)] {
        &self.unions
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }
}

impl BaseQuery for SqlQuery {
    fn table(&self) -> &str {
        &self.table
    }

    fn new_query(&self, table: &str) -> Self {
        SqlQuery::new(Arc::clone(&self.grammar), table)
    }

    fn columns(&self) -> &[SelectColumn] {
        &self.columns
    }

    fn set_columns(&mut self, columns: Vec<SelectColumn>) {
        self.columns = columns;
    }

    fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    fn add_join(&mut self, join: JoinClause) {
        self.joins.push(join);
    }

    fn wheres(&self) -> &[WhereClause] {
        &self.wheres
    }

    fn add_where(&mut self, clause: WhereClause) {
        self.wheres.push(clause);
    }

    fn orders(&self, target: OrderTarget) -> &[OrderClause] {
        match target {
            OrderTarget::Primary => &self.orders,
            OrderTarget::Union => &self.union_orders,
        }
    }

    fn add_order(&mut self, target: OrderTarget, order: OrderClause) {
        match target {
            OrderTarget::Primary => self.orders.push(order),
            OrderTarget::Union => self.union_orders.push(order),
        }
    }

    fn has_unions(&self) -> bool {
        !self.unions.is_empty()
    }

    fn add_union(&mut self, query: Self, all: bool) {
        self.unions.push((query, all));
    }

    fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    fn set_offset(&mut self, offset: Option<usize>) {
        self.offset = offset;
    }

    fn compile_select(&self) -> Result<CompiledSql> {
        self.grammar.compile_select(self)
    }

    fn compile_insert(
        &self,
        rows: &[BTreeMap<String, Value>],
        mode: BindingMode,
    ) -> Result<Option<CompiledSql>> {
        self.grammar.compile_insert(&self.table, rows, mode)
    }
}
