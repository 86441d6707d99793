//! Attribute query builder.
//!
//! [`AttributeQuery`] decorates a [`BaseQuery`]: physical operations go
//! straight to the base query, attribute operations are buffered and
//! compiled once, lazily, when SQL is requested.
//!
//! ```ignore
//! let mut query = AttributeQuery::for_entity(grammar, products, provider)
//!     .where_attribute("sku", "ABC")?
//!     .where_attribute_group(|q| {
//!         q.where_attribute("color", "red")?
//!             .or_where_attribute("size", "L")
//!     })?;
//! let compiled = query.to_sql()?;
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use eavdb_proto::{
    Boolean, ColumnRef, CompiledSql, DatePart, Operator, OrderClause, OrderDirection,
    OrderTarget, SelectColumn, Value, WhereClause,
};
use tracing::warn;

use super::base::{BaseQuery, SqlQuery};
use super::buffer::{OrderRequest, PredicateRequest, QueryBuffer};
use super::compiler::{AttributeCompiler, StagedAttributes};
use super::grammar::{BindingMode, Grammar};
use super::join::JoinCache;
use crate::catalog::{AttributeProvider, EntityRef};
use crate::config::QueryConfig;
use crate::error::{Error, Result};

/// The entity whose attributes a builder resolves, and where to find them.
#[derive(Clone)]
pub struct EntityContext {
    pub entity: EntityRef,
    pub provider: Arc<dyn AttributeProvider>,
}

impl EntityContext {
    pub fn new(entity: EntityRef, provider: Arc<dyn AttributeProvider>) -> Self {
        Self { entity, provider }
    }
}

impl fmt::Debug for EntityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityContext")
            .field("entity", &self.entity)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of the attribute compilation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    /// Nothing compiled yet.
    #[default]
    Unprocessed,
    /// The pass is running.
    Processing,
    /// The pass succeeded; later calls are no-ops.
    Processed,
    /// The last pass failed; the next call runs it again.
    Failed,
}

/// Query builder over physical columns and EAV attributes.
#[derive(Debug)]
pub struct AttributeQuery<Q: BaseQuery = SqlQuery> {
    base: Q,
    entity: Option<EntityContext>,
    buffer: QueryBuffer<Q>,
    joins: JoinCache,
    state: ProcessState,
    config: Arc<QueryConfig>,
}

impl AttributeQuery<SqlQuery> {
    /// Query an entity's base table.
    pub fn for_entity(
        grammar: Arc<dyn Grammar>,
        entity: EntityRef,
        provider: Arc<dyn AttributeProvider>,
    ) -> Self {
        let base = SqlQuery::new(grammar, entity.table.clone());
        Self::new(base).with_entity(entity, provider)
    }
}

impl<Q: BaseQuery> AttributeQuery<Q> {
    /// Wrap a physical query. Without an entity the builder only passes
    /// physical operations through.
    pub fn new(base: Q) -> Self {
        Self {
            base,
            entity: None,
            buffer: QueryBuffer::new(),
            joins: JoinCache::new(),
            state: ProcessState::Unprocessed,
            config: Arc::new(QueryConfig::default()),
        }
    }

    /// Set the owning entity.
    pub fn with_entity(mut self, entity: EntityRef, provider: Arc<dyn AttributeProvider>) -> Self {
        self.entity = Some(EntityContext::new(entity, provider));
        self
    }

    /// Set the naming configuration.
    pub fn with_config(mut self, config: impl Into<Arc<QueryConfig>>) -> Self {
        self.config = config.into();
        self
    }

    /// A fresh builder on the same table, entity and configuration.
    pub fn new_query(&self) -> Self {
        self.derive(self.base.new_query(self.base.table()))
    }

    fn derive(&self, base: Q) -> Self {
        Self {
            base,
            entity: self.entity.clone(),
            buffer: QueryBuffer::new(),
            joins: JoinCache::new(),
            state: ProcessState::Unprocessed,
            config: Arc::clone(&self.config),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn base(&self) -> &Q {
        &self.base
    }

    pub fn into_base(self) -> Q {
        self.base
    }

    pub fn buffer(&self) -> &QueryBuffer<Q> {
        &self.buffer
    }

    pub fn entity_context(&self) -> Option<&EntityContext> {
        self.entity.as_ref()
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn join_cache(&self) -> &JoinCache {
        &self.joins
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Whether any attribute predicate or ordering was buffered.
    pub fn has_attribute_conditions(&self) -> bool {
        self.buffer.has_attribute_conditions()
    }

    /// Every attribute code referenced so far.
    pub fn referenced_columns(&self) -> &BTreeSet<String> {
        self.buffer.referenced()
    }

    // ------------------------------------------------------------------
    // Attribute predicates
    // ------------------------------------------------------------------

    /// `column = value`.
    pub fn where_attribute(self, column: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        self.push_basic(column.into(), Operator::Eq, value.into(), Boolean::And)
    }

    /// `or column = value`.
    pub fn or_where_attribute(
        self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self> {
        self.push_basic(column.into(), Operator::Eq, value.into(), Boolean::Or)
    }

    /// `column <operator> value`.
    ///
    /// Text that is not a comparison operator is taken as the value and
    /// compared with `=`; the `value` argument is then ignored.
    pub fn where_attribute_op(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        let (operator, value) = resolve_operator(operator, value.into());
        self.push_basic(column.into(), operator, value, Boolean::And)
    }

    /// `or column <operator> value`.
    pub fn or_where_attribute_op(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        let (operator, value) = resolve_operator(operator, value.into());
        self.push_basic(column.into(), operator, value, Boolean::Or)
    }

    fn push_basic(
        mut self,
        column: String,
        operator: Operator,
        value: Value,
        boolean: Boolean,
    ) -> Result<Self> {
        validate_basic(operator, &value)?;
        self.buffer_predicate(PredicateRequest::Basic {
            column,
            operator,
            value,
            boolean,
        });
        Ok(self)
    }

    pub fn where_between_attribute<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: [V; 2],
    ) -> Self {
        self.push_between(column.into(), values, Boolean::And, false)
    }

    pub fn or_where_between_attribute<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: [V; 2],
    ) -> Self {
        self.push_between(column.into(), values, Boolean::Or, false)
    }

    pub fn where_not_between_attribute<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: [V; 2],
    ) -> Self {
        self.push_between(column.into(), values, Boolean::And, true)
    }

    pub fn or_where_not_between_attribute<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: [V; 2],
    ) -> Self {
        self.push_between(column.into(), values, Boolean::Or, true)
    }

    fn push_between<V: Into<Value>>(
        mut self,
        column: String,
        values: [V; 2],
        boolean: Boolean,
        not: bool,
    ) -> Self {
        let [low, high] = values;
        self.buffer_predicate(PredicateRequest::Between {
            column,
            low: low.into(),
            high: high.into(),
            boolean,
            not,
        });
        self
    }

    pub fn where_in_attribute<I>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.push_in(column.into(), values, Boolean::And, false)
    }

    pub fn or_where_in_attribute<I>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.push_in(column.into(), values, Boolean::Or, false)
    }

    pub fn where_not_in_attribute<I>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.push_in(column.into(), values, Boolean::And, true)
    }

    pub fn or_where_not_in_attribute<I>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.push_in(column.into(), values, Boolean::Or, true)
    }

    fn push_in<I>(mut self, column: String, values: I, boolean: Boolean, not: bool) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.buffer_predicate(PredicateRequest::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
            boolean,
            not,
        });
        self
    }

    pub fn where_null_attribute(self, column: impl Into<String>) -> Self {
        self.push_null(column.into(), Boolean::And, false)
    }

    pub fn or_where_null_attribute(self, column: impl Into<String>) -> Self {
        self.push_null(column.into(), Boolean::Or, false)
    }

    pub fn where_not_null_attribute(self, column: impl Into<String>) -> Self {
        self.push_null(column.into(), Boolean::And, true)
    }

    pub fn or_where_not_null_attribute(self, column: impl Into<String>) -> Self {
        self.push_null(column.into(), Boolean::Or, true)
    }

    fn push_null(mut self, column: String, boolean: Boolean, not: bool) -> Self {
        self.buffer_predicate(PredicateRequest::Null {
            column,
            boolean,
            not,
        });
        self
    }

    pub fn where_date_attribute(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        self.where_date_part_attribute(DatePart::Date, column, operator, value, Boolean::And)
    }

    pub fn where_day_attribute(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        self.where_date_part_attribute(DatePart::Day, column, operator, value, Boolean::And)
    }

    pub fn where_month_attribute(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        self.where_date_part_attribute(DatePart::Month, column, operator, value, Boolean::And)
    }

    pub fn where_year_attribute(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        self.where_date_part_attribute(DatePart::Year, column, operator, value, Boolean::And)
    }

    /// `part(column) <operator> value`. The operator must be recognized.
    pub fn where_date_part_attribute(
        mut self,
        part: DatePart,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
        boolean: Boolean,
    ) -> Result<Self> {
        let operator = Operator::parse(operator).ok_or_else(|| {
            Error::InvalidPredicate(format!("unknown date comparison operator '{}'", operator))
        })?;
        let value = value.into();
        if !value.is_scalar() || value.is_null() {
            return Err(Error::InvalidPredicate(
                "date predicates compare against a scalar value".to_string(),
            ));
        }
        self.buffer_predicate(PredicateRequest::DatePart {
            part,
            column: column.into(),
            operator,
            value,
            boolean,
        });
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Nested groups
    // ------------------------------------------------------------------

    /// Build a parenthesized group with a child builder.
    ///
    /// The child shares this builder's entity and configuration. It is
    /// folded in as an attribute group only if it buffered attribute
    /// requests; a child with only physical wheres becomes a plain
    /// physical group.
    pub fn where_nested_attribute<F>(self, callback: F, boolean: Boolean) -> Result<Self>
    where
        F: FnOnce(Self) -> Result<Self>,
    {
        let child = callback(self.derive(self.base.for_nested_where()))?;
        Ok(self.add_nested_where_attribute(child, boolean))
    }

    /// `and ( ... )`
    pub fn where_attribute_group<F>(self, callback: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Result<Self>,
    {
        self.where_nested_attribute(callback, Boolean::And)
    }

    /// `or ( ... )`
    pub fn or_where_attribute_group<F>(self, callback: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Result<Self>,
    {
        self.where_nested_attribute(callback, Boolean::Or)
    }

    /// Fold an already built child into this builder.
    pub fn add_nested_where_attribute(mut self, child: Self, boolean: Boolean) -> Self {
        if child.has_attribute_conditions() {
            let columns = child.buffer.referenced().clone();
            self.buffer_predicate(PredicateRequest::Nested {
                columns,
                query: Box::new(child),
                boolean,
            });
        } else if !child.base.wheres().is_empty() {
            self.base.add_where(WhereClause::Nested {
                clauses: child.base.wheres().to_vec(),
                boolean,
            });
        }
        self
    }

    // ------------------------------------------------------------------
    // Attribute ordering
    // ------------------------------------------------------------------

    /// Order by an attribute. Goes to the union order list when the query
    /// already has unions.
    pub fn order_by_attribute(
        mut self,
        column: impl Into<String>,
        direction: impl Into<OrderDirection>,
    ) -> Self {
        let target = self.order_target();
        self.buffer_order(OrderRequest {
            column: column.into(),
            direction: direction.into(),
            target,
        });
        self
    }

    pub fn latest_attribute(self, column: impl Into<String>) -> Self {
        self.order_by_attribute(column, OrderDirection::Desc)
    }

    pub fn oldest_attribute(self, column: impl Into<String>) -> Self {
        self.order_by_attribute(column, OrderDirection::Asc)
    }

    // ------------------------------------------------------------------
    // Physical operations
    // ------------------------------------------------------------------

    /// Set the projection. The configured attribute wildcard selects every
    /// attribute of the entity.
    ///
    /// On a builder with an entity, a bare unaliased name is an attribute
    /// code. Plain base-table columns must be qualified (`products.name`)
    /// or aliased, otherwise compilation fails with
    /// [`Error::UnknownAttribute`].
    pub fn select<I, S>(mut self, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for column in columns {
            let column = column.as_ref().trim();
            if column == self.config.attribute_wildcard {
                parsed.push(SelectColumn::AttributeWildcard);
            } else {
                parsed.push(SelectColumn::parse(column)?);
            }
        }
        self.base.set_columns(parsed);
        Ok(self)
    }

    /// Project the given attribute codes.
    pub fn select_attributes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = codes
            .into_iter()
            .map(|code| SelectColumn::column(ColumnRef::new(code)))
            .collect();
        self.base.set_columns(columns);
        self
    }

    pub fn where_column(self, column: &str, operator: &str, value: impl Into<Value>) -> Result<Self> {
        self.push_where_column(column, operator, value.into(), Boolean::And)
    }

    pub fn or_where_column(
        self,
        column: &str,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self> {
        self.push_where_column(column, operator, value.into(), Boolean::Or)
    }

    fn push_where_column(
        mut self,
        column: &str,
        operator: &str,
        value: Value,
        boolean: Boolean,
    ) -> Result<Self> {
        let operator: Operator = operator.parse()?;
        self.base.add_where(WhereClause::Basic {
            column: ColumnRef::parse(column)?,
            operator,
            value,
            boolean,
        });
        Ok(self)
    }

    pub fn where_in<I>(mut self, column: &str, values: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.base.add_where(WhereClause::In {
            column: ColumnRef::parse(column)?,
            values: values.into_iter().map(Into::into).collect(),
            boolean: Boolean::And,
            not: false,
        });
        Ok(self)
    }

    pub fn where_null(mut self, column: &str) -> Result<Self> {
        self.base.add_where(WhereClause::Null {
            column: ColumnRef::parse(column)?,
            boolean: Boolean::And,
            not: false,
        });
        Ok(self)
    }

    pub fn order_by(mut self, column: &str, direction: impl Into<OrderDirection>) -> Result<Self> {
        let target = self.order_target();
        self.base.add_order(
            target,
            OrderClause {
                column: ColumnRef::parse(column)?,
                direction: direction.into(),
            },
        );
        Ok(self)
    }

    /// Order by the configured timestamp column, newest first.
    pub fn latest(self) -> Result<Self> {
        self.order_by_timestamp(OrderDirection::Desc)
    }

    /// Order by the configured timestamp column, oldest first.
    pub fn oldest(self) -> Result<Self> {
        self.order_by_timestamp(OrderDirection::Asc)
    }

    /// Primary orderings name the base table so they stay unambiguous once
    /// value tables are joined. Union orderings apply to the combined result.
    fn order_by_timestamp(mut self, direction: OrderDirection) -> Result<Self> {
        let target = self.order_target();
        let mut column = ColumnRef::parse(&self.config.default_timestamp_column)?;
        if target == OrderTarget::Primary && column.table.is_none() {
            column.table = Some(self.base.table().to_string());
        }
        self.base
            .add_order(target, OrderClause { column, direction });
        Ok(self)
    }

    fn order_target(&self) -> OrderTarget {
        if self.base.has_unions() {
            OrderTarget::Union
        } else {
            OrderTarget::Primary
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.base.set_limit(Some(limit));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.base.set_offset(Some(offset));
        self
    }

    /// Append `union (other)`. The other builder's attributes are compiled
    /// now.
    pub fn union(self, other: Self) -> Result<Self> {
        self.push_union(other, false)
    }

    /// Append `union all (other)`.
    pub fn union_all(self, other: Self) -> Result<Self> {
        self.push_union(other, true)
    }

    fn push_union(mut self, mut other: Self, all: bool) -> Result<Self> {
        other.process_attributes()?;
        self.base.add_union(other.base, all);
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Compilation
    // ------------------------------------------------------------------

    /// Run the attribute pass if it has not succeeded yet.
    ///
    /// On failure nothing is applied to the base query and the state becomes
    /// [`ProcessState::Failed`], so the next call fails the same way.
    pub fn process_attributes(&mut self) -> Result<()> {
        if self.state == ProcessState::Processed {
            return Ok(());
        }

        self.state = ProcessState::Processing;
        match AttributeCompiler::compile(self) {
            Ok(staged) => {
                if let Some(staged) = staged {
                    self.commit(staged);
                }
                self.state = ProcessState::Processed;
                Ok(())
            }
            Err(err) => {
                warn!(table = %self.base.table(), error = %err, "attribute pass failed");
                self.state = ProcessState::Failed;
                Err(err)
            }
        }
    }

    fn commit(&mut self, staged: StagedAttributes) {
        if let Some(columns) = staged.columns {
            self.base.set_columns(columns);
        }
        for join in staged.joins {
            self.base.add_join(join);
        }
        for clause in staged.wheres {
            self.base.add_where(clause);
        }
        for (target, order) in staged.orders {
            self.base.add_order(target, order);
        }
        self.joins = staged.cache;
    }

    /// Compile attributes, then serialize the SELECT.
    pub fn to_sql(&mut self) -> Result<CompiledSql> {
        self.process_attributes()?;
        self.base.compile_select()
    }

    /// Render a batch INSERT into the base table with values written inline.
    ///
    /// Not parameterized. Never pass untrusted input. Returns `None` when
    /// `rows` is empty.
    pub fn insert_sql_inline(&self, rows: &[BTreeMap<String, Value>]) -> Result<Option<String>> {
        Ok(self
            .base
            .compile_insert(rows, BindingMode::Inline)?
            .map(|compiled| compiled.sql))
    }

    fn buffer_predicate(&mut self, request: PredicateRequest<Q>) {
        if self.state == ProcessState::Processed {
            warn!(table = %self.base.table(), "attribute predicate added after compilation is ignored");
        }
        self.buffer.push_predicate(request);
    }

    fn buffer_order(&mut self, request: OrderRequest) {
        if self.state == ProcessState::Processed {
            warn!(table = %self.base.table(), "attribute ordering added after compilation is ignored");
        }
        self.buffer.push_order(request);
    }
}

/// Fall back to `= operator` when the operator text is not recognized.
fn resolve_operator(operator: &str, value: Value) -> (Operator, Value) {
    match Operator::parse(operator) {
        Some(op) => (op, value),
        None => (Operator::Eq, Value::from(operator)),
    }
}

fn validate_basic(operator: Operator, value: &Value) -> Result<()> {
    if value.is_null() && !operator.is_null_equality() {
        return Err(Error::InvalidPredicate(format!(
            "operator '{}' cannot compare against null",
            operator
        )));
    }
    if !value.is_scalar() && operator.is_null_equality() {
        return Err(Error::InvalidPredicate(format!(
            "operator '{}' requires a scalar value",
            operator
        )));
    }
    Ok(())
}
