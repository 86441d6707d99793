//! Attribute request buffer.
//!
//! Attribute predicates and orders are recorded here, in call order, and
//! only turned into joins and physical clauses when the query is compiled.

use std::collections::BTreeSet;

use eavdb_proto::{Boolean, DatePart, Operator, OrderDirection, OrderTarget, Value};

use super::base::BaseQuery;
use super::builder::AttributeQuery;

/// One buffered attribute predicate.
#[derive(Debug)]
pub enum PredicateRequest<Q: BaseQuery> {
    Basic {
        column: String,
        operator: Operator,
        value: Value,
        boolean: Boolean,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        boolean: Boolean,
        not: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
        boolean: Boolean,
        not: bool,
    },
    Null {
        column: String,
        boolean: Boolean,
        not: bool,
    },
    DatePart {
        part: DatePart,
        column: String,
        operator: Operator,
        value: Value,
        boolean: Boolean,
    },
    /// A parenthesized group built by a child builder.
    Nested {
        columns: BTreeSet<String>,
        query: Box<AttributeQuery<Q>>,
        boolean: Boolean,
    },
}

impl<Q: BaseQuery> PredicateRequest<Q> {
    pub fn boolean(&self) -> Boolean {
        match self {
            PredicateRequest::Basic { boolean, .. }
            | PredicateRequest::Between { boolean, .. }
            | PredicateRequest::In { boolean, .. }
            | PredicateRequest::Null { boolean, .. }
            | PredicateRequest::DatePart { boolean, .. }
            | PredicateRequest::Nested { boolean, .. } => *boolean,
        }
    }

    /// The attribute code filtered on, `None` for nested groups.
    pub fn column(&self) -> Option<&str> {
        match self {
            PredicateRequest::Basic { column, .. }
            | PredicateRequest::Between { column, .. }
            | PredicateRequest::In { column, .. }
            | PredicateRequest::Null { column, .. }
            | PredicateRequest::DatePart { column, .. } => Some(column),
            PredicateRequest::Nested { .. } => None,
        }
    }

    /// Whether the predicate can only hold when the attribute has a value.
    ///
    /// `is null` and null equality also match rows lacking the attribute.
    pub fn requires_value(&self) -> bool {
        match self {
            PredicateRequest::Null { not, .. } => *not,
            PredicateRequest::Basic {
                operator, value, ..
            } => !(value.is_null() && matches!(operator, Operator::Eq | Operator::NullSafeEq)),
            _ => true,
        }
    }
}

/// One buffered attribute ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub column: String,
    pub direction: OrderDirection,
    pub target: OrderTarget,
}

/// Per-builder attribute request state.
#[derive(Debug)]
pub struct QueryBuffer<Q: BaseQuery> {
    has_attribute_conditions: bool,
    referenced: BTreeSet<String>,
    predicates: Vec<PredicateRequest<Q>>,
    orders: Vec<OrderRequest>,
}

impl<Q: BaseQuery> Default for QueryBuffer<Q> {
    fn default() -> Self {
        Self {
            has_attribute_conditions: false,
            referenced: BTreeSet::new(),
            predicates: Vec::new(),
            orders: Vec::new(),
        }
    }
}

impl<Q: BaseQuery> QueryBuffer<Q> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a predicate and the columns it references.
    pub fn push_predicate(&mut self, request: PredicateRequest<Q>) {
        self.has_attribute_conditions = true;
        match &request {
            PredicateRequest::Nested { columns, .. } => {
                self.referenced.extend(columns.iter().cloned());
            }
            other => {
                if let Some(column) = other.column() {
                    self.referenced.insert(column.to_string());
                }
            }
        }
        self.predicates.push(request);
    }

    /// Record an ordering.
    pub fn push_order(&mut self, request: OrderRequest) {
        self.has_attribute_conditions = true;
        self.referenced.insert(request.column.clone());
        self.orders.push(request);
    }

    pub fn has_attribute_conditions(&self) -> bool {
        self.has_attribute_conditions
    }

    /// Every attribute code referenced by a predicate or ordering, nested
    /// groups included.
    pub fn referenced(&self) -> &BTreeSet<String> {
        &self.referenced
    }

    pub fn predicates(&self) -> &[PredicateRequest<Q>] {
        &self.predicates
    }

    pub fn orders(&self) -> &[OrderRequest] {
        &self.orders
    }
}
