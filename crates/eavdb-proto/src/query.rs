//! Physical query IR: columns, predicates, joins and orderings.
//!
//! These types describe a relational SELECT in a dialect-neutral way. The
//! attribute compiler produces them and the SQL grammar renders them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::value::Value;

/// Comparison operators accepted by basic and date-part predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `<>`
    Ne,
    /// `!=`
    BangNe,
    /// `<=>` (null-safe equality).
    NullSafeEq,
    /// `like`
    Like,
    /// `not like`
    NotLike,
    /// `ilike`
    ILike,
    /// `not ilike`
    NotILike,
    /// `rlike`
    RLike,
    /// `regexp`
    Regexp,
    /// `not regexp`
    NotRegexp,
    /// `similar to`
    SimilarTo,
    /// `not similar to`
    NotSimilarTo,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
}

impl Operator {
    /// Every recognized operator, in vocabulary order.
    pub const ALL: [Operator; 22] = [
        Operator::Eq,
        Operator::Lt,
        Operator::Gt,
        Operator::Le,
        Operator::Ge,
        Operator::Ne,
        Operator::BangNe,
        Operator::NullSafeEq,
        Operator::Like,
        Operator::NotLike,
        Operator::ILike,
        Operator::NotILike,
        Operator::RLike,
        Operator::Regexp,
        Operator::NotRegexp,
        Operator::SimilarTo,
        Operator::NotSimilarTo,
        Operator::BitAnd,
        Operator::BitOr,
        Operator::BitXor,
        Operator::ShiftLeft,
        Operator::ShiftRight,
    ];

    /// Parse operator text, case-insensitively. Returns `None` for text that
    /// is not a comparison operator.
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|op| op.as_sql() == lowered)
    }

    /// The SQL spelling of this operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Ne => "<>",
            Operator::BangNe => "!=",
            Operator::NullSafeEq => "<=>",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::ILike => "ilike",
            Operator::NotILike => "not ilike",
            Operator::RLike => "rlike",
            Operator::Regexp => "regexp",
            Operator::NotRegexp => "not regexp",
            Operator::SimilarTo => "similar to",
            Operator::NotSimilarTo => "not similar to",
            Operator::BitAnd => "&",
            Operator::BitOr => "|",
            Operator::BitXor => "^",
            Operator::ShiftLeft => "<<",
            Operator::ShiftRight => ">>",
        }
    }

    /// Equality-family operators that may legally compare against NULL.
    pub fn is_null_equality(&self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Ne | Operator::BangNe | Operator::NullSafeEq
        )
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::parse(s).ok_or_else(|| Error::UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Boolean combinator joining a predicate to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Boolean {
    /// `and`
    #[default]
    And,
    /// `or`
    Or,
}

impl Boolean {
    /// The SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Boolean::And => "and",
            Boolean::Or => "or",
        }
    }
}

/// A possibly table-qualified column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Table name or alias, if qualified.
    pub table: Option<String>,
    /// Column name.
    pub name: String,
}

impl ColumnRef {
    /// An unqualified column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    /// A column qualified by a table name or alias.
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    /// Parse `column` or `table.column`.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let text = text.trim();
        match text.split_once('.') {
            Some((table, name)) if !table.is_empty() && !name.is_empty() => {
                Ok(Self::qualified(table, name))
            }
            None if !text.is_empty() => Ok(Self::new(text)),
            _ => Err(Error::InvalidColumn(text.to_string())),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// One entry of a SELECT list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectColumn {
    /// `*`
    All,
    /// `table.*`
    TableAll(String),
    /// A column, optionally aliased.
    Column {
        /// The referenced column.
        column: ColumnRef,
        /// Output alias.
        alias: Option<String>,
    },
    /// Marker requesting every attribute of the owning entity. Must be
    /// resolved before the query reaches a grammar.
    AttributeWildcard,
}

impl SelectColumn {
    /// A plain column.
    pub fn column(column: ColumnRef) -> Self {
        SelectColumn::Column {
            column,
            alias: None,
        }
    }

    /// An aliased column.
    pub fn aliased(column: ColumnRef, alias: impl Into<String>) -> Self {
        SelectColumn::Column {
            column,
            alias: Some(alias.into()),
        }
    }

    /// Parse `*`, `table.*`, `column`, `table.column` or `<column> as <alias>`.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let text = text.trim();
        if text == "*" {
            return Ok(SelectColumn::All);
        }
        if let Some(table) = text.strip_suffix(".*") {
            if table.is_empty() {
                return Err(Error::InvalidColumn(text.to_string()));
            }
            return Ok(SelectColumn::TableAll(table.to_string()));
        }
        let lowered = text.to_ascii_lowercase();
        if let Some(pos) = lowered.find(" as ") {
            let column = ColumnRef::parse(&text[..pos])?;
            let alias = text[pos + 4..].trim();
            if alias.is_empty() {
                return Err(Error::InvalidColumn(text.to_string()));
            }
            return Ok(SelectColumn::aliased(column, alias));
        }
        Ok(SelectColumn::column(ColumnRef::parse(text)?))
    }
}

/// Date component extracted by a date-part predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatePart {
    /// Calendar date.
    Date,
    /// Day of month.
    Day,
    /// Month of year.
    Month,
    /// Year.
    Year,
}

/// A physical where-clause node.
///
/// Nested groups make this type recursive, so it is serialized with serde
/// rather than a zero-copy format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhereClause {
    /// `column <op> value`
    Basic {
        column: ColumnRef,
        operator: Operator,
        value: Value,
        boolean: Boolean,
    },
    /// `column [not] between low and high`
    Between {
        column: ColumnRef,
        low: Value,
        high: Value,
        boolean: Boolean,
        not: bool,
    },
    /// `column [not] in (values)`
    In {
        column: ColumnRef,
        values: Vec<Value>,
        boolean: Boolean,
        not: bool,
    },
    /// `column is [not] null`
    Null {
        column: ColumnRef,
        boolean: Boolean,
        not: bool,
    },
    /// `part(column) <op> value`
    Date {
        part: DatePart,
        column: ColumnRef,
        operator: Operator,
        value: Value,
        boolean: Boolean,
    },
    /// A parenthesized group.
    Nested {
        clauses: Vec<WhereClause>,
        boolean: Boolean,
    },
}

impl WhereClause {
    /// Create an `and`-combined basic comparison.
    pub fn basic(column: ColumnRef, operator: Operator, value: impl Into<Value>) -> Self {
        WhereClause::Basic {
            column,
            operator,
            value: value.into(),
            boolean: Boolean::And,
        }
    }

    /// The combinator joining this clause to its predecessor.
    pub fn boolean(&self) -> Boolean {
        match self {
            WhereClause::Basic { boolean, .. }
            | WhereClause::Between { boolean, .. }
            | WhereClause::In { boolean, .. }
            | WhereClause::Null { boolean, .. }
            | WhereClause::Date { boolean, .. }
            | WhereClause::Nested { boolean, .. } => *boolean,
        }
    }

    /// The column this clause filters on, `None` for nested groups.
    pub fn column(&self) -> Option<&ColumnRef> {
        match self {
            WhereClause::Basic { column, .. }
            | WhereClause::Between { column, .. }
            | WhereClause::In { column, .. }
            | WhereClause::Null { column, .. }
            | WhereClause::Date { column, .. } => Some(column),
            WhereClause::Nested { .. } => None,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl OrderDirection {
    /// The SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

/// Lenient direction parsing: anything but `asc` sorts descending.
impl From<&str> for OrderDirection {
    fn from(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("asc") {
            OrderDirection::Asc
        } else {
            OrderDirection::Desc
        }
    }
}

/// Which order list an ordering belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderTarget {
    /// The query's own ORDER BY.
    Primary,
    /// The ORDER BY applied to a union of queries.
    Union,
}

/// Order specification for sorting results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderClause {
    /// Column to order by.
    pub column: ColumnRef,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderClause {
    /// Create an ascending order clause.
    pub fn asc(column: ColumnRef) -> Self {
        Self {
            column,
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order clause.
    pub fn desc(column: ColumnRef) -> Self {
        Self {
            column,
            direction: OrderDirection::Desc,
        }
    }
}

/// Join kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    /// Row dropped when no match exists.
    Inner,
    /// Row kept with nulls when no match exists.
    Left,
}

impl JoinKind {
    /// Combine two requested kinds: `Inner` wins.
    pub fn merge(self, other: JoinKind) -> JoinKind {
        if self == JoinKind::Inner || other == JoinKind::Inner {
            JoinKind::Inner
        } else {
            JoinKind::Left
        }
    }

    /// The SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
        }
    }
}

/// One `on` condition of a join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JoinCondition {
    /// `left = right` between two columns.
    Columns { left: ColumnRef, right: ColumnRef },
    /// `column = value` against a bound value.
    Value { column: ColumnRef, value: Value },
}

/// A join against another table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinClause {
    /// Join kind.
    pub kind: JoinKind,
    /// Joined table.
    pub table: String,
    /// Alias for the joined table.
    pub alias: Option<String>,
    /// Conditions, combined with `and`.
    pub conditions: Vec<JoinCondition>,
}

impl JoinClause {
    /// Create a join with no conditions.
    pub fn new(kind: JoinKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            alias: None,
            conditions: vec![],
        }
    }

    /// Set the table alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add a column-to-column condition.
    pub fn on(mut self, left: ColumnRef, right: ColumnRef) -> Self {
        self.conditions.push(JoinCondition::Columns { left, right });
        self
    }

    /// Add a column-to-value condition.
    pub fn on_value(mut self, column: ColumnRef, value: impl Into<Value>) -> Self {
        self.conditions.push(JoinCondition::Value {
            column,
            value: value.into(),
        });
        self
    }

    /// The name the joined table is referenced by.
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

/// SQL text plus its positional bindings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompiledSql {
    /// Statement text.
    pub sql: String,
    /// Bound values, in placeholder order.
    pub bindings: Vec<Value>,
}
