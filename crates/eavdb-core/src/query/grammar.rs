//! SQL grammar.
//!
//! Renders a [`SqlQuery`] into dialect-specific SQL text plus positional
//! bindings. Bindings follow text order: joins, wheres, then union members.

use std::collections::BTreeMap;
use std::fmt::Debug;

use eavdb_proto::{
    ColumnRef, CompiledSql, DatePart, JoinClause, JoinCondition, Operator, OrderClause,
    OrderTarget, SelectColumn, Value, WhereClause,
};
use serde::{Deserialize, Serialize};

use super::base::{BaseQuery, SqlQuery};
use super::insert::inline_literal;
use crate::error::{Error, Result};

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dialect {
    /// Backtick quoting, `?` placeholders.
    #[default]
    MySql,
    /// Double-quote quoting, `$n` placeholders.
    Postgres,
    /// Double-quote quoting, `?` placeholders.
    Sqlite,
}

/// How values reach the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingMode {
    /// Positional placeholders with a separate binding list.
    #[default]
    Placeholder,
    /// Values written into the SQL text. Not safe for untrusted input.
    Inline,
}

/// Turns an abstract query into SQL.
pub trait Grammar: Send + Sync + Debug {
    /// The dialect this grammar renders.
    fn dialect(&self) -> Dialect;

    /// Compile a SELECT statement.
    fn compile_select(&self, query: &SqlQuery) -> Result<CompiledSql>;

    /// Compile a multi-row INSERT. Returns `None` when there are no rows.
    fn compile_insert(
        &self,
        table: &str,
        rows: &[BTreeMap<String, Value>],
        mode: BindingMode,
    ) -> Result<Option<CompiledSql>>;
}

/// Quote an identifier for a dialect.
pub fn quote_identifier(name: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::MySql => format!("`{}`", name.replace('`', "``")),
        Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

/// Accumulates SQL text and bindings for one statement.
struct SqlWriter {
    dialect: Dialect,
    mode: BindingMode,
    sql: String,
    bindings: Vec<Value>,
}

impl SqlWriter {
    fn new(dialect: Dialect, mode: BindingMode) -> Self {
        Self {
            dialect,
            mode,
            sql: String::new(),
            bindings: Vec::new(),
        }
    }

    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    fn ident(&mut self, name: &str) {
        let quoted = quote_identifier(name, self.dialect);
        self.sql.push_str(&quoted);
    }

    fn column(&mut self, column: &ColumnRef) {
        if let Some(table) = &column.table {
            self.ident(table);
            self.sql.push('.');
        }
        self.ident(&column.name);
    }

    fn param(&mut self, value: &Value) -> Result<()> {
        if matches!(value, Value::List(_)) {
            return Err(Error::Grammar(
                "list value bound as a scalar parameter".to_string(),
            ));
        }
        match self.mode {
            BindingMode::Inline => {
                let literal = inline_literal(value, self.dialect)?;
                self.sql.push_str(&literal);
            }
            BindingMode::Placeholder => {
                self.bindings.push(value.clone());
                match self.dialect {
                    Dialect::Postgres => {
                        self.sql.push_str(&format!("${}", self.bindings.len()));
                    }
                    Dialect::MySql | Dialect::Sqlite => self.sql.push('?'),
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> CompiledSql {
        CompiledSql {
            sql: self.sql,
            bindings: self.bindings,
        }
    }
}

/// Standard SQL grammar parameterized by dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlGrammar {
    dialect: Dialect,
}

impl SqlGrammar {
    /// Create a grammar for a dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn mysql() -> Self {
        Self::new(Dialect::MySql)
    }

    pub fn postgres() -> Self {
        Self::new(Dialect::Postgres)
    }

    pub fn sqlite() -> Self {
        Self::new(Dialect::Sqlite)
    }

    fn write_query(&self, w: &mut SqlWriter, query: &SqlQuery) -> Result<()> {
        if query.unions().is_empty() {
            return self.write_select(w, query);
        }

        w.push("(");
        self.write_select(w, query)?;
        w.push(")");
        for (member, all) in query.unions() {
            w.push(if *all { " union all (" } else { " union (" });
            self.write_query(w, member)?;
            w.push(")");
        }
        self.write_orders(w, query.orders(OrderTarget::Union));
        Ok(())
    }

    fn write_select(&self, w: &mut SqlWriter, query: &SqlQuery) -> Result<()> {
        w.push("select ");
        self.write_columns(w, query.columns())?;
        w.push(" from ");
        w.ident(query.table());

        for join in query.joins() {
            w.push(" ");
            self.write_join(w, join)?;
        }

        if has_renderable(query.wheres()) {
            w.push(" where ");
            self.write_wheres(w, query.wheres())?;
        }

        self.write_orders(w, query.orders(OrderTarget::Primary));

        if let Some(limit) = query.limit() {
            w.push(&format!(" limit {}", limit));
        }
        if let Some(offset) = query.offset() {
            w.push(&format!(" offset {}", offset));
        }
        Ok(())
    }

    fn write_columns(&self, w: &mut SqlWriter, columns: &[SelectColumn]) -> Result<()> {
        if columns.is_empty() {
            w.push("*");
            return Ok(());
        }

        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            match column {
                SelectColumn::All => w.push("*"),
                SelectColumn::TableAll(table) => {
                    w.ident(table);
                    w.push(".*");
                }
                SelectColumn::Column { column, alias } => {
                    w.column(column);
                    if let Some(alias) = alias {
                        w.push(" as ");
                        w.ident(alias);
                    }
                }
                SelectColumn::AttributeWildcard => {
                    return Err(Error::Grammar(
                        "attribute wildcard must be resolved before compilation".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    fn write_join(&self, w: &mut SqlWriter, join: &JoinClause) -> Result<()> {
        w.push(join.kind.as_sql());
        w.push(" join ");
        w.ident(&join.table);
        if let Some(alias) = &join.alias {
            w.push(" as ");
            w.ident(alias);
        }

        for (i, condition) in join.conditions.iter().enumerate() {
            w.push(if i == 0 { " on " } else { " and " });
            match condition {
                JoinCondition::Columns { left, right } => {
                    w.column(left);
                    w.push(" = ");
                    w.column(right);
                }
                JoinCondition::Value { column, value } => {
                    w.column(column);
                    w.push(" = ");
                    w.param(value)?;
                }
            }
        }
        Ok(())
    }

    fn write_wheres(&self, w: &mut SqlWriter, clauses: &[WhereClause]) -> Result<()> {
        let mut first = true;
        for clause in clauses.iter().filter(|c| !is_empty_group(c)) {
            if !first {
                w.push(" ");
                w.push(clause.boolean().as_sql());
                w.push(" ");
            }
            first = false;
            self.write_where(w, clause)?;
        }
        Ok(())
    }

    fn write_where(&self, w: &mut SqlWriter, clause: &WhereClause) -> Result<()> {
        match clause {
            WhereClause::Basic {
                column,
                operator,
                value,
                ..
            } => self.write_basic(w, column, *operator, value),
            WhereClause::Between {
                column,
                low,
                high,
                not,
                ..
            } => {
                w.column(column);
                w.push(if *not { " not between " } else { " between " });
                w.param(low)?;
                w.push(" and ");
                w.param(high)
            }
            WhereClause::In {
                column,
                values,
                not,
                ..
            } => {
                if values.is_empty() {
                    w.push(if *not { "1 = 1" } else { "0 = 1" });
                    return Ok(());
                }
                w.column(column);
                w.push(if *not { " not in (" } else { " in (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        w.push(", ");
                    }
                    w.param(value)?;
                }
                w.push(")");
                Ok(())
            }
            WhereClause::Null { column, not, .. } => {
                w.column(column);
                w.push(if *not { " is not null" } else { " is null" });
                Ok(())
            }
            WhereClause::Date {
                part,
                column,
                operator,
                value,
                ..
            } => self.write_date_part(w, *part, column, *operator, value),
            WhereClause::Nested { clauses, .. } => {
                w.push("(");
                self.write_wheres(w, clauses)?;
                w.push(")");
                Ok(())
            }
        }
    }

    fn write_basic(
        &self,
        w: &mut SqlWriter,
        column: &ColumnRef,
        operator: Operator,
        value: &Value,
    ) -> Result<()> {
        w.column(column);
        match (operator, value) {
            (Operator::Eq, Value::Null) => {
                w.push(" is null");
                return Ok(());
            }
            (Operator::Ne | Operator::BangNe, Value::Null) => {
                w.push(" is not null");
                return Ok(());
            }
            (Operator::NullSafeEq, _) => w.push(match self.dialect {
                Dialect::MySql => " <=> ",
                Dialect::Postgres => " is not distinct from ",
                Dialect::Sqlite => " is ",
            }),
            _ => {
                w.push(" ");
                w.push(operator.as_sql());
                w.push(" ");
            }
        }
        w.param(value)
    }

    fn write_date_part(
        &self,
        w: &mut SqlWriter,
        part: DatePart,
        column: &ColumnRef,
        operator: Operator,
        value: &Value,
    ) -> Result<()> {
        match self.dialect {
            Dialect::MySql => {
                w.push(match part {
                    DatePart::Date => "date(",
                    DatePart::Day => "day(",
                    DatePart::Month => "month(",
                    DatePart::Year => "year(",
                });
                w.column(column);
                w.push(")");
            }
            Dialect::Postgres => match part {
                DatePart::Date => {
                    w.column(column);
                    w.push("::date");
                }
                DatePart::Day | DatePart::Month | DatePart::Year => {
                    w.push(match part {
                        DatePart::Day => "extract(day from ",
                        DatePart::Month => "extract(month from ",
                        _ => "extract(year from ",
                    });
                    w.column(column);
                    w.push(")");
                }
            },
            Dialect::Sqlite => {
                w.push(match part {
                    DatePart::Date => "strftime('%Y-%m-%d', ",
                    DatePart::Day => "strftime('%d', ",
                    DatePart::Month => "strftime('%m', ",
                    DatePart::Year => "strftime('%Y', ",
                });
                w.column(column);
                w.push(")");
            }
        }

        w.push(" ");
        w.push(operator.as_sql());
        w.push(" ");

        if self.dialect == Dialect::Sqlite {
            w.push("cast(");
            w.param(value)?;
            w.push(" as text)");
            Ok(())
        } else {
            w.param(value)
        }
    }

    fn write_orders(&self, w: &mut SqlWriter, orders: &[OrderClause]) {
        for (i, order) in orders.iter().enumerate() {
            w.push(if i == 0 { " order by " } else { ", " });
            w.column(&order.column);
            w.push(" ");
            w.push(order.direction.as_sql());
        }
    }
}

impl Grammar for SqlGrammar {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn compile_select(&self, query: &SqlQuery) -> Result<CompiledSql> {
        let mut w = SqlWriter::new(self.dialect, BindingMode::Placeholder);
        self.write_query(&mut w, query)?;
        Ok(w.finish())
    }

    fn compile_insert(
        &self,
        table: &str,
        rows: &[BTreeMap<String, Value>],
        mode: BindingMode,
    ) -> Result<Option<CompiledSql>> {
        let Some(first) = rows.first() else {
            return Ok(None);
        };
        if first.is_empty() {
            return Err(Error::Grammar("insert row has no columns".to_string()));
        }
        let columns: Vec<&String> = first.keys().collect();

        let mut w = SqlWriter::new(self.dialect, mode);
        w.push("insert into ");
        w.ident(table);
        w.push(" (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.ident(column);
        }
        w.push(") values ");

        for (r, row) in rows.iter().enumerate() {
            if row.len() != columns.len() || !columns.iter().all(|c| row.contains_key(*c)) {
                return Err(Error::Grammar(format!(
                    "insert row {} does not match the columns of the first row",
                    r
                )));
            }
            if r > 0 {
                w.push(", ");
            }
            w.push("(");
            for (i, value) in row.values().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.param(value)?;
            }
            w.push(")");
        }

        Ok(Some(w.finish()))
    }
}

fn is_empty_group(clause: &WhereClause) -> bool {
    match clause {
        WhereClause::Nested { clauses, .. } => clauses.iter().all(is_empty_group),
        _ => false,
    }
}

fn has_renderable(clauses: &[WhereClause]) -> bool {
    clauses.iter().any(|c| !is_empty_group(c))
}
