//! Attribute compilation pass.
//!
//! Turns a builder's buffered attribute requests into physical joins,
//! columns, predicates and orderings. The pass runs in three steps:
//!
//! 1. load metadata once for every needed code and reject unknown codes;
//! 2. resolve one join kind per code across all requesters;
//! 3. materialize the projection, then predicates, then orderings.
//!
//! Results are staged and handed back to the builder, which commits them
//! only when the whole pass succeeded.

use std::collections::BTreeSet;

use eavdb_proto::{
    Boolean, ColumnRef, JoinClause, JoinKind, OrderClause, OrderTarget, SelectColumn, WhereClause,
};
use tracing::{debug, instrument};

use super::base::BaseQuery;
use super::buffer::PredicateRequest;
use super::builder::AttributeQuery;
use super::join::{JoinCache, JoinMaterializer, JoinPlan};
use super::projection::Projection;
use crate::catalog::AttributeSet;
use crate::error::{Error, Result};

/// Physical state produced by a successful pass.
#[derive(Debug, Default)]
pub struct StagedAttributes {
    /// Replacement projection, `None` to keep the current one.
    pub columns: Option<Vec<SelectColumn>>,
    /// Joins in materialization order.
    pub joins: Vec<JoinClause>,
    /// Compiled predicates, appended after existing physical wheres.
    pub wheres: Vec<WhereClause>,
    /// Compiled orderings with their target list.
    pub orders: Vec<(OrderTarget, OrderClause)>,
    /// Join cache including the new joins.
    pub cache: JoinCache,
}

/// Compiles attribute requests into physical query state.
pub struct AttributeCompiler;

impl AttributeCompiler {
    /// Run the pass for a builder.
    ///
    /// Returns `None` when there is nothing to compile: no attribute requests
    /// and a projection that needs no rewriting.
    #[instrument(skip_all, fields(table = %query.base().table()))]
    pub fn compile<Q: BaseQuery>(query: &AttributeQuery<Q>) -> Result<Option<StagedAttributes>> {
        let buffer = query.buffer();
        let projection = Projection::classify(query.base().columns());

        if !buffer.has_attribute_conditions() {
            if projection.is_passthrough() {
                debug!("no attribute requests, skipping pass");
                return Ok(None);
            }
            if query.entity_context().is_none() && !projection.is_wildcard() {
                debug!("no entity context, projection left untouched");
                return Ok(None);
            }
        }

        let context = query.entity_context().ok_or(Error::MissingEntityContext)?;
        let entity = &context.entity;

        let mut needed: BTreeSet<String> = buffer.referenced().clone();
        needed.extend(projection.codes().iter().cloned());

        let attributes = if projection.is_wildcard() {
            context.provider.load_attributes(entity, None)?
        } else {
            context.provider.load_attributes(entity, Some(&needed))?
        };

        if let Some(code) = needed.iter().find(|c| !attributes.contains(c.as_str())) {
            return Err(Error::UnknownAttribute {
                entity: entity.code.clone(),
                code: code.clone(),
            });
        }

        let mut plan = JoinPlan::new();
        plan_level(query.base().wheres(), buffer.predicates(), true, &mut plan);
        for order in buffer.orders() {
            plan.request(&order.column, JoinKind::Left);
        }
        if projection.is_wildcard() {
            // Wildcard-projected attributes stay optional even when filtered.
            for code in projection.projected(&attributes) {
                plan.pin(code, JoinKind::Left);
            }
        } else {
            for code in projection.projected(&attributes) {
                plan.request(code, JoinKind::Left);
            }
        }

        let mut joins =
            JoinMaterializer::new(entity, query.config(), &plan, query.join_cache().clone());

        let columns = projection.resolve(entity, &attributes, buffer.referenced(), &mut joins);
        let wheres = compile_level(buffer.predicates(), &attributes, &mut joins)?;

        let mut orders = Vec::with_capacity(buffer.orders().len());
        for order in buffer.orders() {
            let column = attribute_column(&order.column, &attributes, &mut joins)?;
            orders.push((
                order.target,
                OrderClause {
                    column,
                    direction: order.direction,
                },
            ));
        }

        let (cache, joins) = joins.into_parts();

        debug!(
            entity = %entity.code,
            attributes = attributes.len(),
            joins = joins.len(),
            predicates = wheres.len(),
            orders = orders.len(),
            "attribute pass compiled"
        );

        Ok(Some(StagedAttributes {
            columns,
            joins,
            wheres,
            orders,
            cache,
        }))
    }
}

/// Record the join kind each predicate of one where level needs.
///
/// A level is required when every enclosing level is and it is a pure
/// conjunction. The first entry's combinator is never rendered, so it does
/// not count.
fn plan_level<Q: BaseQuery>(
    physical: &[WhereClause],
    predicates: &[PredicateRequest<Q>],
    required: bool,
    plan: &mut JoinPlan,
) {
    let conjunctive = physical
        .iter()
        .map(WhereClause::boolean)
        .chain(predicates.iter().map(|p| p.boolean()))
        .skip(1)
        .all(|b| b == Boolean::And);
    let required = required && conjunctive;

    for request in predicates {
        match request {
            PredicateRequest::Nested { query, .. } => {
                plan_level(
                    query.base().wheres(),
                    query.buffer().predicates(),
                    required,
                    plan,
                );
            }
            other => {
                if let Some(code) = other.column() {
                    let kind = if required && other.requires_value() {
                        JoinKind::Inner
                    } else {
                        JoinKind::Left
                    };
                    plan.request(code, kind);
                }
            }
        }
    }
}

fn compile_level<Q: BaseQuery>(
    predicates: &[PredicateRequest<Q>],
    attributes: &AttributeSet,
    joins: &mut JoinMaterializer<'_>,
) -> Result<Vec<WhereClause>> {
    let mut clauses = Vec::with_capacity(predicates.len());

    for request in predicates {
        let clause = match request {
            PredicateRequest::Basic {
                column,
                operator,
                value,
                boolean,
            } => WhereClause::Basic {
                column: attribute_column(column, attributes, joins)?,
                operator: *operator,
                value: value.clone(),
                boolean: *boolean,
            },
            PredicateRequest::Between {
                column,
                low,
                high,
                boolean,
                not,
            } => WhereClause::Between {
                column: attribute_column(column, attributes, joins)?,
                low: low.clone(),
                high: high.clone(),
                boolean: *boolean,
                not: *not,
            },
            PredicateRequest::In {
                column,
                values,
                boolean,
                not,
            } => WhereClause::In {
                column: attribute_column(column, attributes, joins)?,
                values: values.clone(),
                boolean: *boolean,
                not: *not,
            },
            PredicateRequest::Null {
                column,
                boolean,
                not,
            } => WhereClause::Null {
                column: attribute_column(column, attributes, joins)?,
                boolean: *boolean,
                not: *not,
            },
            PredicateRequest::DatePart {
                part,
                column,
                operator,
                value,
                boolean,
            } => WhereClause::Date {
                part: *part,
                column: attribute_column(column, attributes, joins)?,
                operator: *operator,
                value: value.clone(),
                boolean: *boolean,
            },
            PredicateRequest::Nested { query, boolean, .. } => {
                // Child groups share this pass's metadata and joins.
                let mut nested = query.base().wheres().to_vec();
                nested.extend(compile_level(
                    query.buffer().predicates(),
                    attributes,
                    joins,
                )?);
                WhereClause::Nested {
                    clauses: nested,
                    boolean: *boolean,
                }
            }
        };
        clauses.push(clause);
    }

    Ok(clauses)
}

fn attribute_column(
    code: &str,
    attributes: &AttributeSet,
    joins: &mut JoinMaterializer<'_>,
) -> Result<ColumnRef> {
    let descriptor = attributes.get(code).ok_or_else(|| Error::UnknownAttribute {
        entity: attributes.entity().code.clone(),
        code: code.to_string(),
    })?;
    Ok(joins.column(descriptor))
}
