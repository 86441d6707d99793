//! Integration tests for attribute query compilation.

use std::collections::BTreeMap;
use std::sync::Arc;

use eavdb_core::catalog::{AttributeDescriptor, EntityRef, MemoryAttributeProvider, SqlType};
use eavdb_core::query::{AttributeQuery, BaseQuery, ProcessState, SqlGrammar, SqlQuery};
use eavdb_core::{Error, QueryConfig};
use eavdb_proto::{JoinKind, Value};
use pretty_assertions::assert_eq;
use tracing_subscriber::EnvFilter;

struct TestContext {
    entity: EntityRef,
    provider: Arc<MemoryAttributeProvider>,
}

impl TestContext {
    /// Products with `sku` (static), `color` and `size` (dynamic varchar).
    fn new() -> Self {
        init_tracing();

        let entity = EntityRef::new("product", "products");
        let provider = Arc::new(
            MemoryAttributeProvider::new()
                .with_attribute(&entity, AttributeDescriptor::static_column("sku", SqlType::Varchar))
                .with_attribute(
                    &entity,
                    AttributeDescriptor::dynamic(2, "color", SqlType::Varchar, &entity),
                )
                .with_attribute(
                    &entity,
                    AttributeDescriptor::dynamic(3, "size", SqlType::Varchar, &entity),
                ),
        );

        Self { entity, provider }
    }

    fn with_attribute(self, id: i64, code: &str, sql_type: SqlType) -> Self {
        self.provider.register(
            &self.entity,
            AttributeDescriptor::dynamic(id, code, sql_type, &self.entity),
        );
        self
    }

    fn query(&self) -> AttributeQuery {
        self.query_with(SqlGrammar::sqlite())
    }

    fn query_with(&self, grammar: SqlGrammar) -> AttributeQuery {
        AttributeQuery::for_entity(Arc::new(grammar), self.entity.clone(), self.provider.clone())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Expected SQLite join text for a dynamic attribute of `products`.
fn join(kind: &str, table: &str, code: &str) -> String {
    format!(
        "{kind} join \"{table}\" as \"{code}_attr\" \
         on \"{code}_attr\".\"entity_id\" = \"products\".\"id\" \
         and \"{code}_attr\".\"attribute_id\" = ?"
    )
}

fn strs(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

// ============== Tests ==============

#[test]
fn test_buffer_tracks_conditions_and_references() {
    let ctx = TestContext::new();

    let q = ctx.query();
    assert!(!q.has_attribute_conditions());
    assert!(q.referenced_columns().is_empty());

    let q = q
        .where_attribute("color", "red")
        .unwrap()
        .or_where_between_attribute("size", [1, 5])
        .where_attribute_group(|g| Ok(g.where_not_null_attribute("sku")))
        .unwrap()
        .order_by_attribute("size", "asc");

    assert!(q.has_attribute_conditions());
    let referenced: Vec<&str> = q.referenced_columns().iter().map(String::as_str).collect();
    assert_eq!(referenced, vec!["color", "size", "sku"]);
    assert_eq!(ctx.provider.load_count(), 0);
}

#[test]
fn test_compiling_twice_is_a_noop() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .where_attribute("color", "red")
        .unwrap()
        .order_by_attribute("size", "desc");

    let first = q.to_sql().unwrap();
    let joins_after_first = q.base().joins().len();
    let second = q.to_sql().unwrap();

    assert_eq!(first, second);
    assert_eq!(q.base().joins().len(), joins_after_first);
    assert_eq!(q.base().wheres().len(), 1);
    assert_eq!(q.state(), ProcessState::Processed);
    assert_eq!(ctx.provider.load_count(), 1);
}

#[test]
fn test_join_deduplication_prefers_inner() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .select(["color"])
        .unwrap()
        .where_attribute("color", "red")
        .unwrap()
        .where_attribute_op("color", "<>", "blue")
        .unwrap();

    let compiled = q.to_sql().unwrap();

    assert_eq!(q.base().joins().len(), 1);
    assert_eq!(q.base().joins()[0].kind, JoinKind::Inner);
    assert_eq!(
        compiled.sql,
        format!(
            "select \"products\".*, \"color_attr\".\"value\" as \"color\" from \"products\" {} \
             where \"color_attr\".\"value\" = ? and \"color_attr\".\"value\" <> ?",
            join("inner", "product_varchar", "color")
        )
    );
    assert_eq!(
        compiled.bindings,
        vec![Value::Int(2), Value::from("red"), Value::from("blue")]
    );
}

#[test]
fn test_predicate_order_and_combinators_preserved() {
    let ctx = TestContext::new().with_attribute(4, "price", SqlType::Decimal);
    let mut q = ctx
        .query()
        .where_attribute("color", "red")
        .unwrap()
        .or_where_attribute("size", "L")
        .unwrap()
        .where_in_attribute("price", [10, 20])
        .where_not_between_attribute("size", ["A", "C"]);

    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.sql,
        format!(
            "select * from \"products\" {} {} {} \
             where \"color_attr\".\"value\" = ? or \"size_attr\".\"value\" = ? \
             and \"price_attr\".\"value\" in (?, ?) \
             and \"size_attr\".\"value\" not between ? and ?",
            join("left", "product_varchar", "color"),
            join("left", "product_varchar", "size"),
            join("left", "product_decimal", "price"),
        )
    );
    assert_eq!(
        compiled.bindings,
        vec![
            Value::Int(2),
            Value::Int(3),
            Value::Int(4),
            Value::from("red"),
            Value::from("L"),
            Value::Int(10),
            Value::Int(20),
            Value::from("A"),
            Value::from("C"),
        ]
    );
}

#[test]
fn test_two_argument_shorthand() {
    let ctx = TestContext::new().with_attribute(4, "price", SqlType::Decimal);

    let mut short = ctx.query().where_attribute("price", 100).unwrap();
    let mut long = ctx.query().where_attribute_op("price", "=", 100).unwrap();

    assert_eq!(short.to_sql().unwrap(), long.to_sql().unwrap());
}

#[test]
fn test_operator_text_is_detected_by_arity_not_type() {
    let ctx = TestContext::new();

    let mut q = ctx.query().where_attribute("color", "<").unwrap();
    let compiled = q.to_sql().unwrap();

    assert!(compiled.sql.ends_with("where \"color_attr\".\"value\" = ?"));
    assert_eq!(compiled.bindings[1], Value::from("<"));
}

#[test]
fn test_wildcard_projection() {
    let ctx = TestContext::new();
    let mut q = ctx.query().select(["attr.*"]).unwrap();

    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.sql,
        format!(
            "select \"products\".*, \"color_attr\".\"value\" as \"color\", \
             \"size_attr\".\"value\" as \"size\" from \"products\" {} {}",
            join("left", "product_varchar", "color"),
            join("left", "product_varchar", "size"),
        )
    );
    assert_eq!(compiled.bindings, vec![Value::Int(2), Value::Int(3)]);
    assert_eq!(ctx.provider.load_count(), 1);
}

#[test]
fn test_wildcard_keeps_filtered_attribute_optional() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .select(["attr.*"])
        .unwrap()
        .where_attribute("color", "red")
        .unwrap();

    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.sql,
        format!(
            "select \"products\".*, \"color_attr\".\"value\" as \"color\", \
             \"size_attr\".\"value\" as \"size\" from \"products\" {} {} \
             where \"color_attr\".\"value\" = ?",
            join("left", "product_varchar", "color"),
            join("left", "product_varchar", "size"),
        )
    );
    assert_eq!(
        compiled.bindings,
        vec![Value::Int(2), Value::Int(3), Value::from("red")]
    );
    assert!(q.base().joins().iter().all(|j| j.kind == JoinKind::Left));
}

#[test]
fn test_plain_query_keeps_explicit_columns() {
    let base = SqlQuery::new(Arc::new(SqlGrammar::sqlite()), "logs");
    let mut q = AttributeQuery::new(base)
        .select(["level", "message"])
        .unwrap()
        .where_column("level", "=", "error")
        .unwrap();

    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.sql,
        "select \"level\", \"message\" from \"logs\" where \"level\" = ?"
    );
    assert_eq!(compiled.bindings, vec![Value::from("error")]);
    assert_eq!(q.state(), ProcessState::Processed);
}

#[test]
fn test_explicit_projection_with_filter_only_attribute() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .select(["color"])
        .unwrap()
        .where_attribute("size", "L")
        .unwrap();

    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.sql,
        format!(
            "select \"products\".*, \"color_attr\".\"value\" as \"color\", \
             \"size_attr\".\"value\" as \"size\" from \"products\" {} {} \
             where \"size_attr\".\"value\" = ?",
            join("left", "product_varchar", "color"),
            join("inner", "product_varchar", "size"),
        )
    );
    assert_eq!(
        compiled.bindings,
        vec![Value::Int(2), Value::Int(3), Value::from("L")]
    );
}

#[test]
fn test_nested_or_group_is_parenthesized() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .where_attribute("sku", "ABC")
        .unwrap()
        .where_attribute_group(|g| {
            g.where_attribute("color", "red")?
                .or_where_attribute("size", "L")
        })
        .unwrap();

    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.sql,
        format!(
            "select * from \"products\" {} {} where \"products\".\"sku\" = ? \
             and (\"color_attr\".\"value\" = ? or \"size_attr\".\"value\" = ?)",
            join("left", "product_varchar", "color"),
            join("left", "product_varchar", "size"),
        )
    );
    assert_eq!(
        compiled.bindings,
        vec![Value::Int(2), Value::Int(3)]
            .into_iter()
            .chain(strs(&["ABC", "red", "L"]))
            .collect::<Vec<_>>()
    );
}

#[test]
fn test_conjunctive_nested_group_uses_inner_joins() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .where_attribute_group(|g| {
            g.where_attribute("color", "red")?
                .where_attribute_group(|inner| inner.where_attribute("size", "L"))
        })
        .unwrap();

    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.sql,
        format!(
            "select * from \"products\" {} {} \
             where (\"color_attr\".\"value\" = ? and (\"size_attr\".\"value\" = ?))",
            join("inner", "product_varchar", "color"),
            join("inner", "product_varchar", "size"),
        )
    );
}

#[test]
fn test_unknown_attribute_leaves_no_partial_joins() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .where_attribute("color", "red")
        .unwrap()
        .where_attribute("weight", 3)
        .unwrap();

    let first = q.to_sql().unwrap_err();
    assert_eq!(
        first,
        Error::UnknownAttribute {
            entity: "product".into(),
            code: "weight".into(),
        }
    );
    assert!(q.base().joins().is_empty());
    assert!(q.base().wheres().is_empty());
    assert_eq!(q.state(), ProcessState::Failed);

    let second = q.to_sql().unwrap_err();
    assert_eq!(first, second);
    assert!(q.base().joins().is_empty());
}

#[test]
fn test_unknown_attribute_inside_group_fails_whole_query() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .where_attribute("color", "red")
        .unwrap()
        .where_attribute_group(|g| g.where_attribute("weight", 1))
        .unwrap();

    assert_eq!(
        q.to_sql().unwrap_err(),
        Error::UnknownAttribute {
            entity: "product".into(),
            code: "weight".into(),
        }
    );
    assert!(q.base().joins().is_empty());
    assert!(q.base().wheres().is_empty());
    assert_eq!(q.state(), ProcessState::Failed);
}

#[test]
fn test_group_callback_error_reaches_caller_unchanged() {
    let ctx = TestContext::new();

    let result = ctx
        .query()
        .where_attribute("color", "red")
        .unwrap()
        .where_attribute_group(|g| {
            g.where_attribute("size", "L")?
                .where_attribute_op("size", ">", Value::Null)
        });

    match result {
        Err(Error::InvalidPredicate(message)) => assert!(!message.is_empty()),
        Err(other) => panic!("Expected InvalidPredicate, got {:?}", other),
        Ok(_) => panic!("Expected InvalidPredicate, got a query"),
    }

    let result = ctx.query().or_where_attribute_group(|_| {
        Err(Error::InvalidPredicate("rejected by caller".into()))
    });
    match result {
        Err(error) => assert_eq!(error, Error::InvalidPredicate("rejected by caller".into())),
        Ok(_) => panic!("Expected InvalidPredicate, got a query"),
    }
}

#[test]
fn test_qualified_base_column_next_to_attribute() {
    let ctx = TestContext::new();
    let mut q = ctx.query().select(["products.name", "color"]).unwrap();

    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.sql,
        format!(
            "select \"products\".*, \"products\".\"name\", \
             \"color_attr\".\"value\" as \"color\" from \"products\" {}",
            join("left", "product_varchar", "color"),
        )
    );

    let mut bare = ctx.query().select(["name", "color"]).unwrap();
    match bare.to_sql() {
        Err(Error::UnknownAttribute { code, .. }) => assert_eq!(code, "name"),
        other => panic!("Expected UnknownAttribute, got {:?}", other),
    }
}

#[test]
fn test_unknown_projected_attribute() {
    let ctx = TestContext::new();
    let mut q = ctx.query().select(["color", "weight"]).unwrap();

    match q.to_sql() {
        Err(Error::UnknownAttribute { code, .. }) => assert_eq!(code, "weight"),
        other => panic!("Expected UnknownAttribute, got {:?}", other),
    }
}

#[test]
fn test_physical_wheres_precede_attribute_predicates() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .where_attribute("color", "red")
        .unwrap()
        .where_column("products.id", ">", 10)
        .unwrap();

    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.sql,
        format!(
            "select * from \"products\" {} where \"products\".\"id\" > ? \
             and \"color_attr\".\"value\" = ?",
            join("inner", "product_varchar", "color"),
        )
    );
    assert_eq!(
        compiled.bindings,
        vec![Value::Int(2), Value::Int(10), Value::from("red")]
    );
}

#[test]
fn test_or_against_physical_where_relaxes_join() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .where_column("products.id", "=", 1)
        .unwrap()
        .or_where_attribute("color", "red")
        .unwrap();

    q.process_attributes().unwrap();
    assert_eq!(q.base().joins()[0].kind, JoinKind::Left);
}

#[test]
fn test_order_and_null_checks_use_left_joins() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .where_null_attribute("color")
        .order_by_attribute("size", "ASC");

    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.sql,
        format!(
            "select * from \"products\" {} {} where \"color_attr\".\"value\" is null \
             order by \"size_attr\".\"value\" asc",
            join("left", "product_varchar", "color"),
            join("left", "product_varchar", "size"),
        )
    );
}

#[test]
fn test_direction_normalization_and_latest() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .order_by_attribute("color", "sideways")
        .oldest_attribute("size")
        .latest()
        .unwrap();

    let sql = q.to_sql().unwrap().sql;

    assert!(sql.ends_with(
        "order by \"products\".\"created_at\" desc, \"color_attr\".\"value\" desc, \
         \"size_attr\".\"value\" asc"
    ));
}

#[test]
fn test_attribute_order_goes_to_union_orders() {
    let ctx = TestContext::new();
    let other = ctx.query().where_attribute("size", "L").unwrap();
    let mut q = ctx
        .query()
        .where_attribute("color", "red")
        .unwrap()
        .union(other)
        .unwrap()
        .order_by_attribute("sku", "desc");

    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.sql,
        format!(
            "(select * from \"products\" {} where \"color_attr\".\"value\" = ?) \
             union (select * from \"products\" {} where \"size_attr\".\"value\" = ?) \
             order by \"products\".\"sku\" desc",
            join("inner", "product_varchar", "color"),
            join("inner", "product_varchar", "size"),
        )
    );
    assert_eq!(
        compiled.bindings,
        vec![Value::Int(2), Value::from("red"), Value::Int(3), Value::from("L")]
    );
}

#[test]
fn test_date_part_on_mysql() {
    let ctx = TestContext::new().with_attribute(6, "released_at", SqlType::Datetime);
    let mut q = ctx
        .query_with(SqlGrammar::mysql())
        .where_year_attribute("released_at", ">=", 2020)
        .unwrap();

    let compiled = q.to_sql().unwrap();

    assert_eq!(
        compiled.sql,
        "select * from `products` inner join `product_datetime` as `released_at_attr` \
         on `released_at_attr`.`entity_id` = `products`.`id` \
         and `released_at_attr`.`attribute_id` = ? \
         where year(`released_at_attr`.`value`) >= ?"
    );
    assert_eq!(compiled.bindings, vec![Value::Int(6), Value::Int(2020)]);
}

#[test]
fn test_custom_join_alias_suffix() {
    let ctx = TestContext::new();
    let mut q = ctx
        .query()
        .with_config(QueryConfig::new().with_join_alias_suffix("_v"))
        .where_attribute("color", "red")
        .unwrap();

    let sql = q.to_sql().unwrap().sql;

    assert!(sql.contains("inner join \"product_varchar\" as \"color_v\""));
    assert!(sql.ends_with("where \"color_v\".\"value\" = ?"));
}

#[test]
fn test_new_query_shares_entity_but_not_state() {
    let ctx = TestContext::new();
    let q = ctx.query().where_attribute("color", "red").unwrap();
    let mut fresh = q.new_query().where_attribute("size", "L").unwrap();

    let sql = fresh.to_sql().unwrap().sql;
    assert!(sql.contains("\"size_attr\""));
    assert!(!sql.contains("\"color_attr\""));
}

#[test]
fn test_insert_sql_inline() {
    let ctx = TestContext::new();
    let q = ctx.query();
    let rows = vec![
        BTreeMap::from([
            ("sku".to_string(), Value::from("M'1")),
            ("name".to_string(), Value::from("Mug")),
            ("stock".to_string(), Value::Int(4)),
        ]),
        BTreeMap::from([
            ("stock".to_string(), Value::Null),
            ("sku".to_string(), Value::from("C2")),
            ("name".to_string(), Value::from("Cup")),
        ]),
    ];

    let sql = q.insert_sql_inline(&rows).unwrap().unwrap();

    assert_eq!(
        sql,
        "insert into \"products\" (\"name\", \"sku\", \"stock\") \
         values ('Mug', 'M''1', 4), ('Cup', 'C2', NULL)"
    );
    assert_eq!(q.insert_sql_inline(&[]).unwrap(), None);
}
