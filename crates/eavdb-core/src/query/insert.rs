//! Literal inlining for batch inserts.
//!
//! Values rendered here are written straight into the SQL text. This is
//! NOT parameterized and must never be used with untrusted input.

use eavdb_proto::Value;

use super::grammar::Dialect;
use crate::error::{Error, Result};

/// Render a value as an inline SQL literal.
pub fn inline_literal(value: &Value, dialect: Dialect) -> Result<String> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => match dialect {
            Dialect::Postgres => b.to_string(),
            Dialect::MySql | Dialect::Sqlite => (if *b { "1" } else { "0" }).to_string(),
        },
        Value::Int(n) | Value::Timestamp(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Bytes(bytes) => match dialect {
            Dialect::Postgres => format!("'\\x{}'::bytea", hex::encode(bytes)),
            Dialect::MySql | Dialect::Sqlite => format!("X'{}'", hex::encode(bytes)),
        },
        Value::List(_) => {
            return Err(Error::Grammar(
                "list values cannot be inlined into an insert".to_string(),
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_scalars() {
        let d = Dialect::MySql;
        assert_eq!(inline_literal(&Value::Null, d).unwrap(), "NULL");
        assert_eq!(inline_literal(&Value::Int(42), d).unwrap(), "42");
        assert_eq!(inline_literal(&Value::Float(1.5), d).unwrap(), "1.5");
        assert_eq!(inline_literal(&Value::Bool(true), d).unwrap(), "1");
        assert_eq!(inline_literal(&Value::Bool(false), Dialect::Postgres).unwrap(), "false");
    }

    #[test]
    fn test_inline_string_escapes_quotes() {
        let lit = inline_literal(&Value::from("O'Brien"), Dialect::Sqlite).unwrap();
        assert_eq!(lit, "'O''Brien'");
    }

    #[test]
    fn test_inline_bytes() {
        let bytes = Value::Bytes(vec![0xde, 0xad]);
        assert_eq!(inline_literal(&bytes, Dialect::Sqlite).unwrap(), "X'dead'");
        assert_eq!(
            inline_literal(&bytes, Dialect::Postgres).unwrap(),
            "'\\xdead'::bytea"
        );
    }

    #[test]
    fn test_inline_list_rejected() {
        let list = Value::List(vec![Value::Int(1)]);
        assert!(matches!(
            inline_literal(&list, Dialect::MySql),
            Err(Error::Grammar(_))
        ));
    }
}
