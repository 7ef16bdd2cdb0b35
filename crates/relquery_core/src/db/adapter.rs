//! `StoreAdapter` trait and its rusqlite implementation.

use super::{DbError, DbResult};
use crate::model::value::Value;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, Row, ToSql};
use std::fmt::{Display, Formatter};

/// Statement text plus its ordered positional bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl CompiledStatement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl Display for CompiledStatement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Executes compiled statements against a backing store.
pub trait StoreAdapter {
    /// Runs a row-returning statement.
    fn query(&self, statement: &CompiledStatement) -> DbResult<Vec<Vec<Value>>>;

    /// Runs a mutation and returns the affected-row count.
    fn execute(&self, statement: &CompiledStatement) -> DbResult<u64>;
}

impl<T: StoreAdapter + ?Sized> StoreAdapter for &T {
    fn query(&self, statement: &CompiledStatement) -> DbResult<Vec<Vec<Value>>> {
        (**self).query(statement)
    }

    fn execute(&self, statement: &CompiledStatement) -> DbResult<u64> {
        (**self).execute(statement)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(value) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*value)),
            Value::Real(value) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*value)),
            Value::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Value::Boolean(value) => {
                ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*value)))
            }
        })
    }
}

fn value_at(row: &Row<'_>, index: usize) -> DbResult<Value> {
    match row.get_ref(index)? {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(value) => Ok(Value::Integer(value)),
        ValueRef::Real(value) => Ok(Value::Real(value)),
        ValueRef::Text(_) => Ok(Value::Text(row.get(index)?)),
        ValueRef::Blob(_) => Err(DbError::UnsupportedColumnType {
            index,
            type_name: "blob".to_string(),
        }),
    }
}

/// Adapter over a borrowed rusqlite connection.
///
/// The connection is not `Sync`; concurrent call sequences each open
/// their own connection.
#[derive(Debug, Clone, Copy)]
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }
}

impl StoreAdapter for SqliteStore<'_> {
    fn query(&self, statement: &CompiledStatement) -> DbResult<Vec<Vec<Value>>> {
        let mut stmt = self.conn.prepare(&statement.sql)?;
        let width = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(value_at(row, index)?);
            }
            result.push(values);
        }
        Ok(result)
    }

    fn execute(&self, statement: &CompiledStatement) -> DbResult<u64> {
        let mut stmt = self.conn.prepare(&statement.sql)?;
        let affected = stmt.execute(params_from_iter(statement.params.iter()))?;
        Ok(affected as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::{CompiledStatement, SqliteStore, StoreAdapter};
    use crate::config::EngineConfig;
    use crate::db::{open_store_in_memory, DbError};
    use crate::model::value::Value;

    #[test]
    fn binds_and_reads_every_value_kind() {
        let conn = open_store_in_memory(&EngineConfig::default()).unwrap();
        let store = SqliteStore::new(&conn);
        let rows = store
            .query(&CompiledStatement::new(
                "SELECT ?, ?, ?, ?, ?",
                vec![
                    Value::Null,
                    Value::Integer(7),
                    Value::Real(2.5),
                    Value::Text("x".to_string()),
                    Value::Boolean(true),
                ],
            ))
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![
                Value::Null,
                Value::Integer(7),
                Value::Real(2.5),
                Value::Text("x".to_string()),
                Value::Integer(1),
            ]]
        );
    }

    #[test]
    fn execute_reports_affected_rows() {
        let conn = open_store_in_memory(&EngineConfig::default()).unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (1), (2), (3);")
            .unwrap();
        let store = SqliteStore::new(&conn);
        let affected = store
            .execute(&CompiledStatement::new(
                "DELETE FROM t WHERE v > ?",
                vec![Value::Integer(1)],
            ))
            .unwrap();
        assert_eq!(affected, 2);
    }

    #[test]
    fn blob_columns_are_rejected() {
        let conn = open_store_in_memory(&EngineConfig::default()).unwrap();
        let store = SqliteStore::new(&conn);
        let err = store
            .query(&CompiledStatement::new("SELECT x'00'", Vec::new()))
            .unwrap_err();
        assert!(matches!(err, DbError::UnsupportedColumnType { index: 0, .. }));
    }
}
