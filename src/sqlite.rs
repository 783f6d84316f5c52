//! SQLite backend, wrapping a blocking `rusqlite` connection.
//!
//! Query results are drained into a buffered cursor at execute time;
//! the `RowCursor` the caller sees is then independent of the prepared
//! statement's lifetime. A column is reported auto-generated when it is
//! the sole `INTEGER` primary key (SQLite's rowid alias), which is also
//! what `last_insert_rowid` reports after an insert.

use std::collections::VecDeque;

use rusqlite::ToSql;
use rusqlite::types::{Value, ValueRef};

use crate::connection::{IsolationLevel, RowCursor, SqlConnection};
use crate::error::SqlMapperError;
use crate::metadata::{ColumnMetaData, SchemaIntrospector};
use crate::types::RowValues;

pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Open (creating if needed) a database file.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, SqlMapperError> {
        Ok(Self {
            conn: rusqlite::Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, SqlMapperError> {
        Ok(Self {
            conn: rusqlite::Connection::open_in_memory()?,
        })
    }

    /// Wrap an already-configured connection.
    #[must_use]
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    #[must_use]
    pub fn inner(&self) -> &rusqlite::Connection {
        &self.conn
    }
}

/// Bind backend-neutral params to SQLite values.
fn convert_params(params: &[RowValues]) -> Vec<Value> {
    params
        .iter()
        .map(|p| match p {
            RowValues::Int(i) => Value::Integer(*i),
            RowValues::Float(f) => Value::Real(*f),
            RowValues::Text(s) => Value::Text(s.clone()),
            RowValues::Bool(b) => Value::Integer(i64::from(*b)),
            RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
            RowValues::Null => Value::Null,
            RowValues::JSON(jsval) => Value::Text(jsval.to_string()),
            RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
        })
        .collect()
}

fn extract_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<RowValues, SqlMapperError> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => RowValues::Null,
        ValueRef::Integer(i) => RowValues::Int(i),
        ValueRef::Real(f) => RowValues::Float(f),
        ValueRef::Text(bytes) => RowValues::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(b) => RowValues::Blob(b.to_vec()),
    })
}

/// Rows drained from a statement, served back as a forward-only cursor.
struct BufferedCursor {
    column_names: Vec<String>,
    rows: VecDeque<Vec<RowValues>>,
}

impl RowCursor for BufferedCursor {
    fn column_names(&self) -> &[String] {
        &self.column_names
    }

    fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, SqlMapperError> {
        Ok(self.rows.pop_front())
    }
}

fn param_refs(values: &[Value]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

/// Quote an identifier for interpolation into a pragma.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SchemaIntrospector for SqliteConnection {
    fn table_names(&mut self) -> Result<Vec<String>, SqlMapperError> {
        let mut stmt = self.conn.prepare(
            "select name from sqlite_master \
             where type in ('table','view') and name not like 'sqlite_%' order by name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn columns(&mut self, table: &str) -> Result<Vec<ColumnMetaData>, SqlMapperError> {
        let info = table_info(&self.conn, table)?;
        let integer_pk_count = info
            .iter()
            .filter(|c| c.pk_position > 0 && c.type_name.eq_ignore_ascii_case("INTEGER"))
            .count();
        let pk_count = info.iter().filter(|c| c.pk_position > 0).count();
        Ok(info
            .into_iter()
            .map(|c| {
                // The rowid alias: a table's single INTEGER primary key.
                let auto_generated = pk_count == 1
                    && integer_pk_count == 1
                    && c.pk_position > 0
                    && c.type_name.eq_ignore_ascii_case("INTEGER");
                ColumnMetaData {
                    name: c.name,
                    type_name: c.type_name,
                    auto_generated,
                }
            })
            .collect())
    }

    fn primary_keys(&mut self, table: &str) -> Result<Vec<String>, SqlMapperError> {
        let mut info = table_info(&self.conn, table)?;
        info.retain(|c| c.pk_position > 0);
        info.sort_by_key(|c| c.pk_position);
        Ok(info.into_iter().map(|c| c.name).collect())
    }
}

struct TableInfoRow {
    name: String,
    type_name: String,
    pk_position: i64,
}

fn table_info(
    conn: &rusqlite::Connection,
    table: &str,
) -> Result<Vec<TableInfoRow>, SqlMapperError> {
    let sql = format!("pragma table_info({})", quote_identifier(table));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TableInfoRow {
                name: row.get(1)?,
                type_name: row.get(2)?,
                pk_position: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl SqlConnection for SqliteConnection {
    fn execute_dml(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, SqlMapperError> {
        let values = convert_params(params);
        let mut stmt = self.conn.prepare(sql)?;
        Ok(stmt.execute(&param_refs(&values)[..])?)
    }

    fn execute_script(&mut self, sql: &str) -> Result<(), SqlMapperError> {
        Ok(self.conn.execute_batch(sql)?)
    }

    fn execute_batched_dml(
        &mut self,
        sql: &str,
        param_sets: &[Vec<RowValues>],
    ) -> Result<Vec<usize>, SqlMapperError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut counts = Vec::with_capacity(param_sets.len());
        for params in param_sets {
            let values = convert_params(params);
            counts.push(stmt.execute(&param_refs(&values)[..])?);
        }
        Ok(counts)
    }

    fn query<'c>(
        &'c mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn RowCursor + 'c>, SqlMapperError> {
        let values = convert_params(params);
        let mut stmt = self.conn.prepare(sql)?;
        let column_names: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
        let mut rows_iter = stmt.query(&param_refs(&values)[..])?;
        let mut rows = VecDeque::new();
        while let Some(row) = rows_iter.next()? {
            let mut row_values = Vec::with_capacity(column_names.len());
            for i in 0..column_names.len() {
                row_values.push(extract_value(row, i)?);
            }
            rows.push_back(row_values);
        }
        Ok(Box::new(BufferedCursor { column_names, rows }))
    }

    fn generated_keys(&mut self) -> Result<Vec<RowValues>, SqlMapperError> {
        Ok(vec![RowValues::Int(self.conn.last_insert_rowid())])
    }

    fn begin_transaction(&mut self) -> Result<(), SqlMapperError> {
        Ok(self.conn.execute_batch("BEGIN")?)
    }

    fn commit(&mut self) -> Result<(), SqlMapperError> {
        Ok(self.conn.execute_batch("COMMIT")?)
    }

    fn rollback(&mut self) -> Result<(), SqlMapperError> {
        Ok(self.conn.execute_batch("ROLLBACK")?)
    }

    fn set_isolation_level(&mut self, level: IsolationLevel) -> Result<(), SqlMapperError> {
        // SQLite serializes by default; read-uncommitted is the only knob.
        let pragma = match level {
            IsolationLevel::ReadUncommitted => "PRAGMA read_uncommitted = 1",
            IsolationLevel::ReadCommitted
            | IsolationLevel::RepeatableRead
            | IsolationLevel::Serializable => "PRAGMA read_uncommitted = 0",
        };
        Ok(self.conn.execute_batch(pragma)?)
    }
}
