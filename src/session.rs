//! The ORM session: one connection plus a shared mapping context.
//!
//! A session owns its connection for its lifetime and blocks the calling
//! thread. Object-mapped verbs (`insert`, `read_all`, ...) resolve table
//! mappings through the context on first use; raw SQL passthrough skips
//! mapping entirely. An open transaction that is neither committed nor
//! rolled back is rolled back when the session drops.

use tracing::{debug, warn};

use crate::accessor::Record;
use crate::connection::SqlConnection;
use crate::context::{MappingContext, TableMapping};
use crate::cursor::{LazyResultSet, LazyRows, ResultSet};
use crate::error::SqlMapperError;
use crate::metadata::{ColumnMetaData, TableMetaData};
use crate::multirow::{MultiRowOp, process_multirow};
use crate::types::{ParameterizedSql, RowValues};

use std::sync::Arc;

pub struct Session<'ctx, C: SqlConnection> {
    ctx: &'ctx MappingContext,
    conn: C,
    in_transaction: bool,
}

impl<'ctx, C: SqlConnection> Session<'ctx, C> {
    /// Open a session, applying the context's default isolation level.
    pub fn open(ctx: &'ctx MappingContext, mut conn: C) -> Result<Self, SqlMapperError> {
        conn.set_isolation_level(ctx.isolation_level())?;
        Ok(Self {
            ctx,
            conn,
            in_transaction: false,
        })
    }

    #[must_use]
    pub fn context(&self) -> &'ctx MappingContext {
        self.ctx
    }

    fn mapping<T: Record>(&mut self) -> Result<Arc<TableMapping<T>>, SqlMapperError> {
        self.ctx.mapping::<T, C>(&mut self.conn)
    }

    // ---- object-mapped writes ----

    /// Insert a sequence of records using the configured multi-row
    /// strategy. Returns rows modified per statement execution.
    pub fn insert<T: Record>(&mut self, records: &[T]) -> Result<Vec<usize>, SqlMapperError> {
        let mapping = self.mapping::<T>()?;
        process_multirow(
            &mut self.conn,
            self.ctx.multi_row(),
            mapping.sql(),
            MultiRowOp::Insert,
            |record| mapping.bind_values(record, mapping.sql().insert_columns()),
            records,
        )
    }

    /// Insert one record, returning rows modified.
    pub fn insert_one<T: Record>(&mut self, record: &T) -> Result<usize, SqlMapperError> {
        let mapping = self.mapping::<T>()?;
        let params = mapping.bind_values(record, mapping.sql().insert_columns())?;
        self.conn.execute_dml(mapping.sql().insert(), &params)
    }

    /// Insert one record and write the generated key(s) back onto its
    /// auto-generated columns, returning the completed record.
    pub fn insert_and_get<T: Record>(&mut self, mut record: T) -> Result<T, SqlMapperError> {
        let mapping = self.mapping::<T>()?;
        let params = mapping.bind_values(&record, mapping.sql().insert_columns())?;
        self.conn.execute_dml(mapping.sql().insert(), &params)?;
        let keys = self.conn.generated_keys()?;
        let auto_columns: Vec<String> = mapping
            .metadata()
            .auto_generated_columns()
            .map(String::from)
            .collect();
        if keys.len() < auto_columns.len() {
            return Err(SqlMapperError::Execution(format!(
                "driver returned {} generated key(s) for {} auto-generated column(s) of table [{}]",
                keys.len(),
                auto_columns.len(),
                mapping.table_name()
            )));
        }
        for (column, key) in auto_columns.iter().zip(keys) {
            mapping.set_value(&mut record, column, key)?;
        }
        Ok(record)
    }

    /// Update a sequence of records by primary key, as one driver batch.
    pub fn update<T: Record>(&mut self, records: &[T]) -> Result<Vec<usize>, SqlMapperError> {
        let mapping = self.mapping::<T>()?;
        let sql = mapping.sql().update()?.to_string();
        self.keyed_batch(&mapping, &sql, mapping.sql().update_columns(), records)
    }

    pub fn update_one<T: Record>(&mut self, record: &T) -> Result<usize, SqlMapperError> {
        let mapping = self.mapping::<T>()?;
        let sql = mapping.sql().update()?.to_string();
        let params = mapping.bind_values(record, mapping.sql().update_columns())?;
        self.conn.execute_dml(&sql, &params)
    }

    /// Delete a sequence of records by primary key, as one driver batch.
    pub fn delete<T: Record>(&mut self, records: &[T]) -> Result<Vec<usize>, SqlMapperError> {
        let mapping = self.mapping::<T>()?;
        let sql = mapping.sql().delete()?.to_string();
        self.keyed_batch(&mapping, &sql, mapping.sql().primary_key_columns(), records)
    }

    pub fn delete_one<T: Record>(&mut self, record: &T) -> Result<usize, SqlMapperError> {
        let mapping = self.mapping::<T>()?;
        let sql = mapping.sql().delete()?.to_string();
        let params = mapping.bind_values(record, mapping.sql().primary_key_columns())?;
        self.conn.execute_dml(&sql, &params)
    }

    /// Insert-or-update a sequence of records using the dialect's merge
    /// statement and the configured multi-row strategy.
    pub fn merge<T: Record>(&mut self, records: &[T]) -> Result<Vec<usize>, SqlMapperError> {
        let mapping = self.mapping::<T>()?;
        process_multirow(
            &mut self.conn,
            self.ctx.multi_row(),
            mapping.sql(),
            MultiRowOp::Merge,
            |record| mapping.bind_values(record, mapping.sql().merge_columns()),
            records,
        )
    }

    pub fn merge_one<T: Record>(&mut self, record: &T) -> Result<usize, SqlMapperError> {
        let mapping = self.mapping::<T>()?;
        let sql = mapping.sql().merge()?.to_string();
        let params = mapping.bind_values(record, mapping.sql().merge_columns())?;
        self.conn.execute_dml(&sql, &params)
    }

    fn keyed_batch<T: Record>(
        &mut self,
        mapping: &TableMapping<T>,
        sql: &str,
        columns: &[String],
        records: &[T],
    ) -> Result<Vec<usize>, SqlMapperError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let param_sets = records
            .iter()
            .map(|record| mapping.bind_values(record, columns))
            .collect::<Result<Vec<_>, _>>()?;
        self.conn.execute_batched_dml(sql, &param_sets)
    }

    // ---- object-mapped reads ----

    /// Whether a row with this record's primary key exists.
    pub fn exists<T: Record>(&mut self, record: &T) -> Result<bool, SqlMapperError> {
        let mapping = self.mapping::<T>()?;
        let sql = mapping.sql().exists()?.to_string();
        let params = mapping.bind_values(record, mapping.sql().primary_key_columns())?;
        let mut cursor = self.conn.query(&sql, &params)?;
        Ok(cursor.next_row()?.is_some())
    }

    /// Every row of the mapped table.
    pub fn read_all<T: Record>(&mut self) -> Result<Vec<T>, SqlMapperError> {
        let mapping = self.mapping::<T>()?;
        let sql = mapping.sql().select_all().to_string();
        self.read_list(&sql, &[])
    }

    /// The row with the given primary key value(s), if any.
    pub fn read_by_primary_key<T: Record>(
        &mut self,
        keys: &[RowValues],
    ) -> Result<Option<T>, SqlMapperError> {
        let mapping = self.mapping::<T>()?;
        let sql = mapping.sql().select_by_primary_key()?.to_string();
        self.read_lazy::<T>(&sql, keys)?.first()
    }

    /// All rows of an arbitrary query, mapped to records.
    pub fn read_list<T: Record>(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Vec<T>, SqlMapperError> {
        self.read_lazy::<T>(sql, params)?.to_list()
    }

    /// First row of an arbitrary query, mapped, if any.
    pub fn read_first<T: Record>(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<T>, SqlMapperError> {
        self.read_lazy::<T>(sql, params)?.first()
    }

    /// Exactly one row of an arbitrary query; zero or many is an error.
    pub fn read_one<T: Record>(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<T, SqlMapperError> {
        self.read_lazy::<T>(sql, params)?.one()
    }

    /// Lazy mapped cursor over an arbitrary query. Single-pass; the
    /// session is mutably borrowed until the cursor is dropped or closed.
    pub fn read_lazy<'s, T: Record>(
        &'s mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<LazyResultSet<'s, T>, SqlMapperError> {
        let mapping = self.ctx.mapping::<T, C>(&mut self.conn)?;
        let accessors = Arc::clone(mapping.accessors());
        let table_name = mapping.table_name().to_string();
        let cursor = self.conn.query(sql, params)?;
        Ok(LazyResultSet::new(
            cursor,
            accessors,
            table_name,
            self.ctx.canonical_cache(),
        ))
    }

    // ---- raw SQL passthrough ----

    /// Run a query and materialize every row, unmapped.
    pub fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlMapperError> {
        let mut cursor = self.conn.query(sql, params)?;
        ResultSet::from_cursor(cursor.as_mut())
    }

    /// Lazy unmapped cursor over a query.
    pub fn query_lazy<'s>(
        &'s mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<LazyRows<'s>, SqlMapperError> {
        Ok(LazyRows::new(self.conn.query(sql, params)?))
    }

    /// Execute a DML statement, returning rows modified.
    pub fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, SqlMapperError> {
        self.conn.execute_dml(sql, params)
    }

    /// Execute a parameterless multi-statement script (DDL setup).
    pub fn execute_script(&mut self, sql: &str) -> Result<(), SqlMapperError> {
        self.conn.execute_script(sql)
    }

    /// Run a pre-rendered parameterized statement as a query.
    pub fn query_sql(&mut self, ps: &ParameterizedSql) -> Result<ResultSet, SqlMapperError> {
        self.query(&ps.sql, &ps.parameters)
    }

    /// Run a pre-rendered parameterized statement as DML.
    pub fn execute_sql(&mut self, ps: &ParameterizedSql) -> Result<usize, SqlMapperError> {
        self.execute(&ps.sql, &ps.parameters)
    }

    // ---- introspection ----

    /// Table and view names visible to this connection.
    pub fn table_names(&mut self) -> Result<Vec<String>, SqlMapperError> {
        self.conn.table_names()
    }

    /// Column metadata of one table, unmapped.
    pub fn table_columns(&mut self, table: &str) -> Result<Vec<ColumnMetaData>, SqlMapperError> {
        self.conn.columns(table)
    }

    /// Resolved metadata for a record type's table.
    pub fn table_metadata<T: Record>(&mut self) -> Result<TableMetaData, SqlMapperError> {
        Ok(self.mapping::<T>()?.metadata().clone())
    }

    // ---- transactions ----

    pub fn begin_transaction(&mut self) -> Result<(), SqlMapperError> {
        if self.in_transaction {
            return Err(SqlMapperError::Execution(
                "a transaction is already open on this session".into(),
            ));
        }
        self.conn.begin_transaction()?;
        self.in_transaction = true;
        debug!("transaction begun");
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), SqlMapperError> {
        if !self.in_transaction {
            return Err(SqlMapperError::Execution(
                "no open transaction to commit".into(),
            ));
        }
        self.conn.commit()?;
        self.in_transaction = false;
        debug!("transaction committed");
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<(), SqlMapperError> {
        if !self.in_transaction {
            return Err(SqlMapperError::Execution(
                "no open transaction to roll back".into(),
            ));
        }
        self.conn.rollback()?;
        self.in_transaction = false;
        debug!("transaction rolled back");
        Ok(())
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

impl<C: SqlConnection> Drop for Session<'_, C> {
    fn drop(&mut self) {
        if self.in_transaction {
            if let Err(e) = self.conn.rollback() {
                warn!(error = %e, "rollback on session drop failed");
            }
        }
    }
}
