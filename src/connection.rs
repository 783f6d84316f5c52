//! The blocking connection abstraction the engine maps over.
//!
//! Everything the core needs from a backing driver: parameterized
//! execute/query, driver-native batch execute, generated-key retrieval,
//! transaction control, and schema introspection (via the
//! [`SchemaIntrospector`](crate::metadata::SchemaIntrospector) supertrait).
//! All calls block the calling thread; a connection has exactly one
//! logical owner at a time.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SqlMapperError;
use crate::metadata::SchemaIntrospector;
use crate::types::RowValues;

/// Transaction isolation, passed through to the driver unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::ReadCommitted
    }
}

/// A live query result, consumed forward-only.
///
/// Implementations hold whatever driver resources back the result; drop
/// releases them.
pub trait RowCursor {
    /// Result column names, in select order.
    fn column_names(&self) -> &[String];

    /// The next row, or `None` once exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<RowValues>>, SqlMapperError>;
}

/// A blocking SQL connection.
pub trait SqlConnection: SchemaIntrospector {
    /// Execute a DML statement, returning rows affected.
    fn execute_dml(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, SqlMapperError>;

    /// Execute a parameterless script of one or more statements.
    fn execute_script(&mut self, sql: &str) -> Result<(), SqlMapperError>;

    /// Driver-native batch execute: one prepared statement run once per
    /// parameter set. Returns rows affected per set.
    fn execute_batched_dml(
        &mut self,
        sql: &str,
        param_sets: &[Vec<RowValues>],
    ) -> Result<Vec<usize>, SqlMapperError>;

    /// Run a query, handing back a forward-only cursor.
    fn query<'c>(
        &'c mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Box<dyn RowCursor + 'c>, SqlMapperError>;

    /// Keys generated by the most recent insert on this connection.
    fn generated_keys(&mut self) -> Result<Vec<RowValues>, SqlMapperError>;

    fn begin_transaction(&mut self) -> Result<(), SqlMapperError>;

    fn commit(&mut self) -> Result<(), SqlMapperError>;

    fn rollback(&mut self) -> Result<(), SqlMapperError>;

    /// Apply an isolation level, as far as the engine supports it.
    fn set_isolation_level(&mut self, level: IsolationLevel) -> Result<(), SqlMapperError>;
}
