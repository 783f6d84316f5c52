//! Multi-record write strategies.
//!
//! Inserting or merging a sequence of records can run as a driver batch,
//! as multi-row `values` statements, or as batches of multi-row
//! statements. All three produce identical table state; they differ only
//! in round-trips and statement shape. Chunk boundaries are handled so a
//! trailing partial chunk gets its own statement sized to the remainder.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connection::SqlConnection;
use crate::error::SqlMapperError;
use crate::table_sql::TableSql;
use crate::types::RowValues;

/// How a multi-record write is shipped to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum MultiRowStrategy {
    /// One prepared statement, executed once per record via driver batching.
    SimpleBatch,
    /// Multi-row `values` statements, one execution per chunk.
    MultiRowValues,
    /// Multi-row statements grouped into driver batches.
    MultiRowAndBatch,
}

impl Default for MultiRowStrategy {
    fn default() -> Self {
        MultiRowStrategy::MultiRowValues
    }
}

/// Strategy selection plus chunk sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiRowConfig {
    pub strategy: MultiRowStrategy,
    /// Records per driver batch for [`MultiRowStrategy::SimpleBatch`].
    pub batch_size: usize,
    /// Value tuples per statement for the multi-row strategies.
    pub multi_row_size: usize,
    /// Statements per driver batch for [`MultiRowStrategy::MultiRowAndBatch`].
    pub batch_size_with_multi_row: usize,
}

impl Default for MultiRowConfig {
    fn default() -> Self {
        Self {
            strategy: MultiRowStrategy::default(),
            batch_size: 32,
            multi_row_size: 32,
            batch_size_with_multi_row: 5,
        }
    }
}

/// Which generated statement family a multi-record write uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MultiRowOp {
    Insert,
    Merge,
}

/// Run a multi-record write over `records`, chunked per `config`.
///
/// `bind` produces one record's values in the operation's column binding
/// order. Returns the rows-modified count of each statement execution, in
/// order. Zero records short-circuits without touching the connection.
pub(crate) fn process_multirow<T, C>(
    conn: &mut C,
    config: &MultiRowConfig,
    table_sql: &TableSql,
    op: MultiRowOp,
    bind: impl Fn(&T) -> Result<Vec<RowValues>, SqlMapperError>,
    records: &[T],
) -> Result<Vec<usize>, SqlMapperError>
where
    C: SqlConnection + ?Sized,
{
    if records.is_empty() {
        return Ok(Vec::new());
    }

    // Surface the deferred merge error before any SQL runs.
    let single_sql = match op {
        MultiRowOp::Insert => table_sql.insert().to_string(),
        MultiRowOp::Merge => table_sql.merge()?.to_string(),
    };
    let multirow_sql = |rows: usize| -> Result<String, SqlMapperError> {
        match op {
            MultiRowOp::Insert => Ok(table_sql.multirow_insert(rows)),
            MultiRowOp::Merge => table_sql.multirow_merge(rows),
        }
    };

    let counts = match config.strategy {
        MultiRowStrategy::SimpleBatch => {
            let mut counts = Vec::with_capacity(records.len());
            for chunk in records.chunks(config.batch_size.max(1)) {
                let param_sets = bind_chunk(chunk, &bind)?;
                counts.extend(conn.execute_batched_dml(&single_sql, &param_sets)?);
            }
            counts
        }
        MultiRowStrategy::MultiRowValues => {
            let mut counts = Vec::new();
            for chunk in records.chunks(config.multi_row_size.max(1)) {
                let sql = multirow_sql(chunk.len())?;
                let params = bind_flattened(chunk, &bind)?;
                counts.push(conn.execute_dml(&sql, &params)?);
            }
            counts
        }
        MultiRowStrategy::MultiRowAndBatch => {
            process_batched_multirow(conn, config, multirow_sql, &bind, records)?
        }
    };

    debug!(
        strategy = ?config.strategy,
        records = records.len(),
        executions = counts.len(),
        "multi-record write complete"
    );
    Ok(counts)
}

/// Full-size chunks share one statement and go through driver batching;
/// the trailing partial chunk (if any) is re-prepared at its own width.
fn process_batched_multirow<T, C>(
    conn: &mut C,
    config: &MultiRowConfig,
    multirow_sql: impl Fn(usize) -> Result<String, SqlMapperError>,
    bind: &impl Fn(&T) -> Result<Vec<RowValues>, SqlMapperError>,
    records: &[T],
) -> Result<Vec<usize>, SqlMapperError>
where
    C: SqlConnection + ?Sized,
{
    let row_size = config.multi_row_size.max(1);
    let full = records.len() / row_size * row_size;
    let (full_part, remainder) = records.split_at(full);

    let mut counts = Vec::new();
    if !full_part.is_empty() {
        let sql = multirow_sql(row_size)?;
        let chunks: Vec<&[T]> = full_part.chunks(row_size).collect();
        for batch in chunks.chunks(config.batch_size_with_multi_row.max(1)) {
            let mut param_sets = Vec::with_capacity(batch.len());
            for chunk in batch {
                param_sets.push(bind_flattened(chunk, bind)?);
            }
            counts.extend(conn.execute_batched_dml(&sql, &param_sets)?);
        }
    }
    if !remainder.is_empty() {
        let sql = multirow_sql(remainder.len())?;
        let params = bind_flattened(remainder, bind)?;
        counts.push(conn.execute_dml(&sql, &params)?);
    }
    Ok(counts)
}

fn bind_chunk<T>(
    chunk: &[T],
    bind: &impl Fn(&T) -> Result<Vec<RowValues>, SqlMapperError>,
) -> Result<Vec<Vec<RowValues>>, SqlMapperError> {
    chunk.iter().map(bind).collect()
}

fn bind_flattened<T>(
    chunk: &[T],
    bind: &impl Fn(&T) -> Result<Vec<RowValues>, SqlMapperError>,
) -> Result<Vec<RowValues>, SqlMapperError> {
    let mut out = Vec::new();
    for record in chunk {
        out.extend(bind(record)?);
    }
    Ok(out)
}
