//! Result rows and the lazy, single-pass result cursor.
//!
//! [`LazyResultSet`] converts rows to records on demand instead of
//! materializing the whole result. It is single-owner and single-pass:
//! open until exhausted, explicitly closed, or consumed by a terminal
//! operation (`to_list`, `first`, `one`); every read after that is a
//! cursor-state error. Leaking one leaks the underlying driver resources,
//! which is a caller bug the engine cannot prevent.

use std::collections::HashMap;
use std::sync::Arc;

use crate::accessor::{ColumnToAccessorMap, Record};
use crate::canonical::CanonicalCache;
use crate::connection::RowCursor;
use crate::error::SqlMapperError;
use crate::types::RowValues;

/// A materialized row: shared column-name array plus values.
#[derive(Debug, Clone)]
pub struct Row {
    /// The column names (shared across all rows of one result set).
    pub column_names: Arc<Vec<String>>,
    /// The values for this row.
    pub values: Vec<RowValues>,
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl Row {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        let cache = Arc::new(
            column_names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect::<HashMap<_, _>>(),
        );
        Self {
            column_names,
            values,
            column_index_cache: cache,
        }
    }

    /// Index of a column by exact name.
    #[must_use]
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Value by exact column name.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Value by column index; the scalar read path.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }
}

/// An eagerly collected query result.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub rows: Vec<Row>,
    /// Rows affected, for DML passthrough results.
    pub rows_affected: usize,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            rows_affected: 0,
        }
    }

    pub fn add_row(&mut self, row: Row) {
        self.rows.push(row);
        self.rows_affected += 1;
    }

    /// Drain a cursor into a materialized result.
    pub fn from_cursor(cursor: &mut dyn RowCursor) -> Result<Self, SqlMapperError> {
        let column_names = Arc::new(cursor.column_names().to_vec());
        let mut out = ResultSet::default();
        while let Some(values) = cursor.next_row()? {
            out.add_row(Row::new(Arc::clone(&column_names), values));
        }
        Ok(out)
    }
}

fn already_closed() -> SqlMapperError {
    SqlMapperError::CursorState("result set is already closed".into())
}

/// Lazy cursor over rows converted to records of type `T`.
///
/// Every result column must map to an accessor of `T`; an unmatched
/// column is a hard mapping error, not a silent drop. (Raw-row and scalar
/// reads go through [`LazyRows`], which has no accessor requirement.)
pub struct LazyResultSet<'c, T: Record> {
    cursor: Option<Box<dyn RowCursor + 'c>>,
    accessors: Arc<ColumnToAccessorMap<T>>,
    /// (raw, canonical) per result column, precomputed at open.
    columns: Vec<(String, String)>,
    table_name: String,
}

impl<'c, T: Record> LazyResultSet<'c, T> {
    pub(crate) fn new(
        cursor: Box<dyn RowCursor + 'c>,
        accessors: Arc<ColumnToAccessorMap<T>>,
        table_name: impl Into<String>,
        cache: &CanonicalCache,
    ) -> Self {
        let columns = cursor
            .column_names()
            .iter()
            .map(|raw| (raw.clone(), cache.canonical(raw)))
            .collect();
        Self {
            cursor: Some(cursor),
            accessors,
            columns,
            table_name: table_name.into(),
        }
    }

    /// Fetch and convert the next row. Exhaustion closes the cursor and
    /// yields `Ok(None)`; any later read is a cursor-state error.
    pub fn next_record(&mut self) -> Result<Option<T>, SqlMapperError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(already_closed());
        };
        let row = match cursor.next_row() {
            Ok(row) => row,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };
        match row {
            Some(values) => match self.convert(values) {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    self.close();
                    Err(e)
                }
            },
            None => {
                self.close();
                Ok(None)
            }
        }
    }

    fn convert(&self, values: Vec<RowValues>) -> Result<T, SqlMapperError> {
        let mut record = T::default();
        for ((raw, canonical), value) in self.columns.iter().zip(values) {
            let accessor = self.accessors.get(canonical).ok_or_else(|| {
                SqlMapperError::no_accessor(&self.table_name, raw, self.accessors.type_name())
            })?;
            accessor.set(&mut record, value)?;
        }
        Ok(record)
    }

    /// Terminal: collect every remaining row and close.
    pub fn to_list(mut self) -> Result<Vec<T>, SqlMapperError> {
        let mut out = Vec::new();
        while let Some(record) = self.next_record()? {
            out.push(record);
        }
        Ok(out)
    }

    /// Terminal: first row (if any), discard the rest, close.
    pub fn first(mut self) -> Result<Option<T>, SqlMapperError> {
        let record = self.next_record()?;
        self.close();
        Ok(record)
    }

    /// Terminal: exactly one row, or a cursor-state error for zero or
    /// multiple rows. Closes either way.
    pub fn one(mut self) -> Result<T, SqlMapperError> {
        let first = self.next_record()?.ok_or_else(|| {
            SqlMapperError::CursorState("expected exactly one row, got none".into())
        })?;
        if !self.is_closed() && self.next_record()?.is_some() {
            self.close();
            return Err(SqlMapperError::CursorState(
                "non-unique result: expected exactly one row".into(),
            ));
        }
        self.close();
        Ok(first)
    }

    /// Forward-only iteration; fuses after exhaustion or an error.
    pub fn iter(&mut self) -> LazyIter<'_, 'c, T> {
        LazyIter {
            inner: self,
            done: false,
        }
    }

    /// Release the underlying cursor. Idempotent.
    pub fn close(&mut self) {
        self.cursor = None;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }
}

/// Iterator view over a [`LazyResultSet`].
pub struct LazyIter<'a, 'c, T: Record> {
    inner: &'a mut LazyResultSet<'c, T>,
    done: bool,
}

impl<T: Record> Iterator for LazyIter<'_, '_, T> {
    type Item = Result<T, SqlMapperError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Lazy cursor over raw [`Row`]s; no accessor requirement, used for
/// map-style and scalar reads.
pub struct LazyRows<'c> {
    cursor: Option<Box<dyn RowCursor + 'c>>,
    column_names: Arc<Vec<String>>,
}

impl<'c> LazyRows<'c> {
    pub(crate) fn new(cursor: Box<dyn RowCursor + 'c>) -> Self {
        let column_names = Arc::new(cursor.column_names().to_vec());
        Self {
            cursor: Some(cursor),
            column_names,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn next_row(&mut self) -> Result<Option<Row>, SqlMapperError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(already_closed());
        };
        match cursor.next_row() {
            Ok(Some(values)) => Ok(Some(Row::new(Arc::clone(&self.column_names), values))),
            Ok(None) => {
                self.close();
                Ok(None)
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    pub fn to_list(mut self) -> Result<Vec<Row>, SqlMapperError> {
        let mut out = Vec::new();
        while let Some(row) = self.next_row()? {
            out.push(row);
        }
        Ok(out)
    }

    pub fn first(mut self) -> Result<Option<Row>, SqlMapperError> {
        let row = self.next_row()?;
        self.close();
        Ok(row)
    }

    pub fn one(mut self) -> Result<Row, SqlMapperError> {
        let first = self.next_row()?.ok_or_else(|| {
            SqlMapperError::CursorState("expected exactly one row, got none".into())
        })?;
        if !self.is_closed() && self.next_row()?.is_some() {
            self.close();
            return Err(SqlMapperError::CursorState(
                "non-unique result: expected exactly one row".into(),
            ));
        }
        self.close();
        Ok(first)
    }

    pub fn close(&mut self) {
        self.cursor = None;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }
}
