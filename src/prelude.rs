//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::accessor::{ColumnToAccessorMap, FieldAccessor, Record};
pub use crate::canonical::{CanonicalCache, canonicalize};
pub use crate::connection::{IsolationLevel, RowCursor, SqlConnection};
pub use crate::context::{MappingContext, TableMapping};
pub use crate::cursor::{LazyResultSet, LazyRows, ResultSet, Row};
pub use crate::dialect::{AnsiMergeDialect, Dialect, SqliteDialect};
pub use crate::error::SqlMapperError;
pub use crate::metadata::{ColumnMetaData, SchemaIntrospector, TableMetaData};
pub use crate::multirow::{MultiRowConfig, MultiRowStrategy};
pub use crate::parameterized::{NamedParameterSql, SqlArg, parse};
pub use crate::query_builder::QueryBuilder;
pub use crate::session::Session;
pub use crate::table_sql::TableSql;
pub use crate::types::{ParameterizedSql, RowValues};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteConnection;
