//! A lightweight object-relational mapping engine over blocking SQL
//! connections.
//!
//! Record types register their field accessors in plain code; table
//! metadata is resolved against the live schema; CRUD statements are
//! generated once per table and cached by a shared [`MappingContext`].
//! Reads come back through a lazy, single-pass cursor, and multi-record
//! writes can batch or collapse into multi-row statements.
//!
//! [`MappingContext`]: context::MappingContext

pub mod accessor;
pub mod canonical;
pub mod connection;
pub mod context;
pub mod cursor;
pub mod dialect;
pub mod error;
pub mod metadata;
pub mod multirow;
pub mod parameterized;
pub mod query_builder;
pub mod session;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod table_sql;
pub mod types;

pub mod prelude;

pub use error::SqlMapperError;
pub use types::{ParameterizedSql, RowValues};
