use thiserror::Error;

/// Error taxonomy for the mapping engine.
///
/// Everything is fatal-by-default and carries its cause; nothing is
/// silently swallowed. The one deliberately lenient path is named-parameter
/// resolution, which leaves unmatched names in the SQL text instead of
/// raising (see `parameterized`).
#[derive(Debug, Error)]
pub enum SqlMapperError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    /// Accessor/column mismatch, missing primary key for an operation that
    /// requires one, or an invoked accessor side that was never registered.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// No table in the live schema matched any name candidate.
    #[error("Unresolved table: {0}")]
    UnresolvedTable(String),

    /// Failure reported by the underlying connection during execution.
    #[error("SQL execution error: {0}")]
    Execution(String),

    /// Operation on a closed cursor, or zero/multiple rows where exactly
    /// one was required.
    #[error("Cursor state error: {0}")]
    CursorState(String),

    /// Parameter binding or placeholder expansion failure.
    #[error("Parameter error: {0}")]
    Parameter(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SqlMapperError {
    /// Mapping error for a result column that resolved to no accessor.
    pub(crate) fn no_accessor(table: &str, column: &str, type_name: &str) -> Self {
        SqlMapperError::Mapping(format!(
            "column [{column}] of table [{table}] has no matching accessor on [{type_name}]"
        ))
    }
}
