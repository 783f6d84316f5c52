//! Table metadata resolved against the live schema.
//!
//! A record type (or an explicit name) is reconciled with what the
//! database actually reports: exact table name, ordered column list,
//! primary-key columns, and auto-generated columns. Resolution is cached
//! by the owning `MappingContext` and is stable for the process lifetime;
//! schema drift requires a new context, not cache invalidation.

use tracing::debug;

use crate::canonical::CanonicalCache;
use crate::error::SqlMapperError;

/// One column as reported by schema introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetaData {
    /// Column name exactly as the schema spells it.
    pub name: String,
    /// Engine type name (informational; dialects may branch on it).
    pub type_name: String,
    /// Whether the engine generates this column's value on insert.
    pub auto_generated: bool,
}

/// Resolved metadata for one table. Immutable after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetaData {
    table_name: String,
    columns: Vec<ColumnMetaData>,
    primary_keys: Vec<String>,
    column_alias_prefix: String,
}

impl TableMetaData {
    /// Assemble metadata, enforcing that primary-key and auto-generated
    /// columns are subsets of the column list.
    pub fn new(
        table_name: impl Into<String>,
        columns: Vec<ColumnMetaData>,
        primary_keys: Vec<String>,
        column_alias_prefix: impl Into<String>,
    ) -> Result<Self, SqlMapperError> {
        let table_name = table_name.into();
        for pk in &primary_keys {
            if !columns.iter().any(|c| &c.name == pk) {
                return Err(SqlMapperError::Mapping(format!(
                    "primary key column [{pk}] is not a column of table [{table_name}]"
                )));
            }
        }
        Ok(Self {
            table_name,
            columns,
            primary_keys,
            column_alias_prefix: column_alias_prefix.into(),
        })
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Column names in schema order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn columns_meta(&self) -> &[ColumnMetaData] {
        &self.columns
    }

    #[must_use]
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    #[must_use]
    pub fn has_primary_key(&self) -> bool {
        !self.primary_keys.is_empty()
    }

    pub fn auto_generated_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.auto_generated)
            .map(|c| c.name.as_str())
    }

    /// Columns the caller must supply on insert.
    pub fn not_auto_generated_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| !c.auto_generated)
            .map(|c| c.name.as_str())
    }

    /// Columns outside the primary key (the `update ... set` targets).
    pub fn not_primary_keys(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .filter(|name| !self.primary_keys.iter().any(|pk| pk == name))
    }

    #[must_use]
    pub fn column_alias_prefix(&self) -> &str {
        &self.column_alias_prefix
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Live schema introspection, supplied by the backing connection.
pub trait SchemaIntrospector {
    /// All table and view names visible to the connection.
    fn table_names(&mut self) -> Result<Vec<String>, SqlMapperError>;

    /// Columns of one table, in schema order.
    fn columns(&mut self, table: &str) -> Result<Vec<ColumnMetaData>, SqlMapperError>;

    /// Primary-key column names of one table.
    fn primary_keys(&mut self, table: &str) -> Result<Vec<String>, SqlMapperError>;
}

/// What to resolve: an explicit name or a type name to guess from.
#[derive(Debug, Clone)]
pub struct TableNameSpec<'a> {
    /// Explicit table-name override; skips candidate guessing.
    pub explicit_name: Option<&'a str>,
    /// Simple record type name, basis for guessed candidates.
    pub type_name: &'a str,
    /// Explicit alias prefix override.
    pub alias_prefix: Option<&'a str>,
}

/// Build the ordered candidate list for a type name: the canonical name
/// itself, then the `S`/`ES` plurals, then `...Y` -> `...IES` when it
/// applies.
#[must_use]
pub fn table_name_candidates(cache: &CanonicalCache, type_name: &str) -> Vec<String> {
    let canonical = cache.canonical(type_name);
    let mut candidates = vec![
        canonical.clone(),
        cache.canonical(&format!("{canonical}S")),
        cache.canonical(&format!("{canonical}ES")),
    ];
    if let Some(stem) = canonical.strip_suffix('Y') {
        candidates.push(cache.canonical(&format!("{stem}IES")));
    }
    candidates
}

/// Reconcile a name spec with the live schema and fetch the table's
/// column, primary-key, and auto-generated-column lists.
pub fn resolve_table_metadata<I: SchemaIntrospector + ?Sized>(
    introspector: &mut I,
    cache: &CanonicalCache,
    spec: &TableNameSpec<'_>,
) -> Result<TableMetaData, SqlMapperError> {
    let candidates = match spec.explicit_name {
        Some(name) => vec![name.to_string()],
        None => table_name_candidates(cache, spec.type_name),
    };

    let schema_names = introspector.table_names()?;
    let exact = schema_names
        .iter()
        .find(|schema_name| {
            candidates
                .iter()
                .any(|candidate| cache.equals_canonical(schema_name, candidate))
        })
        .cloned()
        .ok_or_else(|| {
            SqlMapperError::UnresolvedTable(format!(
                "[{}] does not match any table in the database; candidates were {candidates:?}",
                spec.type_name
            ))
        })?;

    let columns = introspector.columns(&exact)?;
    if columns.is_empty() {
        return Err(SqlMapperError::UnresolvedTable(format!(
            "table [{exact}] reports no columns"
        )));
    }
    let primary_keys = introspector.primary_keys(&exact)?;
    let alias_prefix = spec
        .alias_prefix
        .map(String::from)
        .unwrap_or_else(|| cache.canonical(spec.type_name));

    debug!(
        table = %exact,
        columns = columns.len(),
        primary_keys = primary_keys.len(),
        "resolved table metadata"
    );
    TableMetaData::new(exact, columns, primary_keys, alias_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSchema;

    impl SchemaIntrospector for FakeSchema {
        fn table_names(&mut self) -> Result<Vec<String>, SqlMapperError> {
            Ok(vec!["guests".into(), "categories".into(), "matches".into()])
        }

        fn columns(&mut self, table: &str) -> Result<Vec<ColumnMetaData>, SqlMapperError> {
            let _ = table;
            Ok(vec![
                ColumnMetaData {
                    name: "id".into(),
                    type_name: "INTEGER".into(),
                    auto_generated: true,
                },
                ColumnMetaData {
                    name: "name".into(),
                    type_name: "TEXT".into(),
                    auto_generated: false,
                },
            ])
        }

        fn primary_keys(&mut self, _table: &str) -> Result<Vec<String>, SqlMapperError> {
            Ok(vec!["id".into()])
        }
    }

    fn spec(type_name: &str) -> TableNameSpec<'_> {
        TableNameSpec {
            explicit_name: None,
            type_name,
            alias_prefix: None,
        }
    }

    #[test]
    fn plural_s_candidate_matches() {
        let cache = CanonicalCache::new();
        let meta = resolve_table_metadata(&mut FakeSchema, &cache, &spec("Guest")).unwrap();
        assert_eq!(meta.table_name(), "guests");
        assert_eq!(meta.primary_keys(), ["id"]);
        assert!(meta.has_primary_key());
    }

    #[test]
    fn y_to_ies_candidate_matches() {
        let cache = CanonicalCache::new();
        let meta = resolve_table_metadata(&mut FakeSchema, &cache, &spec("Category")).unwrap();
        assert_eq!(meta.table_name(), "categories");
    }

    #[test]
    fn es_candidate_matches() {
        let cache = CanonicalCache::new();
        let meta = resolve_table_metadata(&mut FakeSchema, &cache, &spec("Match")).unwrap();
        assert_eq!(meta.table_name(), "matches");
    }

    #[test]
    fn unresolved_name_lists_candidates() {
        let cache = CanonicalCache::new();
        let err = resolve_table_metadata(&mut FakeSchema, &cache, &spec("Nothing")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("NOTHING"), "{msg}");
        assert!(msg.contains("NOTHINGS"), "{msg}");
    }

    #[test]
    fn subset_invariants_enforced() {
        let err = TableMetaData::new(
            "t",
            vec![ColumnMetaData {
                name: "a".into(),
                type_name: "TEXT".into(),
                auto_generated: false,
            }],
            vec!["zz".into()],
            "T",
        )
        .unwrap_err();
        assert!(err.to_string().contains("not a column"));
    }

    #[test]
    fn derived_column_views() {
        let cache = CanonicalCache::new();
        let meta = resolve_table_metadata(&mut FakeSchema, &cache, &spec("Guest")).unwrap();
        assert_eq!(meta.columns().collect::<Vec<_>>(), ["id", "name"]);
        assert_eq!(meta.auto_generated_columns().collect::<Vec<_>>(), ["id"]);
        assert_eq!(meta.not_auto_generated_columns().collect::<Vec<_>>(), ["name"]);
        assert_eq!(meta.not_primary_keys().collect::<Vec<_>>(), ["name"]);
        assert_eq!(meta.column_alias_prefix(), "GUEST");
    }
}
