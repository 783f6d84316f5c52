//! The mapping context: configuration plus per-type caches.
//!
//! Everything the engine caches lives here rather than in process-global
//! state, so two contexts with different dialects or naming conventions
//! coexist in one process. Accessor maps and table mappings are built on
//! first use per record type and reused for the context's lifetime;
//! schema drift requires a new context.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::accessor::{ColumnToAccessorMap, Record};
use crate::canonical::CanonicalCache;
use crate::connection::IsolationLevel;
use crate::dialect::{Dialect, SqliteDialect};
use crate::error::SqlMapperError;
use crate::metadata::{SchemaIntrospector, TableMetaData, TableNameSpec, resolve_table_metadata};
use crate::multirow::MultiRowConfig;
use crate::table_sql::TableSql;
use crate::types::RowValues;

type AnyCache = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

/// Shared engine state: configuration, canonical-name cache, and the
/// per-record-type accessor and table-mapping caches.
pub struct MappingContext {
    canonical: CanonicalCache,
    dialect: Arc<dyn Dialect>,
    multi_row: MultiRowConfig,
    isolation: IsolationLevel,
    accessor_maps: AnyCache,
    mappings: AnyCache,
}

impl Default for MappingContext {
    fn default() -> Self {
        Self {
            canonical: CanonicalCache::new(),
            dialect: Arc::new(SqliteDialect),
            multi_row: MultiRowConfig::default(),
            isolation: IsolationLevel::default(),
            accessor_maps: RwLock::new(HashMap::new()),
            mappings: RwLock::new(HashMap::new()),
        }
    }
}

impl MappingContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn with_multi_row(mut self, config: MultiRowConfig) -> Self {
        self.multi_row = config;
        self
    }

    #[must_use]
    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation = level;
        self
    }

    #[must_use]
    pub fn canonical_cache(&self) -> &CanonicalCache {
        &self.canonical
    }

    #[must_use]
    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    #[must_use]
    pub fn multi_row(&self) -> &MultiRowConfig {
        &self.multi_row
    }

    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    /// The accessor map for `T`, built on first use.
    pub fn accessor_map<T: Record>(&self) -> Arc<ColumnToAccessorMap<T>> {
        if let Ok(read) = self.accessor_maps.read()
            && let Some(cached) = read.get(&TypeId::of::<T>())
            && let Ok(map) = Arc::clone(cached).downcast::<ColumnToAccessorMap<T>>()
        {
            return map;
        }
        let built = Arc::new(ColumnToAccessorMap::<T>::build(&self.canonical));
        if let Ok(mut write) = self.accessor_maps.write() {
            write.insert(
                TypeId::of::<T>(),
                Arc::clone(&built) as Arc<dyn Any + Send + Sync>,
            );
        }
        built
    }

    /// The table mapping for `T`, resolved against the live schema on
    /// first use and cached thereafter.
    pub fn mapping<T, I>(&self, introspector: &mut I) -> Result<Arc<TableMapping<T>>, SqlMapperError>
    where
        T: Record,
        I: SchemaIntrospector + ?Sized,
    {
        if let Ok(read) = self.mappings.read()
            && let Some(cached) = read.get(&TypeId::of::<T>())
            && let Ok(mapping) = Arc::clone(cached).downcast::<TableMapping<T>>()
        {
            return Ok(mapping);
        }

        let spec = TableNameSpec {
            explicit_name: T::table_name(),
            type_name: T::type_name(),
            alias_prefix: T::column_alias_prefix(),
        };
        let meta = resolve_table_metadata(introspector, &self.canonical, &spec)?;
        let accessors = self.accessor_map::<T>();
        let built = Arc::new(TableMapping::new(
            meta,
            accessors,
            self.dialect.as_ref(),
            &self.canonical,
        )?);
        debug!(
            record_type = T::type_name(),
            table = built.table_name(),
            "built table mapping"
        );
        if let Ok(mut write) = self.mappings.write() {
            write.insert(
                TypeId::of::<T>(),
                Arc::clone(&built) as Arc<dyn Any + Send + Sync>,
            );
        }
        Ok(built)
    }
}

impl std::fmt::Debug for MappingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingContext")
            .field("dialect", &self.dialect.name())
            .field("multi_row", &self.multi_row)
            .field("isolation", &self.isolation)
            .finish_non_exhaustive()
    }
}

/// Everything needed to map one record type onto one table: resolved
/// metadata, the accessor map, and the generated statement set.
pub struct TableMapping<T: Record> {
    meta: TableMetaData,
    accessors: Arc<ColumnToAccessorMap<T>>,
    sql: TableSql,
    /// Canonical form of each table column, in schema order.
    canonical_columns: HashMap<String, String>,
}

impl<T: Record> TableMapping<T> {
    /// Validate that every table column has an accessor, then derive the
    /// statement set. A mismatch is fatal at first use, not at row time.
    fn new(
        meta: TableMetaData,
        accessors: Arc<ColumnToAccessorMap<T>>,
        dialect: &dyn Dialect,
        cache: &CanonicalCache,
    ) -> Result<Self, SqlMapperError> {
        let mut canonical_columns = HashMap::new();
        let mut unmatched = Vec::new();
        for column in meta.columns() {
            let canonical = cache.canonical(column);
            if accessors.get(&canonical).is_none() {
                unmatched.push(column.to_string());
            }
            canonical_columns.insert(column.to_string(), canonical);
        }
        if !unmatched.is_empty() {
            return Err(SqlMapperError::Mapping(format!(
                "columns {unmatched:?} of table [{}] have no accessor on type [{}]; registered accessors are {:?}",
                meta.table_name(),
                accessors.type_name(),
                accessors.canonical_names().collect::<Vec<_>>()
            )));
        }
        let sql = TableSql::create(&meta, dialect);
        Ok(Self {
            meta,
            accessors,
            sql,
            canonical_columns,
        })
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        self.meta.table_name()
    }

    #[must_use]
    pub fn metadata(&self) -> &TableMetaData {
        &self.meta
    }

    #[must_use]
    pub fn sql(&self) -> &TableSql {
        &self.sql
    }

    #[must_use]
    pub fn accessors(&self) -> &Arc<ColumnToAccessorMap<T>> {
        &self.accessors
    }

    /// Read record values for `columns`, in order. The binding path for
    /// every generated statement.
    pub fn bind_values(
        &self,
        record: &T,
        columns: &[String],
    ) -> Result<Vec<RowValues>, SqlMapperError> {
        columns
            .iter()
            .map(|column| {
                let accessor = self.accessor_for(column)?;
                accessor.get(record)
            })
            .collect()
    }

    /// Write one column's value onto a record (generated-key write-back).
    pub fn set_value(
        &self,
        record: &mut T,
        column: &str,
        value: RowValues,
    ) -> Result<(), SqlMapperError> {
        self.accessor_for(column)?.set(record, value)
    }

    fn accessor_for(
        &self,
        column: &str,
    ) -> Result<&crate::accessor::FieldAccessor<T>, SqlMapperError> {
        let canonical = self
            .canonical_columns
            .get(column)
            .cloned()
            .unwrap_or_else(|| crate::canonical::canonicalize(column));
        self.accessors.get(&canonical).ok_or_else(|| {
            SqlMapperError::no_accessor(self.meta.table_name(), column, self.accessors.type_name())
        })
    }
}

impl<T: Record> std::fmt::Debug for TableMapping<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableMapping")
            .field("table", &self.meta.table_name())
            .field("type", &self.accessors.type_name())
            .finish_non_exhaustive()
    }
}
