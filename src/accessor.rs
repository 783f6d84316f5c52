//! Field accessors and the per-record-type accessor map.
//!
//! A [`FieldAccessor`] pairs a read and a write capability for one field of
//! a record type. Record types register their accessors once through the
//! [`Record`] trait; the registration is plain code (no runtime
//! reflection), so missing getters or setters are represented explicitly
//! and only fail when the missing side is actually invoked.

use std::collections::HashMap;

use crate::canonical::CanonicalCache;
use crate::error::SqlMapperError;
use crate::types::RowValues;

/// Read one field of a record as a backend-neutral value.
pub type Getter<T> = fn(&T) -> RowValues;

/// Write one field of a record from a backend-neutral value. Conversion
/// failures surface as mapping errors.
pub type Setter<T> = fn(&mut T, RowValues) -> Result<(), SqlMapperError>;

/// A paired read/write capability bound to one field of a record type.
///
/// Built via [`FieldAccessor::field`] (named after the record field) or
/// [`FieldAccessor::column`] (explicitly named after the table column,
/// which wins over a plain field registration when both canonicalize to
/// the same key).
pub struct FieldAccessor<T> {
    name: String,
    explicit: bool,
    getter: Option<Getter<T>>,
    setter: Option<Setter<T>>,
}

impl<T> FieldAccessor<T> {
    /// Accessor named after a record field; the canonical form of the name
    /// is matched against table columns.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            explicit: false,
            getter: None,
            setter: None,
        }
    }

    /// Accessor with an explicit column-name override. Overrides a plain
    /// [`FieldAccessor::field`] registration for the same canonical key.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            explicit: true,
            ..Self::field(name)
        }
    }

    #[must_use]
    pub fn with_get(mut self, getter: Getter<T>) -> Self {
        self.getter = Some(getter);
        self
    }

    #[must_use]
    pub fn with_set(mut self, setter: Setter<T>) -> Self {
        self.setter = Some(setter);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the field value, or fail with a mapping error if no getter was
    /// registered for this accessor.
    pub fn get(&self, instance: &T) -> Result<RowValues, SqlMapperError> {
        match self.getter {
            Some(getter) => Ok(getter(instance)),
            None => Err(SqlMapperError::Mapping(format!(
                "accessor [{}] has no getter",
                self.name
            ))),
        }
    }

    /// Write the field value, or fail with a mapping error if no setter was
    /// registered for this accessor.
    pub fn set(&self, instance: &mut T, value: RowValues) -> Result<(), SqlMapperError> {
        match self.setter {
            Some(setter) => setter(instance, value),
            None => Err(SqlMapperError::Mapping(format!(
                "accessor [{}] has no setter",
                self.name
            ))),
        }
    }
}

impl<T> std::fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .field("explicit", &self.explicit)
            .field("has_getter", &self.getter.is_some())
            .field("has_setter", &self.setter.is_some())
            .finish()
    }
}

/// A record type that maps to a table.
///
/// Implementations register their accessors once; the engine builds and
/// caches the canonical accessor map per type for the lifetime of the
/// owning `MappingContext`. `Default` supplies the blank instance the
/// result cursor fills when converting rows back into records.
pub trait Record: Default + Send + Sized + 'static {
    /// Simple type name, used to derive table-name candidates.
    fn type_name() -> &'static str;

    /// Accessor registration, one entry per mapped field.
    fn accessors() -> Vec<FieldAccessor<Self>>;

    /// Explicit table-name override (skips candidate guessing).
    fn table_name() -> Option<&'static str> {
        None
    }

    /// Explicit column alias prefix; defaults to the canonical type name.
    fn column_alias_prefix() -> Option<&'static str> {
        None
    }
}

/// Mapping from canonical column name to accessor for one record type.
///
/// Immutable after build; cached per record type.
pub struct ColumnToAccessorMap<T> {
    type_name: &'static str,
    map: HashMap<String, FieldAccessor<T>>,
}

impl<T: Record> ColumnToAccessorMap<T> {
    /// Build the map from the type's registered accessors.
    ///
    /// When several accessors collapse to one canonical key, an explicit
    /// column registration displaces a plain field one; entries of equal
    /// standing merge their get/set sides (the later registration wins per
    /// side).
    #[must_use]
    pub fn build(cache: &CanonicalCache) -> Self {
        let mut map: HashMap<String, FieldAccessor<T>> = HashMap::new();
        for accessor in T::accessors() {
            let key = cache.canonical(accessor.name());
            match map.get_mut(&key) {
                None => {
                    map.insert(key, accessor);
                }
                Some(existing) => {
                    if existing.explicit && !accessor.explicit {
                        continue;
                    }
                    if accessor.explicit && !existing.explicit {
                        *existing = accessor;
                        continue;
                    }
                    // Equal standing: merge sides.
                    if accessor.getter.is_some() {
                        existing.getter = accessor.getter;
                    }
                    if accessor.setter.is_some() {
                        existing.setter = accessor.setter;
                    }
                    existing.name = accessor.name;
                }
            }
        }
        Self {
            type_name: T::type_name(),
            map,
        }
    }
}

impl<T> ColumnToAccessorMap<T> {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Look up by already-canonical key.
    #[must_use]
    pub fn get(&self, canonical_name: &str) -> Option<&FieldAccessor<T>> {
        self.map.get(canonical_name)
    }

    /// Look up by raw column name, canonicalizing through the cache.
    #[must_use]
    pub fn for_column(&self, cache: &CanonicalCache, column: &str) -> Option<&FieldAccessor<T>> {
        self.map.get(&cache.canonical(column))
    }

    /// Canonical keys of every registered accessor.
    pub fn canonical_names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<T> std::fmt::Debug for ColumnToAccessorMap<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnToAccessorMap")
            .field("type_name", &self.type_name)
            .field("keys", &self.map.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Player {
        id: i64,
        name: String,
    }

    impl Record for Player {
        fn type_name() -> &'static str {
            "Player"
        }

        fn accessors() -> Vec<FieldAccessor<Self>> {
            vec![
                FieldAccessor::field("id")
                    .with_get(|p: &Player| RowValues::Int(p.id))
                    .with_set(|p, v| {
                        p.id = *v.as_int().ok_or_else(|| {
                            SqlMapperError::Mapping("id expects an integer".into())
                        })?;
                        Ok(())
                    }),
                FieldAccessor::field("name")
                    .with_get(|p: &Player| RowValues::Text(p.name.clone()))
                    .with_set(|p, v| {
                        p.name = v
                            .as_text()
                            .ok_or_else(|| SqlMapperError::Mapping("name expects text".into()))?
                            .to_string();
                        Ok(())
                    }),
            ]
        }
    }

    #[test]
    fn round_trip_leaves_instance_unchanged() {
        let cache = CanonicalCache::new();
        let map = ColumnToAccessorMap::<Player>::build(&cache);
        let mut p = Player {
            id: 7,
            name: "alice".into(),
        };
        for key in ["ID", "NAME"] {
            let accessor = map.get(key).unwrap();
            let value = accessor.get(&p).unwrap();
            accessor.set(&mut p, value).unwrap();
        }
        assert_eq!(p.id, 7);
        assert_eq!(p.name, "alice");
    }

    #[test]
    fn lookup_is_format_insensitive() {
        let cache = CanonicalCache::new();
        let map = ColumnToAccessorMap::<Player>::build(&cache);
        assert!(map.for_column(&cache, "Name").is_some());
        assert!(map.for_column(&cache, "NAME").is_some());
        assert!(map.for_column(&cache, "missing").is_none());
    }

    #[derive(Default)]
    struct Renamed {
        code: i64,
    }

    impl Record for Renamed {
        fn type_name() -> &'static str {
            "Renamed"
        }

        fn accessors() -> Vec<FieldAccessor<Self>> {
            vec![
                // Plain registration loses to the explicit column below.
                FieldAccessor::field("legacyCode").with_get(|_| RowValues::Int(0)),
                FieldAccessor::column("LEGACY_CODE")
                    .with_get(|r: &Renamed| RowValues::Int(r.code)),
            ]
        }
    }

    #[test]
    fn explicit_column_overrides_plain_field() {
        let cache = CanonicalCache::new();
        let map = ColumnToAccessorMap::<Renamed>::build(&cache);
        let r = Renamed { code: 9 };
        let accessor = map.get("LEGACY_CODE").unwrap();
        assert_eq!(accessor.get(&r).unwrap(), RowValues::Int(9));
    }

    #[test]
    fn missing_side_fails_on_invoke() {
        let cache = CanonicalCache::new();
        let map = ColumnToAccessorMap::<Renamed>::build(&cache);
        let mut r = Renamed { code: 9 };
        let accessor = map.get("LEGACY_CODE").unwrap();
        let err = accessor.set(&mut r, RowValues::Int(1)).unwrap_err();
        assert!(err.to_string().contains("no setter"));
    }
}
