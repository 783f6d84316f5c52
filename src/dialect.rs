//! Engine-specific SQL syntax.
//!
//! The only statement whose grammar genuinely diverges across engines is
//! `merge` (insert-or-update keyed by primary key), so it is the pluggable
//! point: each dialect renders the statement as a prefix and suffix around
//! the value-tuple group, which lets the multirow processor splice in any
//! number of tuples.

use crate::metadata::TableMetaData;

/// Merge statement parts. A single-row statement is
/// `prefix + "(?,...,?)" + suffix`; a multi-row statement repeats the
/// tuple group.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeTemplate {
    pub prefix: String,
    pub suffix: String,
}

/// SQL syntax knobs for one backing engine.
pub trait Dialect: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Merge template for a table; callers guarantee the table has a
    /// primary key. `None` means the engine has no merge form.
    fn merge_template(&self, meta: &TableMetaData) -> Option<MergeTemplate>;
}

/// SQLite: merge is spelled as an upsert
/// (`insert ... on conflict (pk) do update set c = excluded.c`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn merge_template(&self, meta: &TableMetaData) -> Option<MergeTemplate> {
        let columns: Vec<&str> = meta.columns().collect();
        let prefix = format!(
            "insert into {} ({}) values ",
            meta.table_name(),
            columns.join(",")
        );
        let updates: Vec<String> = meta
            .not_primary_keys()
            .map(|c| format!("{c}=excluded.{c}"))
            .collect();
        let conflict_action = if updates.is_empty() {
            "do nothing".to_string()
        } else {
            format!("do update set {}", updates.join(","))
        };
        let suffix = format!(
            " on conflict ({}) {}",
            meta.primary_keys().join(","),
            conflict_action
        );
        Some(MergeTemplate { prefix, suffix })
    }
}

/// H2-style `merge into ... key (...) values` grammar, for engines that
/// speak the ANSI-ish merge shorthand.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiMergeDialect;

impl Dialect for AnsiMergeDialect {
    fn name(&self) -> &'static str {
        "ansi-merge"
    }

    fn merge_template(&self, meta: &TableMetaData) -> Option<MergeTemplate> {
        let columns: Vec<&str> = meta.columns().collect();
        let prefix = format!(
            "merge into {} ({}) key ({}) values ",
            meta.table_name(),
            columns.join(","),
            meta.primary_keys().join(",")
        );
        Some(MergeTemplate {
            prefix,
            suffix: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ColumnMetaData;

    fn meta() -> TableMetaData {
        TableMetaData::new(
            "players",
            vec![
                ColumnMetaData {
                    name: "id".into(),
                    type_name: "INTEGER".into(),
                    auto_generated: false,
                },
                ColumnMetaData {
                    name: "name".into(),
                    type_name: "TEXT".into(),
                    auto_generated: false,
                },
            ],
            vec!["id".into()],
            "PLAYER",
        )
        .unwrap()
    }

    #[test]
    fn sqlite_merge_is_an_upsert() {
        let t = SqliteDialect.merge_template(&meta()).unwrap();
        assert_eq!(t.prefix, "insert into players (id,name) values ");
        assert_eq!(t.suffix, " on conflict (id) do update set name=excluded.name");
    }

    #[test]
    fn ansi_merge_uses_key_clause() {
        let t = AnsiMergeDialect.merge_template(&meta()).unwrap();
        assert_eq!(t.prefix, "merge into players (id,name) key (id) values ");
        assert_eq!(t.suffix, "");
    }
}
