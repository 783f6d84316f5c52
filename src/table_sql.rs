//! Canonical SQL derivation from resolved table metadata.
//!
//! A [`TableSql`] is generated once per table, deterministically: equal
//! metadata in, byte-identical statements out. Statements that require a
//! primary key on a table without one are not errors at generation time;
//! they are stored as unavailable entries that only fail when that
//! specific statement is requested (deferred-failure policy).

use crate::dialect::Dialect;
use crate::error::SqlMapperError;
use crate::metadata::TableMetaData;

/// A generated statement, or the reason it cannot exist for this table.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardedSql {
    Ready(String),
    /// Generation-time precondition failed; error surfaces at use.
    Unavailable(String),
}

impl GuardedSql {
    /// The statement text, or a mapping error carrying the deferred reason.
    pub fn sql(&self) -> Result<&str, SqlMapperError> {
        match self {
            GuardedSql::Ready(sql) => Ok(sql),
            GuardedSql::Unavailable(reason) => Err(SqlMapperError::Mapping(reason.clone())),
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, GuardedSql::Ready(_))
    }
}

/// The generated statement set for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSql {
    select_all: String,
    select_by_primary_key: GuardedSql,
    exists: GuardedSql,
    insert: String,
    update: GuardedSql,
    delete: GuardedSql,
    merge: GuardedSql,

    insert_prefix: String,
    insert_tuple: String,
    merge_parts: Option<(String, String, String)>, // prefix, tuple, suffix

    insert_columns: Vec<String>,
    merge_columns: Vec<String>,
    update_columns: Vec<String>,
    primary_key_columns: Vec<String>,
}

impl TableSql {
    /// Derive the statement set. Pure function of the metadata and dialect.
    #[must_use]
    pub fn create(meta: &TableMetaData, dialect: &dyn Dialect) -> Self {
        let table = meta.table_name();
        let columns: Vec<&str> = meta.columns().collect();
        let insert_columns: Vec<String> = meta
            .not_auto_generated_columns()
            .map(String::from)
            .collect();
        let merge_columns: Vec<String> = columns.iter().map(|c| (*c).to_string()).collect();
        let update_set_columns: Vec<String> = meta.not_primary_keys().map(String::from).collect();
        let primary_key_columns: Vec<String> = meta.primary_keys().to_vec();

        let select_all = format!("select {} from {table}", columns.join(","));
        let insert_prefix = format!("insert into {table} ({}) values ", insert_columns.join(","));
        let insert_tuple = placeholder_tuple(insert_columns.len());
        let insert = format!("{insert_prefix}{insert_tuple}");

        let missing_pk = format!(
            "this operation requires a primary key but table [{table}] does not have one"
        );

        let where_by_pk = || {
            format!(
                " where {}",
                primary_key_columns
                    .iter()
                    .map(|pk| format!("{pk}=?"))
                    .collect::<Vec<_>>()
                    .join(" and ")
            )
        };

        let (select_by_primary_key, exists, delete) = if meta.has_primary_key() {
            (
                GuardedSql::Ready(format!("{select_all}{}", where_by_pk())),
                GuardedSql::Ready(format!("select 1 from {table}{}", where_by_pk())),
                GuardedSql::Ready(format!("delete from {table}{}", where_by_pk())),
            )
        } else {
            (
                GuardedSql::Unavailable(missing_pk.clone()),
                GuardedSql::Unavailable(missing_pk.clone()),
                GuardedSql::Unavailable(missing_pk.clone()),
            )
        };

        let update = if !meta.has_primary_key() {
            GuardedSql::Unavailable(missing_pk.clone())
        } else if update_set_columns.is_empty() {
            GuardedSql::Unavailable(format!(
                "table [{table}] has no non-primary-key columns to update"
            ))
        } else {
            GuardedSql::Ready(format!(
                "update {table} set {}{}",
                update_set_columns
                    .iter()
                    .map(|c| format!("{c}=?"))
                    .collect::<Vec<_>>()
                    .join(","),
                where_by_pk()
            ))
        };

        let (merge, merge_parts) = if !meta.has_primary_key() {
            (GuardedSql::Unavailable(missing_pk), None)
        } else {
            match dialect.merge_template(meta) {
                Some(template) => {
                    let tuple = placeholder_tuple(merge_columns.len());
                    let sql = format!("{}{tuple}{}", template.prefix, template.suffix);
                    (
                        GuardedSql::Ready(sql),
                        Some((template.prefix, tuple, template.suffix)),
                    )
                }
                None => (
                    GuardedSql::Unavailable(format!(
                        "dialect [{}] has no merge statement",
                        dialect.name()
                    )),
                    None,
                ),
            }
        };

        // Update binds set-clause values first, then the key.
        let mut update_columns = update_set_columns;
        update_columns.extend(primary_key_columns.iter().cloned());

        Self {
            select_all,
            select_by_primary_key,
            exists,
            insert,
            update,
            delete,
            merge,
            insert_prefix,
            insert_tuple,
            merge_parts,
            insert_columns,
            merge_columns,
            update_columns,
            primary_key_columns,
        }
    }

    #[must_use]
    pub fn select_all(&self) -> &str {
        &self.select_all
    }

    pub fn select_by_primary_key(&self) -> Result<&str, SqlMapperError> {
        self.select_by_primary_key.sql()
    }

    pub fn exists(&self) -> Result<&str, SqlMapperError> {
        self.exists.sql()
    }

    #[must_use]
    pub fn insert(&self) -> &str {
        &self.insert
    }

    pub fn update(&self) -> Result<&str, SqlMapperError> {
        self.update.sql()
    }

    pub fn delete(&self) -> Result<&str, SqlMapperError> {
        self.delete.sql()
    }

    pub fn merge(&self) -> Result<&str, SqlMapperError> {
        self.merge.sql()
    }

    /// Insert statement carrying `rows` value tuples.
    #[must_use]
    pub fn multirow_insert(&self, rows: usize) -> String {
        format!(
            "{}{}",
            self.insert_prefix,
            repeat_tuples(&self.insert_tuple, rows)
        )
    }

    /// Merge statement carrying `rows` value tuples. Surfaces the same
    /// deferred error as the single-row form when merge is unavailable.
    pub fn multirow_merge(&self, rows: usize) -> Result<String, SqlMapperError> {
        self.merge.sql()?;
        match &self.merge_parts {
            Some((prefix, tuple, suffix)) => {
                Ok(format!("{prefix}{}{suffix}", repeat_tuples(tuple, rows)))
            }
            None => Err(SqlMapperError::Mapping(
                "merge statement is unavailable for this table".into(),
            )),
        }
    }

    /// Column binding order for insert tuples.
    #[must_use]
    pub fn insert_columns(&self) -> &[String] {
        &self.insert_columns
    }

    /// Column binding order for merge tuples.
    #[must_use]
    pub fn merge_columns(&self) -> &[String] {
        &self.merge_columns
    }

    /// Column binding order for update (set-clause columns, then keys).
    #[must_use]
    pub fn update_columns(&self) -> &[String] {
        &self.update_columns
    }

    /// Column binding order for delete/exists/select-by-key.
    #[must_use]
    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key_columns
    }
}

fn placeholder_tuple(width: usize) -> String {
    let mut out = String::with_capacity(2 * width + 2);
    out.push('(');
    for i in 0..width {
        if i > 0 {
            out.push(',');
        }
        out.push('?');
    }
    out.push(')');
    out
}

fn repeat_tuples(tuple: &str, rows: usize) -> String {
    let mut out = String::with_capacity(rows * (tuple.len() + 1));
    for i in 0..rows {
        if i > 0 {
            out.push(',');
        }
        out.push_str(tuple);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use crate::metadata::ColumnMetaData;

    fn col(name: &str, auto: bool) -> ColumnMetaData {
        ColumnMetaData {
            name: name.into(),
            type_name: "TEXT".into(),
            auto_generated: auto,
        }
    }

    fn meta_with_pk() -> TableMetaData {
        TableMetaData::new(
            "players",
            vec![col("id", true), col("name", false), col("address", false)],
            vec!["id".into()],
            "PLAYER",
        )
        .unwrap()
    }

    fn meta_without_pk() -> TableMetaData {
        TableMetaData::new(
            "logs",
            vec![col("at", false), col("line", false)],
            vec![],
            "LOG",
        )
        .unwrap()
    }

    #[test]
    fn statement_texts() {
        let sql = TableSql::create(&meta_with_pk(), &SqliteDialect);
        assert_eq!(sql.select_all(), "select id,name,address from players");
        assert_eq!(
            sql.select_by_primary_key().unwrap(),
            "select id,name,address from players where id=?"
        );
        assert_eq!(sql.insert(), "insert into players (name,address) values (?,?)");
        assert_eq!(
            sql.update().unwrap(),
            "update players set name=?,address=? where id=?"
        );
        assert_eq!(sql.delete().unwrap(), "delete from players where id=?");
        assert_eq!(sql.exists().unwrap(), "select 1 from players where id=?");
    }

    #[test]
    fn create_is_deterministic() {
        let a = TableSql::create(&meta_with_pk(), &SqliteDialect);
        let b = TableSql::create(&meta_with_pk(), &SqliteDialect);
        assert_eq!(a, b);
    }

    #[test]
    fn multirow_templates_repeat_tuples() {
        let sql = TableSql::create(&meta_with_pk(), &SqliteDialect);
        assert_eq!(
            sql.multirow_insert(3),
            "insert into players (name,address) values (?,?),(?,?),(?,?)"
        );
        let merge2 = sql.multirow_merge(2).unwrap();
        assert!(merge2.starts_with("insert into players (id,name,address) values (?,?,?),(?,?,?)"));
        assert!(merge2.ends_with("on conflict (id) do update set name=excluded.name,address=excluded.address"));
    }

    #[test]
    fn missing_primary_key_defers_failure() {
        let sql = TableSql::create(&meta_without_pk(), &SqliteDialect);
        // Insert and select-all still work.
        assert_eq!(sql.insert(), "insert into logs (at,line) values (?,?)");
        assert_eq!(sql.select_all(), "select at,line from logs");
        // Everything keyed fails only when asked for.
        for guarded in [sql.update(), sql.delete(), sql.merge(), sql.exists()] {
            let err = guarded.unwrap_err().to_string();
            assert!(err.contains("primary key"), "{err}");
        }
    }

    #[test]
    fn binding_orders_follow_generated_sql() {
        let sql = TableSql::create(&meta_with_pk(), &SqliteDialect);
        assert_eq!(sql.insert_columns(), ["name", "address"]);
        assert_eq!(sql.merge_columns(), ["id", "name", "address"]);
        assert_eq!(sql.update_columns(), ["name", "address", "id"]);
        assert_eq!(sql.primary_key_columns(), ["id"]);
    }
}
