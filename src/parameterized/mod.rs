//! Parameterized-SQL template parsing.
//!
//! One template may mix four placeholder forms, applied in a fixed order
//! because later passes assume the result of earlier ones:
//!
//! 1. named parameters `:name` (see [`NamedParameterSql`]) — an unmatched
//!    name is left in the text, not an error;
//! 2. list expansion `<?>` — the bound sequence becomes `?,?,...,?` and
//!    its elements are spliced into the flat parameter list;
//! 3. embedded literal `$?$` — the bound value is rendered directly into
//!    the SQL text and removed from the parameter list;
//! 4. plain `?` — bound positionally against whatever remains.
//!
//! Placeholders inside quoted strings and comments are never touched. For
//! a fixed template and fixed bound values the output text and parameter
//! order are stable and reproducible.

mod scanner;

use std::collections::HashMap;

use crate::accessor::Record;
use crate::canonical::canonicalize;
use crate::error::SqlMapperError;
use crate::types::{ParameterizedSql, RowValues};

use scanner::{State, is_identifier_byte, scan};

const LIST_PLACEHOLDER: &str = "<?>";
const EMBEDDED_PLACEHOLDER: &str = "$?$";

/// A value bound to one placeholder position: a scalar, or a sequence for
/// the list-expansion placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Value(RowValues),
    List(Vec<RowValues>),
}

impl From<RowValues> for SqlArg {
    fn from(value: RowValues) -> Self {
        SqlArg::Value(value)
    }
}

impl From<Vec<RowValues>> for SqlArg {
    fn from(values: Vec<RowValues>) -> Self {
        SqlArg::List(values)
    }
}

/// Parse a template containing `?`, `<?>`, and `$?$` placeholders against
/// positionally bound arguments.
///
/// Each placeholder consumes one argument left to right. See the module
/// docs for the pass semantics.
pub fn parse(template: &str, args: Vec<SqlArg>) -> Result<ParameterizedSql, SqlMapperError> {
    let bytes = template.as_bytes();
    let mut state = State::Normal;
    let mut out = String::with_capacity(template.len());
    let mut parameters: Vec<RowValues> = Vec::with_capacity(args.len());
    let mut args = args.into_iter();
    let mut consumed = 0usize;

    let mut seg_start = 0;
    let mut idx = 0;
    while idx < bytes.len() {
        if !scan(&mut state, bytes, idx) {
            idx += 1;
            continue;
        }

        if template[idx..].starts_with(LIST_PLACEHOLDER) {
            out.push_str(&template[seg_start..idx]);
            let arg = next_arg(&mut args, &mut consumed)?;
            let SqlArg::List(values) = arg else {
                return Err(SqlMapperError::Parameter(format!(
                    "placeholder {LIST_PLACEHOLDER} at argument {consumed} requires a sequence"
                )));
            };
            if values.is_empty() {
                return Err(SqlMapperError::Parameter(format!(
                    "placeholder {LIST_PLACEHOLDER} at argument {consumed} got an empty sequence"
                )));
            }
            for (i, value) in values.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('?');
                parameters.push(value);
            }
            idx += LIST_PLACEHOLDER.len();
            seg_start = idx;
        } else if template[idx..].starts_with(EMBEDDED_PLACEHOLDER) {
            out.push_str(&template[seg_start..idx]);
            let arg = next_arg(&mut args, &mut consumed)?;
            out.push_str(&literal(&arg));
            idx += EMBEDDED_PLACEHOLDER.len();
            seg_start = idx;
        } else if bytes[idx] == b'?' {
            out.push_str(&template[seg_start..idx]);
            let arg = next_arg(&mut args, &mut consumed)?;
            let SqlArg::Value(value) = arg else {
                return Err(SqlMapperError::Parameter(format!(
                    "argument {consumed} is a sequence but its placeholder is a plain '?' \
                     (use {LIST_PLACEHOLDER} to expand sequences)"
                )));
            };
            out.push('?');
            parameters.push(value);
            idx += 1;
            seg_start = idx;
        } else {
            idx += 1;
        }
    }
    out.push_str(&template[seg_start..]);

    if args.next().is_some() {
        return Err(SqlMapperError::Parameter(format!(
            "{consumed} placeholder(s) in template but more arguments were bound"
        )));
    }
    Ok(ParameterizedSql::new(out, parameters))
}

fn next_arg(
    args: &mut impl Iterator<Item = SqlArg>,
    consumed: &mut usize,
) -> Result<SqlArg, SqlMapperError> {
    *consumed += 1;
    args.next().ok_or_else(|| {
        SqlMapperError::Parameter(format!(
            "template has more placeholders than bound arguments (needed argument {consumed})"
        ))
    })
}

/// Render a bound value as a SQL literal: quoted for text (embedded quotes
/// doubled), bare for numbers and booleans, `null` for null, `X'..'` for
/// blobs; sequences join their elements with commas.
#[must_use]
pub fn literal(arg: &SqlArg) -> String {
    match arg {
        SqlArg::List(values) => values
            .iter()
            .map(value_literal)
            .collect::<Vec<_>>()
            .join(", "),
        SqlArg::Value(value) => value_literal(value),
    }
}

fn value_literal(value: &RowValues) -> String {
    match value {
        RowValues::Null => "null".to_string(),
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) => f.to_string(),
        RowValues::Bool(b) => b.to_string(),
        RowValues::Text(s) => quote(s),
        RowValues::Timestamp(dt) => quote(&dt.format("%F %T%.f").to_string()),
        RowValues::JSON(j) => quote(&j.to_string()),
        RowValues::Blob(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for b in bytes {
                out.push_str(&format!("{b:02X}"));
            }
            out.push('\'');
            out
        }
    }
}

/// Single-quote a string, doubling any embedded quotes.
#[must_use]
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Builder for templates with `:name` placeholders.
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let stmt = NamedParameterSql::new("select * from customer where id=:id and address=:address")
///     .bind("id", RowValues::Int(1))
///     .bind("address", RowValues::Text("Kyoto".into()))
///     .parse()
///     .unwrap();
/// assert_eq!(stmt.sql, "select * from customer where id=? and address=?");
/// ```
///
/// A bound record supplies fallback values by field name; explicit binds
/// win over the record. Names with no source are left untouched in the
/// text and surface later, if at all, as an engine syntax error.
pub struct NamedParameterSql {
    sql: String,
    values: HashMap<String, SqlArg>,
    record_values: HashMap<String, SqlArg>,
}

impl NamedParameterSql {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: HashMap::new(),
            record_values: HashMap::new(),
        }
    }

    /// Bind one named parameter. Keys match case- and format-insensitively.
    #[must_use]
    pub fn bind(mut self, key: &str, value: impl Into<SqlArg>) -> Self {
        self.values.insert(canonicalize(key), value.into());
        self
    }

    /// Bind a record as a fallback value source: each readable accessor
    /// supplies the value for the parameter matching its field name.
    #[must_use]
    pub fn bind_record<R: Record>(mut self, record: &R) -> Self {
        for accessor in R::accessors() {
            if let Ok(value) = accessor.get(record) {
                self.record_values
                    .insert(canonicalize(accessor.name()), SqlArg::Value(value));
            }
        }
        self
    }

    /// Replace matched `:name` placeholders with `?` and run the
    /// positional passes over the result.
    pub fn parse(self) -> Result<ParameterizedSql, SqlMapperError> {
        let bytes = self.sql.as_bytes();
        let mut state = State::Normal;
        let mut out = String::with_capacity(self.sql.len());
        let mut args: Vec<SqlArg> = Vec::new();

        let mut seg_start = 0;
        let mut idx = 0;
        while idx < bytes.len() {
            let normal = scan(&mut state, bytes, idx);
            // A name starts at ':' followed by an identifier; '::' casts
            // and bare colons pass through.
            if normal
                && bytes[idx] == b':'
                && (idx == 0 || bytes[idx - 1] != b':')
                && bytes.get(idx + 1).copied().is_some_and(is_identifier_byte)
            {
                let mut end = idx + 1;
                while end < bytes.len() && is_identifier_byte(bytes[end]) {
                    end += 1;
                }
                let name = &self.sql[idx + 1..end];
                let key = canonicalize(name);
                let bound = self
                    .values
                    .get(&key)
                    .or_else(|| self.record_values.get(&key));
                if let Some(arg) = bound {
                    out.push_str(&self.sql[seg_start..idx]);
                    // Keep the positional form so the later passes expand
                    // lists and splice parameters.
                    out.push_str(match arg {
                        SqlArg::List(_) => LIST_PLACEHOLDER,
                        SqlArg::Value(_) => "?",
                    });
                    args.push(arg.clone());
                    seg_start = end;
                }
                idx = end;
            } else {
                idx += 1;
            }
        }
        out.push_str(&self.sql[seg_start..]);

        parse(&out, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::FieldAccessor;

    #[test]
    fn named_parameters_become_positional() {
        let stmt = NamedParameterSql::new("select * from t where id=:id")
            .bind("id", RowValues::Int(5))
            .parse()
            .unwrap();
        assert_eq!(stmt.sql, "select * from t where id=?");
        assert_eq!(stmt.parameters, vec![RowValues::Int(5)]);
    }

    #[test]
    fn named_parameter_order_follows_text_position() {
        let stmt = NamedParameterSql::new("select * from t where a=:aa and b=:bb")
            .bind("bb", RowValues::Int(2))
            .bind("aa", RowValues::Int(1))
            .parse()
            .unwrap();
        assert_eq!(stmt.sql, "select * from t where a=? and b=?");
        assert_eq!(stmt.parameters, vec![RowValues::Int(1), RowValues::Int(2)]);
    }

    #[test]
    fn unmatched_name_left_untouched() {
        let stmt = NamedParameterSql::new("select * from t where id=:id and x=:unknown")
            .bind("id", RowValues::Int(5))
            .parse()
            .unwrap();
        assert_eq!(stmt.sql, "select * from t where id=? and x=:unknown");
        assert_eq!(stmt.parameters, vec![RowValues::Int(5)]);
    }

    #[test]
    fn list_expansion_splices_parameters() {
        let stmt = parse(
            "insert into t values <?>",
            vec![SqlArg::List(vec![
                RowValues::Int(1),
                RowValues::Int(2),
                RowValues::Int(3),
            ])],
        )
        .unwrap();
        assert_eq!(stmt.sql, "insert into t values ?,?,?");
        assert_eq!(
            stmt.parameters,
            vec![RowValues::Int(1), RowValues::Int(2), RowValues::Int(3)]
        );
    }

    #[test]
    fn list_placeholder_rejects_scalars() {
        let err = parse(
            "select * from t where id in (<?>)",
            vec![SqlArg::Value(RowValues::Int(1))],
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires a sequence"));
    }

    #[test]
    fn embedded_literal_is_rendered_and_removed() {
        let stmt = parse(
            "select $?$",
            vec![SqlArg::Value(RowValues::Text("it's".into()))],
        )
        .unwrap();
        assert_eq!(stmt.sql, "select 'it''s'");
        assert!(stmt.parameters.is_empty());
    }

    #[test]
    fn embedded_literal_forms() {
        for (value, rendered) in [
            (RowValues::Int(42), "42"),
            (RowValues::Bool(true), "true"),
            (RowValues::Null, "null"),
            (RowValues::Float(1.5), "1.5"),
        ] {
            let stmt = parse("select $?$", vec![SqlArg::Value(value)]).unwrap();
            assert_eq!(stmt.sql, format!("select {rendered}"));
        }
    }

    #[test]
    fn mixed_placeholders_keep_order() {
        let stmt = parse(
            "select * from t where a=? and b in (<?>) and c=$?$ and d=?",
            vec![
                SqlArg::Value(RowValues::Int(1)),
                SqlArg::List(vec![RowValues::Int(2), RowValues::Int(3)]),
                SqlArg::Value(RowValues::Text("lit".into())),
                SqlArg::Value(RowValues::Int(4)),
            ],
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "select * from t where a=? and b in (?,?) and c='lit' and d=?"
        );
        assert_eq!(
            stmt.parameters,
            vec![RowValues::Int(1), RowValues::Int(2), RowValues::Int(3), RowValues::Int(4)]
        );
    }

    #[test]
    fn placeholders_inside_literals_and_comments_ignored() {
        let stmt = parse(
            "select '?' as q, \"?col\" -- ? trailing\n from t where a=?",
            vec![SqlArg::Value(RowValues::Int(9))],
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "select '?' as q, \"?col\" -- ? trailing\n from t where a=?"
        );
        assert_eq!(stmt.parameters, vec![RowValues::Int(9)]);
    }

    #[test]
    fn arity_mismatches_are_errors() {
        assert!(parse("select ?", vec![]).is_err());
        assert!(
            parse(
                "select 1",
                vec![SqlArg::Value(RowValues::Int(1))]
            )
            .is_err()
        );
    }

    #[test]
    fn parse_is_deterministic() {
        let args = || {
            vec![
                SqlArg::List(vec![RowValues::Int(1), RowValues::Int(2)]),
                SqlArg::Value(RowValues::Text("x".into())),
            ]
        };
        let a = parse("select <?>, ?", args()).unwrap();
        let b = parse("select <?>, ?", args()).unwrap();
        assert_eq!(a, b);
    }

    #[derive(Default)]
    struct Customer {
        id: i64,
        address: String,
    }

    impl Record for Customer {
        fn type_name() -> &'static str {
            "Customer"
        }

        fn accessors() -> Vec<FieldAccessor<Self>> {
            vec![
                FieldAccessor::field("id").with_get(|c: &Customer| RowValues::Int(c.id)),
                FieldAccessor::field("address")
                    .with_get(|c: &Customer| RowValues::Text(c.address.clone())),
            ]
        }
    }

    #[test]
    fn record_supplies_fallback_values() {
        let customer = Customer {
            id: 7,
            address: "Kyoto".into(),
        };
        let stmt = NamedParameterSql::new("select * from customer where id=:id and address=:address")
            .bind_record(&customer)
            .bind("id", RowValues::Int(1)) // explicit bind wins
            .parse()
            .unwrap();
        assert_eq!(stmt.sql, "select * from customer where id=? and address=?");
        assert_eq!(
            stmt.parameters,
            vec![RowValues::Int(1), RowValues::Text("Kyoto".into())]
        );
    }
}
