use std::borrow::Cow;

use crate::accessor::Record;
use crate::connection::SqlConnection;
use crate::cursor::{LazyResultSet, ResultSet};
use crate::error::SqlMapperError;
use crate::parameterized::{SqlArg, parse};
use crate::session::Session;
use crate::types::{ParameterizedSql, RowValues};

/// Fluent builder for one statement against a session.
///
/// Positional `params` are passed through as-is; `args` go through
/// placeholder parsing (list expansion, embedded literals) first.
pub struct QueryBuilder<'sess, 'ctx, 'q, C: SqlConnection> {
    session: &'sess mut Session<'ctx, C>,
    sql: Cow<'q, str>,
    params: Cow<'q, [RowValues]>,
    args: Option<Vec<SqlArg>>,
}

impl<'ctx, C: SqlConnection> Session<'ctx, C> {
    /// Start a fluent statement.
    pub fn sql<'sess, 'q>(&'sess mut self, sql: &'q str) -> QueryBuilder<'sess, 'ctx, 'q, C> {
        QueryBuilder {
            session: self,
            sql: Cow::Borrowed(sql),
            params: Cow::Borrowed(&[]),
            args: None,
        }
    }
}

impl<'sess, 'ctx, 'q, C: SqlConnection> QueryBuilder<'sess, 'ctx, 'q, C> {
    /// Provide already-rendered positional parameters.
    #[must_use]
    pub fn params(mut self, params: &'q [RowValues]) -> Self {
        self.params = Cow::Borrowed(params);
        self
    }

    /// Provide arguments for placeholder parsing (`?`, `<?>`, `$?$`).
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = SqlArg>) -> Self {
        self.args = Some(args.into_iter().collect());
        self
    }

    fn render(self) -> Result<(&'sess mut Session<'ctx, C>, ParameterizedSql), SqlMapperError> {
        let rendered = match self.args {
            Some(args) => parse(self.sql.as_ref(), args)?,
            None => ParameterizedSql::new(self.sql.into_owned(), self.params.into_owned()),
        };
        Ok((self.session, rendered))
    }

    /// Run as a query and materialize every row, unmapped.
    pub fn select(self) -> Result<ResultSet, SqlMapperError> {
        let (session, rendered) = self.render()?;
        session.query_sql(&rendered)
    }

    /// Run as DML and return rows modified.
    pub fn dml(self) -> Result<usize, SqlMapperError> {
        let (session, rendered) = self.render()?;
        session.execute_sql(&rendered)
    }

    /// Run as a parameterless script. Fails if parameters were supplied.
    pub fn script(self) -> Result<(), SqlMapperError> {
        if self.args.is_some() || !self.params.is_empty() {
            return Err(SqlMapperError::Parameter(
                "scripts take no parameters".into(),
            ));
        }
        self.session.execute_script(self.sql.as_ref())
    }

    /// Run as a query and map every row to records.
    pub fn to_list<T: Record>(self) -> Result<Vec<T>, SqlMapperError> {
        let (session, rendered) = self.render()?;
        session.read_list(&rendered.sql, &rendered.parameters)
    }

    /// Run as a query and map the first row, if any.
    pub fn first<T: Record>(self) -> Result<Option<T>, SqlMapperError> {
        let (session, rendered) = self.render()?;
        session.read_first(&rendered.sql, &rendered.parameters)
    }

    /// Run as a query and map exactly one row.
    pub fn one<T: Record>(self) -> Result<T, SqlMapperError> {
        let (session, rendered) = self.render()?;
        session.read_one(&rendered.sql, &rendered.parameters)
    }

    /// Run as a query, handing back a lazy mapped cursor.
    pub fn lazy<T: Record>(self) -> Result<LazyResultSet<'sess, T>, SqlMapperError> {
        let (session, rendered) = self.render()?;
        session.read_lazy(&rendered.sql, &rendered.parameters)
    }
}
