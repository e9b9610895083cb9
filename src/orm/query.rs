use std::marker::PhantomData;

use rusqlite::{params_from_iter, Row};

use super::engine::Engine;
use super::error::{OrmError, Result};
use super::model::{FromColumns, Model};
use super::schema::{ColumnRef, Table};
use super::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

type RowMapper<T> = fn(&Row<'_>) -> rusqlite::Result<T>;

/// A lazily executed SELECT over the table of `M`, yielding `T` per row.
///
/// Nothing touches storage until [`Query::iter`], [`Query::all`],
/// [`Query::first`] or [`Query::count`] consumes the builder. Column misuse is
/// recorded while building and reported at execution.
pub struct Query<'s, M, T> {
    engine: &'s Engine,
    table: &'static Table,
    select: Vec<&'static str>,
    filters: Vec<(&'static str, Value)>,
    order: Vec<(&'static str, Order)>,
    limit: Option<u64>,
    invalid: Option<OrmError>,
    map_row: RowMapper<T>,
    _model: PhantomData<fn() -> M>,
}

impl<'s, M: Model> Query<'s, M, M> {
    pub(crate) fn entities(engine: &'s Engine) -> Self {
        let table = <M as Model>::table();
        Self::build(
            engine,
            table,
            table.columns.iter().map(|c| c.name).collect(),
            <M as Model>::from_row,
        )
    }
}

impl<'s, M: Model, T: FromColumns> Query<'s, M, T> {
    pub(crate) fn projection(engine: &'s Engine, columns: &[ColumnRef]) -> Self {
        let table = <M as Model>::table();
        let mut query = Self::build(engine, table, Vec::new(), T::from_columns);
        for &column in columns {
            if let Some(name) = query.resolve(column) {
                query.select.push(name);
            }
        }
        if query.invalid.is_none() && columns.len() != T::ARITY {
            query.invalid = Some(OrmError::ProjectionArity {
                expected: T::ARITY,
                actual: columns.len(),
            });
        }
        query
    }
}

impl<'s, M: Model, T> Query<'s, M, T> {
    fn build(
        engine: &'s Engine,
        table: &'static Table,
        select: Vec<&'static str>,
        map_row: RowMapper<T>,
    ) -> Self {
        Self {
            engine,
            table,
            select,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            invalid: None,
            map_row,
            _model: PhantomData,
        }
    }

    fn resolve(&mut self, column: ColumnRef) -> Option<&'static str> {
        let known = column.table == self.table.name
            && self.table.column(column.name).is_some();
        if known {
            return Some(column.name);
        }
        if self.invalid.is_none() {
            self.invalid = Some(OrmError::UnknownColumn {
                table: column.table,
                column: column.name,
                expected: self.table.name,
            });
        }
        None
    }

    pub fn order_by(mut self, column: ColumnRef) -> Self {
        if let Some(name) = self.resolve(column) {
            self.order.push((name, Order::Asc));
        }
        self
    }

    pub fn order_by_desc(mut self, column: ColumnRef) -> Self {
        if let Some(name) = self.resolve(column) {
            self.order.push((name, Order::Desc));
        }
        self
    }

    pub fn filter_eq(mut self, column: ColumnRef, value: impl Into<Value>) -> Self {
        if let Some(name) = self.resolve(column) {
            self.filters.push((name, value.into()));
        }
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    fn where_clause(&self) -> String {
        if self.filters.is_empty() {
            return String::new();
        }
        let conds = self
            .filters
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("\"{name}\" = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!(" WHERE {conds}")
    }

    pub fn sql(&self) -> String {
        let select = self
            .select
            .iter()
            .map(|name| format!("\"{name}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "SELECT {select} FROM \"{}\"{}",
            self.table.name,
            self.where_clause()
        );
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(name, dir)| format!("\"{name}\" {}", dir.sql()))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }
        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        sql
    }

    /// Runs the query and returns a one-shot iterator over the rows.
    pub fn iter(self) -> Result<Results<T>> {
        Ok(Results {
            rows: self.all()?.into_iter(),
        })
    }

    pub fn all(mut self) -> Result<Vec<T>> {
        if let Some(err) = self.invalid.take() {
            return Err(err);
        }
        let sql = self.sql();
        let params = self.filters.iter().map(|(_, v)| v).collect::<Vec<_>>();
        let map_row = self.map_row;
        let rows = self.engine.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        tracing::debug!(table = self.table.name, rows = rows.len(), "query executed");
        Ok(rows)
    }

    /// First matching row. A smaller limit set by the caller still applies.
    pub fn first(self) -> Result<Option<T>> {
        let limit = self.limit.map_or(1, |n| n.min(1));
        Ok(self.limit(limit).all()?.into_iter().next())
    }

    pub fn count(mut self) -> Result<i64> {
        if let Some(err) = self.invalid.take() {
            return Err(err);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM \"{}\"{}",
            self.table.name,
            self.where_clause()
        );
        let params = self.filters.iter().map(|(_, v)| v).collect::<Vec<_>>();
        self.engine.with_conn(|conn| {
            Ok(conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?)
        })
    }
}

/// Rows produced by an executed [`Query`].
#[derive(Debug)]
pub struct Results<T> {
    rows: std::vec::IntoIter<T>,
}

impl<T> Iterator for Results<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl<T> ExactSizeIterator for Results<T> {}
