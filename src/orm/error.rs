use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrmError {
    #[error("invalid database url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported dialect: {0} (only sqlite is available)")]
    UnsupportedDialect(String),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("value for {table}.{column} is {actual} characters, limit is {max}")]
    ValueTooLong {
        table: &'static str,
        column: &'static str,
        max: usize,
        actual: usize,
    },
    #[error("column {table}.{column} cannot be used with table {expected}")]
    UnknownColumn {
        table: &'static str,
        column: &'static str,
        expected: &'static str,
    },
    #[error("record in table {0} has not been committed yet")]
    NotPersistent(&'static str),
    #[error("row {table}#{id} no longer exists")]
    StaleRecord { table: &'static str, id: i64 },
    #[error("primary key of {table}#{stored} was changed to {current:?}")]
    IdentityChanged {
        table: &'static str,
        stored: i64,
        current: Option<i64>,
    },
    #[error("projection selects {actual} columns but the row type holds {expected}")]
    ProjectionArity { expected: usize, actual: usize },
    #[error("engine connection lock poisoned")]
    ConnectionPoisoned,
}

pub type Result<T> = std::result::Result<T, OrmError>;
