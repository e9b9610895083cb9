//! A small typed unit-of-work layer over SQLite.
//!
//! [`create_engine`] gives a lazily connecting [`Engine`], [`MetaData`] emits
//! the tables of registered [`Model`]s, and a [`Session`] stages inserts,
//! updates and deletes until [`Session::commit`].

pub mod engine;
pub mod error;
pub mod model;
pub mod query;
pub mod schema;
pub mod session;
pub mod url;
pub mod value;

pub use engine::{create_engine, Engine};
pub use error::{OrmError, Result};
pub use model::{FromColumns, Model};
pub use query::{Order, Query, Results};
pub use schema::{Column, ColumnRef, ColumnType, MetaData, Table};
pub use session::{Handle, ObjectState, Session, SessionFactory};
pub use self::url::{DatabaseUrl, Dialect};
pub use value::Value;
