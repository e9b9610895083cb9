use std::any::Any;
use std::fmt;

use rusqlite::{types::FromSql, Row};

use super::schema::Table;
use super::value::Value;

/// A struct mapped onto one table.
///
/// `values` returns the non-key columns in the order the table declares them;
/// `from_row` reads the key first and then the same columns.
pub trait Model: Any + Clone + fmt::Debug {
    fn table() -> &'static Table;
    fn id(&self) -> Option<i64>;
    fn set_id(&mut self, id: i64);
    fn values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Object-safe view of a [`Model`] so a session can track several types.
pub(crate) trait Record: fmt::Debug {
    fn table(&self) -> &'static Table;
    fn id(&self) -> Option<i64>;
    fn set_id(&mut self, id: i64);
    fn values(&self) -> Vec<Value>;
    fn clone_record(&self) -> Box<dyn Record>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<M: Model> Record for M {
    fn table(&self) -> &'static Table {
        <M as Model>::table()
    }

    fn id(&self) -> Option<i64> {
        Model::id(self)
    }

    fn set_id(&mut self, id: i64) {
        Model::set_id(self, id)
    }

    fn values(&self) -> Vec<Value> {
        Model::values(self)
    }

    fn clone_record(&self) -> Box<dyn Record> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Rows of a column projection. Implemented for tuples of up to four columns.
pub trait FromColumns: Sized {
    const ARITY: usize;
    fn from_columns(row: &Row<'_>) -> rusqlite::Result<Self>;
}

macro_rules! impl_from_columns {
    ($arity:expr; $($t:ident => $idx:tt),+) => {
        impl<$($t: FromSql),+> FromColumns for ($($t,)+) {
            const ARITY: usize = $arity;

            fn from_columns(row: &Row<'_>) -> rusqlite::Result<Self> {
                Ok(($(row.get::<usize, $t>($idx)?,)+))
            }
        }
    };
}

impl_from_columns!(1; A => 0);
impl_from_columns!(2; A => 0, B => 1);
impl_from_columns!(3; A => 0, B => 1, C => 2);
impl_from_columns!(4; A => 0, B => 1, C => 2, D => 3);
