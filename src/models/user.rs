use std::fmt;

use rusqlite::Row;
use serde::Serialize;

use crate::orm::{Column, ColumnRef, Model, Table, Value};

pub static USERS: Table = Table::new(
    "Users",
    &[
        Column::integer("id").primary_key(),
        Column::string("name", 20),
        Column::string("full_name", 20),
    ],
);

/// A person stored in the `Users` table.
///
/// `id` stays `None` until a session commit assigns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Option<i64>,
    pub name: String,
    pub full_name: String,
}

impl User {
    pub const ID: ColumnRef = ColumnRef::new("Users", "id");
    pub const NAME: ColumnRef = ColumnRef::new("Users", "name");
    pub const FULL_NAME: ColumnRef = ColumnRef::new("Users", "full_name");

    pub fn new(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            full_name: full_name.into(),
        }
    }
}

impl Model for User {
    fn table() -> &'static Table {
        &USERS
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.name.as_str()),
            Value::from(self.full_name.as_str()),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            full_name: row.get(2)?,
        })
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<User (name: {}, full_name: {})>", self.name, self.full_name)
    }
}
