//! Table metadata and the registry that emits schema.

use std::fmt;

use super::{engine::Engine, error::Result, model::Model};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    String { max_len: Option<usize> },
}

impl ColumnType {
    fn sql(&self) -> String {
        match self {
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::String { max_len: Some(n) } => format!("VARCHAR({n})"),
            ColumnType::String { max_len: None } => "TEXT".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
    pub primary_key: bool,
    pub nullable: bool,
}

impl Column {
    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnType::Integer,
            primary_key: false,
            nullable: true,
        }
    }

    pub const fn string(name: &'static str, max_len: usize) -> Self {
        Self {
            name,
            kind: ColumnType::String {
                max_len: Some(max_len),
            },
            primary_key: false,
            nullable: true,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnType::String { max_len: None },
            primary_key: false,
            nullable: true,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn max_len(&self) -> Option<usize> {
        match self.kind {
            ColumnType::String { max_len } => max_len,
            ColumnType::Integer => None,
        }
    }

    fn definition(&self) -> String {
        let mut def = format!("\"{}\" {}", self.name, self.kind.sql());
        if self.primary_key {
            // AUTOINCREMENT keeps ids unique even after deletes.
            def.push_str(" NOT NULL PRIMARY KEY AUTOINCREMENT");
        } else if !self.nullable {
            def.push_str(" NOT NULL");
        }
        def
    }
}

/// A mapped table: a stable name plus its columns in declaration order.
///
/// The integer primary key comes first; every other column is written from
/// [`Model::values`] in the order declared here.
#[derive(Debug, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
}

impl Table {
    pub const fn new(name: &'static str, columns: &'static [Column]) -> Self {
        Self { name, columns }
    }

    pub fn primary_key(&self) -> &'static str {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .map_or("id", |c| c.name)
    }

    pub fn data_columns(&self) -> impl Iterator<Item = &'static Column> {
        self.columns.iter().filter(|c| !c.primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn create_sql(&self) -> String {
        let defs = self
            .columns
            .iter()
            .map(Column::definition)
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS \"{}\" ({defs})", self.name)
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS \"{}\"", self.name)
    }

    pub(crate) fn insert_sql(&self) -> String {
        let cols = self.data_columns().collect::<Vec<_>>();
        let names = cols
            .iter()
            .map(|c| format!("\"{}\"", c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let params = (1..=cols.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("INSERT INTO \"{}\" ({names}) VALUES ({params})", self.name)
    }

    pub(crate) fn update_sql(&self) -> String {
        let cols = self.data_columns().collect::<Vec<_>>();
        let sets = cols
            .iter()
            .enumerate()
            .map(|(i, c)| format!("\"{}\" = ?{}", c.name, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE \"{}\" SET {sets} WHERE \"{}\" = ?{}",
            self.name,
            self.primary_key(),
            cols.len() + 1
        )
    }

    pub(crate) fn delete_sql(&self) -> String {
        format!(
            "DELETE FROM \"{}\" WHERE \"{}\" = ?1",
            self.name,
            self.primary_key()
        )
    }
}

/// A column of a specific table, used for ordering, filtering and projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: &'static str,
    pub name: &'static str,
}

impl ColumnRef {
    pub const fn new(table: &'static str, name: &'static str) -> Self {
        Self { table, name }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.name)
    }
}

/// Registry of mapped tables that can emit schema against an engine.
#[derive(Debug, Default)]
pub struct MetaData {
    tables: Vec<&'static Table>,
}

impl MetaData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: Model>(&mut self) -> &mut Self {
        let table = <M as Model>::table();
        if !self.tables.iter().any(|t| t.name == table.name) {
            self.tables.push(table);
        }
        self
    }

    pub fn tables(&self) -> &[&'static Table] {
        &self.tables
    }

    pub fn create_all(&self, engine: &Engine) -> Result<()> {
        engine.with_conn(|conn| {
            let tx = conn.transaction()?;
            for table in &self.tables {
                tracing::debug!(table = table.name, "creating table if missing");
                tx.execute_batch(&table.create_sql())?;
            }
            tx.commit()?;
            Ok(())
        })?;
        tracing::info!(tables = self.tables.len(), "schema emitted");
        Ok(())
    }

    pub fn drop_all(&self, engine: &Engine) -> Result<()> {
        engine.with_conn(|conn| {
            let tx = conn.transaction()?;
            for table in self.tables.iter().rev() {
                tx.execute_batch(&table.drop_sql())?;
            }
            tx.commit()?;
            Ok(())
        })?;
        tracing::info!(tables = self.tables.len(), "schema dropped");
        Ok(())
    }
}
