use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use super::error::{OrmError, Result};
use super::session::Session;
use super::url::DatabaseUrl;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Deferred handle to a database.
///
/// Building an engine only records the descriptor. The url is parsed and the
/// SQLite connection opened by the first operation that needs storage, so a
/// malformed descriptor is reported there rather than here. Clones share the
/// same connection.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    descriptor: String,
    conn: Mutex<Option<Connection>>,
}

pub fn create_engine(descriptor: impl Into<String>) -> Engine {
    Engine::new(descriptor)
}

impl Engine {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                descriptor: descriptor.into(),
                conn: Mutex::new(None),
            }),
        }
    }

    pub fn descriptor(&self) -> &str {
        &self.inner.descriptor
    }

    pub fn url(&self) -> Result<DatabaseUrl> {
        self.inner.descriptor.parse()
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .conn
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or_else(|poisoned| poisoned.into_inner().is_some())
    }

    /// Establishes the connection now instead of on first use.
    pub fn connect(&self) -> Result<()> {
        self.with_conn(|_| Ok(()))
    }

    /// Closes the live connection; the next operation reconnects.
    ///
    /// An in-memory database is lost when its connection is disposed.
    pub fn dispose(&self) -> Result<()> {
        let mut guard = self
            .inner
            .conn
            .lock()
            .map_err(|_| OrmError::ConnectionPoisoned)?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, err)| OrmError::Sqlite(err))?;
            tracing::info!("engine disposed");
        }
        Ok(())
    }

    pub fn session(&self) -> Session {
        Session::new(self.clone())
    }

    pub(crate) fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut guard = self
            .inner
            .conn
            .lock()
            .map_err(|_| OrmError::ConnectionPoisoned)?;
        let conn = match guard.take() {
            Some(conn) => conn,
            None => self.open()?,
        };
        let conn = guard.insert(conn);
        f(conn)
    }

    fn open(&self) -> Result<Connection> {
        let started_at = Instant::now();
        let url = self.url()?;
        if !url.is_sqlite() {
            tracing::error!(dialect = %url.dialect, "no driver available for dialect");
            return Err(OrmError::UnsupportedDialect(url.dialect.to_string()));
        }

        let conn = match url.sqlite_path() {
            Some(path) => {
                let conn = Connection::open(&path).inspect_err(|err| {
                    tracing::error!(path = %path.display(), error = %err, "failed to open database");
                })?;
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn
            }
            None => Connection::open_in_memory()?,
        };
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_millis(
            url.timeout_ms().unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
        ))?;

        tracing::info!(
            url = %url,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "engine connected"
        );
        Ok(conn)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let url = self
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|_| "<invalid>".to_string());
        f.debug_struct("Engine")
            .field("url", &url)
            .field("connected", &self.is_connected())
            .finish()
    }
}
