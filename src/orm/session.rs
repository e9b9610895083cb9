//! Unit-of-work over an [`Engine`].
//!
//! A session collects inserts, updates and deletes in memory and writes them
//! in one SQLite transaction on [`Session::commit`]. Identifiers of new records
//! are only known after that commit succeeds. [`Session::rollback`] forgets
//! everything that has not been committed.

use std::fmt;
use std::marker::PhantomData;
use std::time::Instant;

use rusqlite::params_from_iter;

use super::engine::Engine;
use super::error::{OrmError, Result};
use super::model::{FromColumns, Model, Record};
use super::query::Query;
use super::schema::ColumnRef;
use super::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectState {
    /// Added, waiting for INSERT on commit.
    Pending,
    /// Stored; may carry uncommitted modifications.
    Persistent,
    /// Stored, waiting for DELETE on commit.
    Deleted,
    /// No longer tracked against storage.
    Detached,
}

/// Typed reference to a record tracked by a [`Session`].
pub struct Handle<M> {
    slot: usize,
    _model: PhantomData<fn() -> M>,
}

impl<M> Handle<M> {
    fn new(slot: usize) -> Self {
        Self {
            slot,
            _model: PhantomData,
        }
    }
}

impl<M> Clone for Handle<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Handle<M> {}

impl<M> PartialEq for Handle<M> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl<M> Eq for Handle<M> {}

impl<M> fmt::Debug for Handle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.slot)
    }
}

struct Tracked {
    record: Box<dyn Record>,
    state: ObjectState,
    dirty: bool,
    /// Primary key of the stored row; `None` until the record is persistent.
    key: Option<i64>,
    committed: Option<Box<dyn Record>>,
}

impl Tracked {
    fn has_pending_work(&self) -> bool {
        match self.state {
            ObjectState::Pending | ObjectState::Deleted => true,
            ObjectState::Persistent => self.dirty,
            ObjectState::Detached => false,
        }
    }

    fn writes_values(&self) -> bool {
        self.state == ObjectState::Pending || (self.state == ObjectState::Persistent && self.dirty)
    }
}

/// Builds sessions bound to one engine.
#[derive(Clone, Debug)]
pub struct SessionFactory {
    engine: Engine,
}

impl SessionFactory {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn session(&self) -> Session {
        Session::new(self.engine.clone())
    }
}

pub struct Session {
    engine: Engine,
    tracked: Vec<Tracked>,
    released: bool,
}

impl Session {
    pub fn new(engine: Engine) -> Self {
        tracing::debug!("session opened");
        Self {
            engine,
            tracked: Vec::new(),
            released: false,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Registers a record with the session.
    ///
    /// A record without an id is queued for INSERT. A record that already has
    /// an id is treated as a modified persistent record and queued for UPDATE;
    /// if the session already tracks that row the tracked copy is replaced.
    /// Adding a record whose row is queued for deletion cancels the deletion.
    pub fn add<M: Model>(&mut self, record: M) -> Handle<M> {
        let table = <M as Model>::table().name;
        let slot = match Model::id(&record) {
            None => self.push(Box::new(record), ObjectState::Pending, false, None, None),
            Some(id) => match self.slot_for(table, id) {
                Some(slot) => {
                    let tracked = &mut self.tracked[slot];
                    tracked.record = Box::new(record);
                    tracked.state = ObjectState::Persistent;
                    tracked.dirty = true;
                    slot
                }
                None => self.push(
                    Box::new(record),
                    ObjectState::Persistent,
                    true,
                    Some(id),
                    None,
                ),
            },
        };
        tracing::debug!(table, slot, "record added to session");
        Handle::new(slot)
    }

    pub fn add_all<M: Model>(&mut self, records: impl IntoIterator<Item = M>) -> Vec<Handle<M>> {
        records.into_iter().map(|r| self.add(r)).collect()
    }

    pub fn get<M: Model>(&self, handle: Handle<M>) -> Option<&M> {
        self.tracked
            .get(handle.slot)?
            .record
            .as_any()
            .downcast_ref::<M>()
    }

    /// Mutable access to a tracked record. Persistent records become dirty and
    /// are written on the next commit.
    pub fn get_mut<M: Model>(&mut self, handle: Handle<M>) -> Option<&mut M> {
        let tracked = self.tracked.get_mut(handle.slot)?;
        if tracked.state == ObjectState::Persistent {
            tracked.dirty = true;
        }
        tracked.record.as_any_mut().downcast_mut::<M>()
    }

    pub fn state<M: Model>(&self, handle: Handle<M>) -> Option<ObjectState> {
        self.tracked.get(handle.slot).map(|t| t.state)
    }

    /// Loads the row with primary key `id` and tracks it.
    ///
    /// Returns the existing handle when the row is already tracked, and `None`
    /// when it does not exist or is queued for deletion.
    pub fn find<M: Model>(&mut self, id: i64) -> Result<Option<Handle<M>>> {
        let table = <M as Model>::table();
        if let Some(slot) = self.slot_for(table.name, id) {
            return Ok(match self.tracked[slot].state {
                ObjectState::Deleted => None,
                _ => Some(Handle::new(slot)),
            });
        }

        let key = ColumnRef::new(table.name, table.primary_key());
        let found = self.query::<M>().filter_eq(key, id).first()?;
        Ok(found.map(|record| {
            let snapshot = record.clone_record();
            Handle::new(self.push(
                Box::new(record),
                ObjectState::Persistent,
                false,
                Some(id),
                Some(snapshot),
            ))
        }))
    }

    /// Queues a tracked record for deletion.
    ///
    /// A record that was only added is simply forgotten.
    pub fn delete<M: Model>(&mut self, handle: Handle<M>) -> Result<()> {
        let table = <M as Model>::table().name;
        let tracked = self
            .tracked
            .get_mut(handle.slot)
            .ok_or(OrmError::NotPersistent(table))?;
        match tracked.state {
            ObjectState::Pending => tracked.state = ObjectState::Detached,
            ObjectState::Persistent => tracked.state = ObjectState::Deleted,
            ObjectState::Deleted => {}
            ObjectState::Detached => return Err(OrmError::NotPersistent(table)),
        }
        tracing::debug!(table, slot = handle.slot, "record marked for deletion");
        Ok(())
    }

    pub fn query<M: Model>(&self) -> Query<'_, M, M> {
        Query::entities(&self.engine)
    }

    /// Selects only `columns` of `M`'s table; each row arrives as a tuple.
    pub fn query_columns<M: Model, T: FromColumns>(
        &self,
        columns: &[ColumnRef],
    ) -> Query<'_, M, T> {
        Query::projection(&self.engine, columns)
    }

    pub fn pending_count(&self) -> usize {
        self.tracked.iter().filter(|t| t.has_pending_work()).count()
    }

    /// Writes every pending change in one transaction.
    ///
    /// On error nothing is written and the pending changes are kept.
    pub fn commit(&mut self) -> Result<()> {
        let started_at = Instant::now();
        self.validate()?;

        let mut deletes = Vec::new();
        let mut updates = Vec::new();
        let mut inserts = Vec::new();
        for (slot, tracked) in self.tracked.iter().enumerate() {
            match tracked.state {
                ObjectState::Deleted => deletes.push(slot),
                ObjectState::Persistent if tracked.dirty => updates.push(slot),
                ObjectState::Pending => inserts.push(slot),
                _ => {}
            }
        }
        if deletes.is_empty() && updates.is_empty() && inserts.is_empty() {
            tracing::debug!("nothing to commit");
            return Ok(());
        }

        let tracked = &self.tracked;
        let new_ids = self.engine.with_conn(|conn| {
            let tx = conn.transaction()?;
            for &slot in &deletes {
                let table = tracked[slot].record.table();
                let id = tracked[slot].key.ok_or(OrmError::NotPersistent(table.name))?;
                if tx.execute(&table.delete_sql(), [id])? == 0 {
                    return Err(OrmError::StaleRecord {
                        table: table.name,
                        id,
                    });
                }
            }
            for &slot in &updates {
                let record = &tracked[slot].record;
                let table = record.table();
                let id = tracked[slot].key.ok_or(OrmError::NotPersistent(table.name))?;
                let mut values = record.values();
                values.push(Value::Integer(id));
                if tx.execute(&table.update_sql(), params_from_iter(values.iter()))? == 0 {
                    return Err(OrmError::StaleRecord {
                        table: table.name,
                        id,
                    });
                }
            }
            let mut ids = Vec::with_capacity(inserts.len());
            for &slot in &inserts {
                let record = &tracked[slot].record;
                let table = record.table();
                tx.execute(&table.insert_sql(), params_from_iter(record.values().iter()))?;
                ids.push((slot, tx.last_insert_rowid()));
            }
            tx.commit()?;
            Ok(ids)
        })?;

        for (slot, id) in new_ids {
            self.tracked[slot].record.set_id(id);
        }
        for tracked in &mut self.tracked {
            match tracked.state {
                ObjectState::Pending | ObjectState::Persistent => {
                    tracked.state = ObjectState::Persistent;
                    tracked.dirty = false;
                    tracked.key = tracked.record.id();
                    tracked.committed = Some(tracked.record.clone_record());
                }
                ObjectState::Deleted => {
                    tracked.state = ObjectState::Detached;
                    tracked.key = None;
                    tracked.committed = None;
                }
                ObjectState::Detached => {}
            }
        }

        tracing::info!(
            inserted = inserts.len(),
            updated = updates.len(),
            deleted = deletes.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "session committed"
        );
        Ok(())
    }

    /// Discards every uncommitted change. Committed rows are untouched.
    pub fn rollback(&mut self) {
        let mut discarded = 0usize;
        for tracked in &mut self.tracked {
            match tracked.state {
                ObjectState::Pending => {
                    tracked.state = ObjectState::Detached;
                    discarded += 1;
                }
                ObjectState::Deleted => {
                    tracked.state = ObjectState::Persistent;
                    discarded += 1;
                }
                ObjectState::Persistent if tracked.dirty => {
                    match &tracked.committed {
                        Some(snapshot) => tracked.record = snapshot.clone_record(),
                        None => tracked.state = ObjectState::Detached,
                    }
                    tracked.dirty = false;
                    discarded += 1;
                }
                _ => {}
            }
        }
        tracing::info!(discarded, "session rolled back");
    }

    /// Releases the session. Uncommitted changes are discarded.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        let pending = self.pending_count();
        if pending > 0 {
            tracing::warn!(pending, "closing session with uncommitted changes");
        }
        self.tracked.clear();
        self.released = true;
        tracing::debug!("session closed");
    }

    fn push(
        &mut self,
        record: Box<dyn Record>,
        state: ObjectState,
        dirty: bool,
        key: Option<i64>,
        committed: Option<Box<dyn Record>>,
    ) -> usize {
        self.tracked.push(Tracked {
            record,
            state,
            dirty,
            key,
            committed,
        });
        self.tracked.len() - 1
    }

    fn slot_for(&self, table: &str, id: i64) -> Option<usize> {
        self.tracked.iter().position(|t| {
            matches!(t.state, ObjectState::Persistent | ObjectState::Deleted)
                && t.record.table().name == table
                && t.key == Some(id)
        })
    }

    fn validate(&self) -> Result<()> {
        for tracked in &self.tracked {
            if let Some(stored) = tracked.key {
                let current = tracked.record.id();
                if matches!(tracked.state, ObjectState::Persistent | ObjectState::Deleted)
                    && current != Some(stored)
                {
                    return Err(OrmError::IdentityChanged {
                        table: tracked.record.table().name,
                        stored,
                        current,
                    });
                }
            }
        }
        for tracked in self.tracked.iter().filter(|t| t.writes_values()) {
            let table = tracked.record.table();
            for (column, value) in table.data_columns().zip(tracked.record.values()) {
                if let (Some(max), Some(actual)) = (column.max_len(), value.char_len()) {
                    if actual > max {
                        return Err(OrmError::ValueTooLong {
                            table: table.name,
                            column: column.name,
                            max,
                            actual,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("engine", &self.engine)
            .field("tracked", &self.tracked.len())
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::schema::{Column, MetaData, Table};
    use crate::orm::create_engine;
    use rusqlite::Row;

    static NOTES: Table = Table::new(
        "notes",
        &[
            Column::integer("id").primary_key(),
            Column::string("body", 10).not_null(),
        ],
    );

    #[derive(Clone, Debug, PartialEq)]
    struct Note {
        id: Option<i64>,
        body: String,
    }

    impl Note {
        const ID: ColumnRef = ColumnRef::new("notes", "id");
        const BODY: ColumnRef = ColumnRef::new("notes", "body");

        fn new(body: &str) -> Self {
            Self {
                id: None,
                body: body.to_string(),
            }
        }
    }

    impl Model for Note {
        fn table() -> &'static Table {
            &NOTES
        }

        fn id(&self) -> Option<i64> {
            self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = Some(id);
        }

        fn values(&self) -> Vec<Value> {
            vec![Value::from(self.body.as_str())]
        }

        fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Self {
                id: row.get(0)?,
                body: row.get(1)?,
            })
        }
    }

    fn setup() -> Session {
        let engine = create_engine("sqlite://");
        let mut metadata = MetaData::new();
        metadata.register::<Note>();
        metadata.create_all(&engine).unwrap();
        engine.session()
    }

    #[test]
    fn add_does_not_touch_storage() {
        let engine = create_engine("sqlite://");
        let mut session = engine.session();
        let h = session.add(Note::new("hello"));
        assert_eq!(session.state(h), Some(ObjectState::Pending));
        assert!(!engine.is_connected());
    }

    #[test]
    fn commit_assigns_ids() {
        let mut session = setup();
        let a = session.add(Note::new("a"));
        let b = session.add(Note::new("b"));
        assert_eq!(session.get(a).unwrap().id, None);

        session.commit().unwrap();

        let id_a = session.get(a).unwrap().id.unwrap();
        let id_b = session.get(b).unwrap().id.unwrap();
        assert_ne!(id_a, id_b);
        assert_eq!(session.state(a), Some(ObjectState::Persistent));
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn rollback_discards_pending_insert() {
        let mut session = setup();
        let h = session.add(Note::new("gone"));
        session.rollback();
        session.commit().unwrap();

        assert_eq!(session.state(h), Some(ObjectState::Detached));
        assert_eq!(session.get(h).unwrap().id, None);
        assert_eq!(session.query::<Note>().count().unwrap(), 0);
    }

    #[test]
    fn too_long_value_fails_whole_commit() {
        let mut session = setup();
        session.add(Note::new("fine"));
        let long = session.add(Note::new("far too long for ten"));

        let err = session.commit().unwrap_err();
        assert!(matches!(
            err,
            OrmError::ValueTooLong { column: "body", max: 10, .. }
        ));
        assert_eq!(session.query::<Note>().count().unwrap(), 0);
        assert_eq!(session.pending_count(), 2);

        session.get_mut(long).unwrap().body = "short".into();
        session.commit().unwrap();
        assert_eq!(session.query::<Note>().count().unwrap(), 2);
    }

    #[test]
    fn update_and_rollback_restores_committed_values() {
        let mut session = setup();
        let h = session.add(Note::new("v1"));
        session.commit().unwrap();

        session.get_mut(h).unwrap().body = "v2".into();
        session.rollback();
        assert_eq!(session.get(h).unwrap().body, "v1");

        session.get_mut(h).unwrap().body = "v3".into();
        session.commit().unwrap();
        let bodies = session
            .query_columns::<Note, (String,)>(&[Note::BODY])
            .all()
            .unwrap();
        assert_eq!(bodies, vec![("v3".to_string(),)]);
    }

    #[test]
    fn delete_applies_on_commit_and_rollback_cancels_it() {
        let mut session = setup();
        let h = session.add(Note::new("doomed"));
        session.commit().unwrap();

        session.delete(h).unwrap();
        session.rollback();
        assert_eq!(session.state(h), Some(ObjectState::Persistent));

        session.delete(h).unwrap();
        session.commit().unwrap();
        assert_eq!(session.state(h), Some(ObjectState::Detached));
        assert_eq!(session.query::<Note>().count().unwrap(), 0);
        assert!(matches!(session.delete(h), Err(OrmError::NotPersistent("notes"))));
    }

    #[test]
    fn find_uses_identity_map() {
        let mut session = setup();
        let h = session.add(Note::new("x"));
        session.commit().unwrap();
        let id = session.get(h).unwrap().id.unwrap();

        assert_eq!(session.find::<Note>(id).unwrap(), Some(h));
        assert_eq!(session.find::<Note>(id + 100).unwrap(), None);

        let mut other = session.engine().session();
        let loaded = other.find::<Note>(id).unwrap().unwrap();
        assert_eq!(other.get(loaded).unwrap().body, "x");
    }

    #[test]
    fn query_orders_and_filters() {
        let mut session = setup();
        session.add_all(["c", "a", "b"].map(Note::new));
        session.commit().unwrap();

        let ids = session
            .query::<Note>()
            .order_by(Note::ID)
            .iter()
            .unwrap()
            .map(|n| n.id.unwrap())
            .collect::<Vec<_>>();
        assert!(ids.windows(2).all(|w| w[0] <= w[1]));

        let desc = session
            .query::<Note>()
            .order_by_desc(Note::BODY)
            .all()
            .unwrap();
        assert_eq!(desc[0].body, "c");

        let only_b = session
            .query::<Note>()
            .filter_eq(Note::BODY, "b")
            .first()
            .unwrap()
            .unwrap();
        assert_eq!(only_b.body, "b");
    }

    #[test]
    fn query_reports_foreign_columns_and_arity() {
        let session = setup();
        let foreign = ColumnRef::new("elsewhere", "id");
        let err = session.query::<Note>().order_by(foreign).all().unwrap_err();
        assert!(matches!(err, OrmError::UnknownColumn { .. }));

        let err = session
            .query_columns::<Note, (i64, String)>(&[Note::ID])
            .all()
            .unwrap_err();
        assert!(matches!(
            err,
            OrmError::ProjectionArity { expected: 2, actual: 1 }
        ));
    }

    #[test]
    fn first_keeps_a_zero_limit() {
        let mut session = setup();
        session.add(Note::new("only"));
        session.commit().unwrap();

        assert!(session.query::<Note>().limit(0).first().unwrap().is_none());
        assert!(session.query::<Note>().limit(3).first().unwrap().is_some());
    }

    #[test]
    fn order_sql_is_stable() {
        let session = setup();
        let q = session
            .query::<Note>()
            .filter_eq(Note::BODY, "x")
            .order_by(Note::ID)
            .limit(5);
        assert_eq!(
            q.sql(),
            "SELECT \"id\", \"body\" FROM \"notes\" WHERE \"body\" = ?1 ORDER BY \"id\" ASC LIMIT 5"
        );
    }

    #[test]
    fn changed_primary_key_is_rejected_without_writing() {
        let mut session = setup();
        let a = session.add(Note::new("a"));
        let b = session.add(Note::new("b"));
        session.commit().unwrap();
        let id_a = session.get(a).unwrap().id.unwrap();
        let id_b = session.get(b).unwrap().id.unwrap();

        let note = session.get_mut(a).unwrap();
        note.id = Some(id_b);
        note.body = "hijack".into();
        let err = session.commit().unwrap_err();
        assert!(matches!(
            err,
            OrmError::IdentityChanged { table: "notes", stored, current }
                if stored == id_a && current == Some(id_b)
        ));

        let bodies = session
            .query_columns::<Note, (i64, String)>(&[Note::ID, Note::BODY])
            .order_by(Note::ID)
            .all()
            .unwrap();
        assert_eq!(
            bodies,
            vec![(id_a, "a".to_string()), (id_b, "b".to_string())]
        );

        session.rollback();
        assert_eq!(session.get(a).unwrap().id, Some(id_a));
        session.get_mut(a).unwrap().body = "a2".into();
        session.commit().unwrap();
        assert_eq!(session.find::<Note>(id_a).unwrap(), Some(a));
        assert_eq!(session.get(b).unwrap().body, "b");
    }

    #[test]
    fn adding_a_deleted_row_cancels_the_deletion() {
        let mut session = setup();
        let h = session.add(Note::new("kept"));
        session.commit().unwrap();
        let stored = session.get(h).unwrap().clone();

        session.delete(h).unwrap();
        let again = session.add(stored);
        assert_eq!(again, h);
        assert_eq!(session.state(h), Some(ObjectState::Persistent));

        session.commit().unwrap();
        assert_eq!(session.query::<Note>().count().unwrap(), 1);
    }

    #[test]
    fn close_discards_pending_work() {
        let mut session = setup();
        let engine = session.engine().clone();
        session.add(Note::new("never"));
        session.close();

        let session = engine.session();
        assert_eq!(session.query::<Note>().count().unwrap(), 0);
    }
}
