//! The guided tour: every step of a session lifecycle, printed as it happens.

use std::io::Write;

use anyhow::{Context, Result};

use crate::models::{self, User};
use crate::orm::{Engine, ObjectState, SessionFactory};

/// What the tour left behind, for callers that want to check it.
#[derive(Debug)]
pub struct Summary {
    pub created: User,
    pub listed: Vec<User>,
    pub pairs: Vec<(String, String)>,
}

pub fn run(
    engine: &Engine,
    name: &str,
    full_name: &str,
    out: &mut dyn Write,
) -> Result<Summary> {
    let target = engine
        .url()
        .map(|url| url.to_string())
        .unwrap_or_else(|_| engine.descriptor().to_string());
    writeln!(
        out,
        "engine ready for {target} (connected: {})",
        engine.is_connected()
    )?;

    let metadata = models::metadata();
    metadata.create_all(engine).context("creating tables")?;
    for table in metadata.tables() {
        let columns = table.columns.iter().map(|c| c.name).collect::<Vec<_>>();
        writeln!(out, "model defined: {} ({})", table.name, columns.join(", "))?;
    }

    writeln!(out, "creating instances of the mapped class")?;
    let ed_user = User::new(name, full_name);
    writeln!(out, "ed_user.name: {}", ed_user.name)?;
    writeln!(out, "ed_user.full_name: {}", ed_user.full_name)?;

    let factory = SessionFactory::new(engine.clone());
    let mut session = factory.session();

    let ed = session.add(ed_user);
    let before = session.get(ed).and_then(|u| u.id);
    writeln!(out, "ed_user.id before commit: {before:?}")?;

    session.commit().context("committing ed_user")?;
    let created = session
        .get(ed)
        .cloned()
        .context("ed_user is no longer tracked")?;
    match created.id {
        Some(id) => writeln!(out, "ed_user.id after commit: {id}")?,
        None => anyhow::bail!("commit did not assign an id"),
    }

    let fake = session.add(User::new("fakeuser", "Invalid"));
    writeln!(out, "pending before rollback: {}", session.pending_count())?;
    session.rollback();
    writeln!(
        out,
        "pending after rollback: {} (fakeuser detached: {})",
        session.pending_count(),
        session.state(fake) == Some(ObjectState::Detached)
    )?;

    let listed = session
        .query::<User>()
        .order_by(User::ID)
        .all()
        .context("querying users")?;
    for instance in &listed {
        writeln!(out, "instance now: ({}, {})", instance.name, instance.full_name)?;
    }

    let pairs = session
        .query_columns::<User, (String, String)>(&[User::NAME, User::FULL_NAME])
        .all()
        .context("querying names")?;
    for (name, full_name) in &pairs {
        writeln!(out, "{name} {full_name}")?;
    }

    session.close();
    writeln!(out, "session closed")?;

    Ok(Summary {
        created,
        listed,
        pairs,
    })
}
