use std::io::Write;

use anyhow::{Context, Result};

use crate::models::{self, User};
use crate::orm::Engine;

fn ensure_schema(engine: &Engine) -> Result<()> {
    models::metadata()
        .create_all(engine)
        .context("creating tables")
}

pub fn create_all(engine: &Engine, out: &mut dyn Write) -> Result<()> {
    ensure_schema(engine)?;
    for table in models::metadata().tables() {
        writeln!(out, "{}", table.create_sql())?;
    }
    Ok(())
}

pub fn add(engine: &Engine, name: &str, full_name: &str, out: &mut dyn Write) -> Result<()> {
    ensure_schema(engine)?;
    let mut session = engine.session();
    let handle = session.add(User::new(name, full_name));
    session.commit().context("committing new user")?;

    let user = session.get(handle).context("new user is no longer tracked")?;
    let id = user.id.context("commit did not assign an id")?;
    log::info!("added user id={} name={}", id, user.name);
    writeln!(out, "{id}")?;
    session.close();
    Ok(())
}

pub fn list(engine: &Engine, desc: bool, json: bool, out: &mut dyn Write) -> Result<()> {
    ensure_schema(engine)?;
    let session = engine.session();
    let query = session.query::<User>();
    let query = if desc {
        query.order_by_desc(User::ID)
    } else {
        query.order_by(User::ID)
    };

    for user in query.iter().context("querying users")? {
        if json {
            writeln!(out, "{}", serde_json::to_string(&user)?)?;
        } else {
            let id = user.id.map_or_else(|| "-".to_string(), |id| id.to_string());
            writeln!(out, "{id}\t{user}")?;
        }
    }
    session.close();
    Ok(())
}

pub fn names(engine: &Engine, out: &mut dyn Write) -> Result<()> {
    ensure_schema(engine)?;
    let session = engine.session();
    let pairs = session
        .query_columns::<User, (String, String)>(&[User::NAME, User::FULL_NAME])
        .order_by(User::ID)
        .iter()
        .context("querying names")?;
    for (name, full_name) in pairs {
        writeln!(out, "{name} {full_name}")?;
    }
    session.close();
    Ok(())
}

pub fn rename(engine: &Engine, id: i64, name: &str, out: &mut dyn Write) -> Result<()> {
    ensure_schema(engine)?;
    let mut session = engine.session();
    let handle = session
        .find::<User>(id)?
        .with_context(|| format!("no user with id {id}"))?;

    let user = session.get_mut(handle).context("user is no longer tracked")?;
    let previous = std::mem::replace(&mut user.name, name.to_string());
    session.commit().context("committing rename")?;

    log::info!("renamed user id={} {} -> {}", id, previous, name);
    writeln!(out, "{previous} -> {name}")?;
    session.close();
    Ok(())
}

pub fn delete(engine: &Engine, id: i64, out: &mut dyn Write) -> Result<()> {
    ensure_schema(engine)?;
    let mut session = engine.session();
    let handle = session
        .find::<User>(id)?
        .with_context(|| format!("no user with id {id}"))?;

    session.delete(handle)?;
    session.commit().context("committing delete")?;

    log::info!("deleted user id={}", id);
    writeln!(out, "deleted {id}")?;
    session.close();
    Ok(())
}
