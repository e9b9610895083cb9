use std::io::Write;

use anyhow::Result;

use crate::cli::Command;
use crate::orm::Engine;

mod users;

pub trait CommandRunner {
    fn run(&self, engine: &Engine, out: &mut dyn Write) -> Result<()>;
}

impl CommandRunner for Command {
    fn run(&self, engine: &Engine, out: &mut dyn Write) -> Result<()> {
        match self {
            Command::Walkthrough { name, full_name } => {
                crate::walkthrough::run(engine, name, full_name, out)?;
                Ok(())
            }
            Command::CreateAll => users::create_all(engine, out),
            Command::Add { name, full_name } => users::add(engine, name, full_name, out),
            Command::List { desc, json } => users::list(engine, *desc, *json, out),
            Command::Names => users::names(engine, out),
            Command::Rename { id, name } => users::rename(engine, *id, name, out),
            Command::Delete { id } => users::delete(engine, *id, out),
        }
    }
}
