#![allow(dead_code)]

use std::process::{Command, Output};

use tempfile::TempDir;

pub fn database_url(dir: &TempDir) -> String {
    format!("sqlite:///{}", dir.path().join("ormtour.sqlite").display())
}

pub fn base_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ormtour"));
    cmd.current_dir(dir.path())
        .env("DOTENV_PATH", dir.path().join("missing.env"))
        .env_remove("DATABASE_URL")
        .env_remove("ORMTOUR_LOG_FILE")
        .env("RUST_LOG", "warn")
        .arg("--database-url")
        .arg(database_url(dir));
    cmd
}

pub fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).expect("utf-8 stdout")
}
