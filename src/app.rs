use crate::{
    cli,
    commands::CommandRunner,
    configuration::Configuration,
    orm::{self, Engine},
};
use anyhow::{Context as AnyhowContext, Result};
use std::io::Write;
use std::path::Path;

/// The application state, decoupled from CLI parsing so tests can build it
/// from a plain [`Configuration`].
pub struct App {
    config: Configuration,
    engine: Engine,
}

impl App {
    /// Builds the App from CLI arguments, applying logging and reset side effects.
    pub fn from_cli() -> Result<(App, cli::Cli)> {
        let cli = cli::parse();

        crate::tracing::set_log_file(cli.log_file.as_deref().map(Path::new))
            .context("opening log file")?;

        let config = Configuration::from_cli(&cli);
        Ok((App::new(config)?, cli))
    }

    /// No connection is opened here; the engine connects on first use.
    pub fn new(config: Configuration) -> Result<Self> {
        log_startup_info(&config);
        if config.reset {
            reset_database(&config).context("resetting database")?;
        }
        let engine = orm::create_engine(config.database_url.clone());
        Ok(Self { config, engine })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn execute(&self, cmd: &cli::Command, out: &mut dyn Write) -> Result<()> {
        log::debug!("running {:?} against {}", cmd, masked_url(&self.config.database_url));
        cmd.run(&self.engine, out)
    }
}

fn masked_url(raw: &str) -> String {
    raw.parse::<orm::DatabaseUrl>()
        .map(|url| url.to_string())
        .unwrap_or_else(|_| "<unparseable url>".to_string())
}

fn log_startup_info(config: &Configuration) {
    log::info!("🚀 Starting ormtour");
    log::info!("🔗 Database: {}", masked_url(&config.database_url));
    if let Some(path) = config.log_file.as_deref() {
        log::info!("📝 Log file: {}", path.display());
    }
}

fn reset_database(config: &Configuration) -> Result<()> {
    let Some(path) = config.sqlite_path() else {
        log::warn!("--reset only applies to SQLite database files");
        return Ok(());
    };

    for suffix in ["", "-wal", "-shm"] {
        let mut target = path.clone().into_os_string();
        target.push(suffix);
        let target = Path::new(&target);
        if target.exists() {
            std::fs::remove_file(target)
                .with_context(|| format!("removing {}", target.display()))?;
        }
    }
    log::info!("🧹 Removed {}", path.display());
    Ok(())
}

// --- Entry Point ---

pub fn run() -> Result<()> {
    let (app, cli) = App::from_cli()?;
    let cmd = cli.cmd.clone().unwrap_or_default();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    app.execute(&cmd, &mut out)
}
