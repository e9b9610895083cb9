//! Process-wide log subscriber.
//!
//! Events go to stderr and, once [`set_log_file`] is called, are appended to a
//! file as well. `RUST_LOG` overrides the default `info` filter.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

type SharedFile = Arc<Mutex<Option<File>>>;

#[derive(Clone)]
struct TeeMakeWriter {
    file: SharedFile,
}

struct TeeWriter {
    file: SharedFile,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for TeeMakeWriter {
    type Writer = TeeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TeeWriter {
            file: self.file.clone(),
        }
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = io::stderr().write(buf)?;
        if let Ok(mut guard) = self.file.lock() {
            if let Some(file) = guard.as_mut() {
                // A failing log file must not take stderr logging down with it.
                let _ = file.write_all(&buf[..written]);
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Ok(mut guard) = self.file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

static LOG_FILE: OnceLock<SharedFile> = OnceLock::new();

/// Installs the global subscriber and bridges `log` records into it.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = tracing_log::LogTracer::init();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let file = LOG_FILE.get_or_init(|| Arc::new(Mutex::new(None))).clone();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(TeeMakeWriter { file })
        .with_target(false)
        .try_init();
}

/// Starts (or with `None` stops) copying log output to a file.
pub fn set_log_file(log_file: Option<&Path>) -> io::Result<()> {
    let Some(shared) = LOG_FILE.get() else {
        return Ok(());
    };

    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Some(OpenOptions::new().create(true).append(true).open(path)?)
        }
        None => None,
    };

    let mut guard = shared
        .lock()
        .map_err(|_| io::Error::other("log file lock poisoned"))?;
    *guard = file;
    Ok(())
}
