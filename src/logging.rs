//! Logging setup
//!
//! The subscriber is installed once per process. Level and destination are
//! applied again on every reload cycle, so both sit behind handles: a reload
//! layer for the filter and a swappable writer for the destination.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::level_filters::LevelFilter;
use tracing::{error, warn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Level for the debug and quiet switches. Quiet wins.
pub fn level_for(debug: bool, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::ERROR
    } else if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Shared log destination: a file when one is configured, stderr otherwise.
#[derive(Debug, Clone, Default)]
pub struct LogDestination {
    file: Arc<Mutex<Option<File>>>,
}

impl LogDestination {
    pub fn set_file(&self, file: Option<File>) {
        *self.file.lock().unwrap_or_else(PoisonError::into_inner) = file;
    }

    pub fn is_file(&self) -> bool {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

pub struct DestinationWriter {
    file: Arc<Mutex<Option<File>>>,
}

impl Write for DestinationWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        match file.as_mut() {
            Some(f) => f.write(buf),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        match file.as_mut() {
            Some(f) => f.flush(),
            None => io::stderr().flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogDestination {
    type Writer = DestinationWriter;

    fn make_writer(&'a self) -> Self::Writer {
        DestinationWriter {
            file: self.file.clone(),
        }
    }
}

/// Handles for adjusting the installed subscriber.
#[derive(Clone)]
pub struct Logging {
    filter: reload::Handle<EnvFilter, Registry>,
    destination: LogDestination,
}

impl Logging {
    /// Install the global subscriber. `RUST_LOG` overrides the initial level
    /// until the first configuration is applied.
    pub fn init(debug: bool, quiet: bool) -> Self {
        let initial = EnvFilter::builder()
            .with_default_directive(level_for(debug, quiet).into())
            .from_env_lossy();
        let (filter, handle) = reload::Layer::new(initial);
        let destination = LogDestination::default();

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(destination.clone()),
            )
            .try_init();
        if let Err(e) = installed {
            eprintln!("Warning: Failed to install log subscriber: {}", e);
        }

        Self {
            filter: handle,
            destination,
        }
    }

    /// Apply per-cycle settings. A log file that cannot be opened falls back
    /// to stderr.
    pub fn apply(&self, debug: bool, quiet: bool, logfile: Option<&Path>) {
        let filter = EnvFilter::default().add_directive(level_for(debug, quiet).into());
        if let Err(e) = self.filter.reload(filter) {
            warn!("Unable to change log level: {}", e);
        }

        match logfile {
            Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => self.destination.set_file(Some(file)),
                Err(e) => {
                    self.destination.set_file(None);
                    error!(
                        "Unable to open {} ({}), using stderr",
                        path.display(),
                        e
                    );
                }
            },
            None => self.destination.set_file(None),
        }
    }
}

/// Thread-local subscriber that records formatted events in memory.
#[cfg(test)]
pub(crate) mod capture {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex, PoisonError};
    use tracing::subscriber::DefaultGuard;

    #[derive(Clone, Default)]
    pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub(crate) fn contents(&self) -> String {
            let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Record every event on the current thread until the guard is dropped.
    pub(crate) fn capture_logs() -> (CapturedLogs, DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }
}
