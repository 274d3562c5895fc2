//! Pidfile held for the lifetime of the process
//!
//! Failing to create or remove the file is logged and otherwise ignored.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Guard that removes the pidfile when dropped.
#[derive(Debug)]
pub struct Pidfile {
    path: Option<PathBuf>,
}

impl Pidfile {
    /// Write the current pid to `path`. An empty path disables the pidfile.
    pub fn acquire(path: &Path) -> Self {
        if path.as_os_str().is_empty() {
            return Self { path: None };
        }

        match write_pid(path) {
            Ok(()) => {
                debug!("Wrote pidfile {}", path.display());
                Self {
                    path: Some(path.to_path_buf()),
                }
            }
            Err(e) => {
                error!("Unable to create pidfile: {}", e);
                Self { path: None }
            }
        }
    }

    /// Path of the file this guard owns, if one was written.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                error!("Unable to remove pidfile: {}", e);
            }
        }
    }
}

impl Drop for Pidfile {
    fn drop(&mut self) {
        self.remove();
    }
}

fn write_pid(path: &Path) -> io::Result<()> {
    create_with(path, |file| writeln!(file, "{}", std::process::id()))
}

/// Create `path` and fill it with `write`. A partially written file is removed.
fn create_with<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    if let Err(e) = write(&mut file).and_then(|()| file.flush()) {
        drop(file);
        if let Err(remove) = std::fs::remove_file(path) {
            debug!("Unable to remove partial pidfile: {}", remove);
        }
        return Err(e);
    }
    Ok(())
}
