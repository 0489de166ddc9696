/// Append-only line writer for the tick log.
///
/// The writer is an ordinary owned value: the caller opens it, shares it
/// (usually behind an `Arc`), and closes it. Closing is final; later writes
/// fail with [`FileWriterError::Closed`]. An exclusive advisory lock on
/// the file keeps a second writer, in this process or another, from
/// interleaving lines with ours.
use chrono::{SecondsFormat, Utc};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileWriterError {
    #[error("failed to open log file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("log file {} is locked by another writer", .path.display())]
    Locked { path: PathBuf },
    #[error("failed to write log file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("log file {} is closed", .path.display())]
    Closed { path: PathBuf },
}

#[derive(Debug)]
pub struct FileWriter {
    path: PathBuf,
    timestamps: bool,
    file: Mutex<Option<File>>,
}

impl FileWriter {
    /// Open `path` for appending, creating it if needed, and lock it.
    pub fn open(path: impl Into<PathBuf>, timestamps: bool) -> Result<Self, FileWriterError> {
        let path = path.into();
        let file = open_locked(&path)?;
        tracing::debug!(path = %path.display(), "log file opened");
        Ok(Self {
            path,
            timestamps,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.file.lock().is_some()
    }

    /// Append one line.
    pub fn write(&self, message: &str) -> Result<(), FileWriterError> {
        let mut guard = self.file.lock();
        let Some(file) = guard.as_mut() else {
            return Err(FileWriterError::Closed {
                path: self.path.clone(),
            });
        };

        let line = if self.timestamps {
            format!(
                "{} {message}\n",
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
            )
        } else {
            format!("{message}\n")
        };

        file.write_all(line.as_bytes())
            .map_err(|e| FileWriterError::Write {
                path: self.path.clone(),
                source: e,
            })
    }

    /// Flush, unlock and release the handle. No-op when already closed.
    pub fn close(&self) -> Result<(), FileWriterError> {
        let Some(mut file) = self.file.lock().take() else {
            return Ok(());
        };
        let flushed = file.flush().map_err(|e| FileWriterError::Write {
            path: self.path.clone(),
            source: e,
        });
        // Dropping the handle releases the lock as well; unlock explicitly so
        // a failure shows up in the logs.
        if let Err(e) = FileExt::unlock(&file) {
            tracing::warn!(error = %e, path = %self.path.display(), "failed to unlock log file");
        }
        tracing::debug!(path = %self.path.display(), "log file closed");
        flushed
    }
}

fn open_locked(path: &Path) -> Result<File, FileWriterError> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }

    let file = options.open(path).map_err(|e| FileWriterError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;

    file.try_lock_exclusive()
        .map_err(|_| FileWriterError::Locked {
            path: path.to_path_buf(),
        })?;
    Ok(file)
}
