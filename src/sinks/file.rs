//! File sink implementation
//!
//! Plain file sink used when rotation is disabled (`max_bytes == 0`), plus
//! the open-and-lock helper shared with the rotating sink.

use crate::core::{FileMode, LogLevel, LogRecord, RelayError, Result, Sink};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Open a log file, creating parent directories, and take an exclusive
/// advisory lock on it so no second relay writes the same file.
pub(crate) fn open_locked(path: &Path, mode: FileMode) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            RelayError::io_operation(
                "create log directory",
                format!("Failed to create directory '{}'", parent.display()),
                e,
            )
        })?;
    }

    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        FileMode::Append => options.append(true),
        // Truncation happens after the lock is held
        FileMode::Truncate => options.write(true),
    };
    let file = options.open(path).map_err(|e| {
        RelayError::file_sink(path.display().to_string(), format!("Failed to open: {}", e))
    })?;

    lock(&file, path)?;

    if mode == FileMode::Truncate {
        file.set_len(0).map_err(|e| {
            RelayError::file_sink(
                path.display().to_string(),
                format!("Failed to truncate: {}", e),
            )
        })?;
    }
    Ok(file)
}

#[cfg(feature = "file")]
fn lock(file: &File, path: &Path) -> Result<()> {
    use fs2::FileExt;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
            Err(RelayError::file_locked(path.display().to_string()))
        }
        // Filesystems without advisory locks still get logs
        Err(_) => Ok(()),
    }
}

#[cfg(not(feature = "file"))]
fn lock(_file: &File, _path: &Path) -> Result<()> {
    Ok(())
}

pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    level: Option<LogLevel>,
}

impl FileSink {
    /// Open a file sink
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or another relay holds it
    pub fn open(path: impl Into<PathBuf>, mode: FileMode) -> Result<Self> {
        let path = path.into();
        let file = open_locked(&path, mode)?;

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            level: None,
        })
    }

    #[must_use]
    pub fn with_level(mut self, level: Option<LogLevel>) -> Self {
        self.level = level;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write(&mut self, line: &str, _record: &LogRecord) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RelayError::file_sink(self.path.display().to_string(), "closed"))?;

        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }

    fn level(&self) -> Option<LogLevel> {
        self.level
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // Flush and release the file handle (and its lock)
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}
