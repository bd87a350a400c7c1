//! Rotating file sink with size-based rotation
//!
//! The active file is `base`; backups are `base.1` (newest) through
//! `base.N` where `N` is the backup count. Rotation runs inside `write`,
//! before the line that would push the active file past `max_bytes`, so a
//! rotation never interleaves with another write and no line is split or
//! duplicated across files.

use super::file::open_locked;
use crate::core::{FileMode, LogLevel, LogRecord, RelayError, Result, Sink};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Configuration for rotating file sink
///
/// # Examples
///
/// ```
/// use log_relay::sinks::RotationPolicy;
///
/// let policy = RotationPolicy::new()
///     .with_max_bytes(50 * 1024 * 1024)
///     .with_backup_count(7)
///     .with_compression(true);
/// assert_eq!(policy.backup_count, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Size threshold of the active file
    pub max_bytes: u64,
    /// Number of rotated files to keep; 0 truncates the active file instead
    pub backup_count: usize,
    /// Whether to gzip rotated files (`base.N.gz`)
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024, // 10 MB
            backup_count: 5,
            compress: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_backup_count(mut self, count: usize) -> Self {
        self.backup_count = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

/// Rotating file sink
///
/// # Examples
///
/// ```no_run
/// use log_relay::sinks::{RotatingFileSink, RotationPolicy};
/// use log_relay::FileMode;
///
/// let policy = RotationPolicy::new().with_max_bytes(1024 * 1024).with_backup_count(3);
/// let sink = RotatingFileSink::open("/var/log/app.log", policy, FileMode::Append).unwrap();
/// ```
pub struct RotatingFileSink {
    base_path: PathBuf,
    policy: RotationPolicy,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    rotations: u64,
    /// Counter for consecutive deletion failures (reset on successful deletion)
    deletion_failure_count: usize,
    level: Option<LogLevel>,
    warnings: Vec<String>,
}

impl RotatingFileSink {
    /// Open a rotating file sink
    ///
    /// `mode` only applies when rotation is disabled (`max_bytes == 0`); a
    /// rotating file is always opened for append, so a restart never wipes
    /// the active file while its backups survive.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or another relay holds it
    pub fn open<P: AsRef<Path>>(path: P, policy: RotationPolicy, mode: FileMode) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        let mode = if policy.max_bytes > 0 {
            FileMode::Append
        } else {
            mode
        };
        let file = open_locked(&base_path, mode)?;

        let current_size = file
            .metadata()
            .map_err(|e| {
                RelayError::file_sink(
                    base_path.display().to_string(),
                    format!("Cannot access file metadata: {}", e),
                )
            })?
            .len();

        Ok(Self {
            base_path,
            policy,
            writer: Some(BufWriter::new(file)),
            current_size,
            rotations: 0,
            deletion_failure_count: 0,
            level: None,
            warnings: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_level(mut self, level: Option<LogLevel>) -> Self {
        self.level = level;
        self
    }

    /// A write of `incoming` bytes would push a non-empty file past the limit
    fn should_rotate(&self, incoming: u64) -> bool {
        self.policy.max_bytes > 0
            && self.current_size > 0
            && self.current_size + incoming > self.policy.max_bytes
    }

    /// Perform log rotation
    fn rotate(&mut self) -> Result<()> {
        // Flush and close current file, releasing its lock
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                RelayError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        if self.policy.backup_count == 0 {
            let file = open_locked(&self.base_path, FileMode::Truncate)?;
            self.writer = Some(BufWriter::new(file));
            self.current_size = 0;
            self.rotations += 1;
            return Ok(());
        }

        self.evict_oldest()?;

        // Shift base.i -> base.i+1, newest last so nothing is overwritten
        for i in (1..self.policy.backup_count).rev() {
            let old_path = self.backup_path(i);
            let new_path = self.backup_path(i + 1);
            for (from, to) in [(gz_path(&old_path), gz_path(&new_path)), (old_path, new_path)] {
                if from.exists() {
                    rename_replacing(&from, &to)?;
                }
            }
        }

        // Move current file to .1
        let backup_path = self.backup_path(1);
        if self.base_path.exists() {
            fs::rename(&self.base_path, &backup_path).map_err(|e| {
                RelayError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to rotate current log file: {}", e),
                )
            })?;

            if self.policy.compress {
                compress_file(&backup_path, &mut self.warnings)?;
            }
        }

        let file = open_locked(&self.base_path, FileMode::Append)?;
        self.writer = Some(BufWriter::new(file));
        self.current_size = 0;
        self.rotations += 1;

        Ok(())
    }

    /// Delete the backup that would fall past the backup count
    fn evict_oldest(&mut self) -> Result<()> {
        const MAX_DELETION_FAILURES: usize = 5;

        let oldest = self.backup_path(self.policy.backup_count);
        let mut deletion_failed = false;
        for path in [gz_path(&oldest), oldest] {
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    deletion_failed = true;
                    self.warnings.push(format!(
                        "Failed to remove oldest backup {}: {} (failure #{}/{})",
                        path.display(),
                        e,
                        self.deletion_failure_count + 1,
                        MAX_DELETION_FAILURES
                    ));
                }
            }
        }

        if !deletion_failed {
            self.deletion_failure_count = 0;
            return Ok(());
        }

        self.deletion_failure_count += 1;
        if self.deletion_failure_count >= MAX_DELETION_FAILURES {
            return Err(RelayError::file_rotation(
                self.base_path.display().to_string(),
                format!(
                    "Rotation aborted: failed to delete old backup files {} consecutive times",
                    self.deletion_failure_count
                ),
            ));
        }
        Ok(())
    }

    /// Get backup file path for given index
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.base_path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    /// Number of rotations performed since the sink was opened
    #[must_use]
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Try to reopen the log file (used for recovery after rotation failure)
    fn reopen(&mut self) -> Result<()> {
        let file = open_locked(&self.base_path, FileMode::Append)?;
        self.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

fn rename_replacing(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // On some platforms rename fails if the destination exists
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to).map_err(|e| {
        RelayError::file_rotation(
            from.display().to_string(),
            format!("Failed to rotate backup files: {}", e),
        )
    })
}

/// Gzip `path` into `path.gz`, removing the original only on success
fn compress_file(path: &Path, warnings: &mut Vec<String>) -> Result<()> {
    use std::io::BufReader;

    let gz = gz_path(path);
    let mut temp_name = gz.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_gz = PathBuf::from(temp_name);

    let compress = || -> std::io::Result<()> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
        let output = BufWriter::with_capacity(64 * 1024, File::create(&temp_gz)?);
        let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());
        std::io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()?;
        fs::rename(&temp_gz, &gz)
    };

    compress().map_err(|e| {
        let _ = fs::remove_file(&temp_gz);
        RelayError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        )
    })?;

    if let Err(e) = fs::remove_file(path) {
        warnings.push(format!(
            "Compressed {} but failed to remove original: {}",
            path.display(),
            e
        ));
    }
    Ok(())
}

impl Sink for RotatingFileSink {
    fn write(&mut self, line: &str, _record: &LogRecord) -> Result<()> {
        let bytes = line.len() as u64 + 1;

        if self.should_rotate(bytes) {
            if let Err(e) = self.rotate() {
                self.warnings
                    .push(format!("Log rotation failed: {}. Continuing with current file.", e));
                if self.writer.is_none() {
                    self.reopen()?;
                }
                // Let the file grow past the limit rather than retrying every write
                self.current_size = 0;
            }
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RelayError::file_sink(self.base_path.display().to_string(), "closed"))?;

        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| {
                RelayError::file_sink(
                    self.base_path.display().to_string(),
                    format!("Failed to write log line: {}", e),
                )
            })?;
        self.current_size += bytes;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().map_err(|e| {
                RelayError::file_sink(
                    self.base_path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "rotating_file"
    }

    fn level(&self) -> Option<LogLevel> {
        self.level
    }

    fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}
