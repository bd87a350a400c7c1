//! Console sink implementation

use crate::core::{LogLevel, LogRecord, RecordFormat, Result, Sink};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTarget {
    Stderr,
    Stdout,
}

pub struct ConsoleSink {
    target: ConsoleTarget,
    level: Option<LogLevel>,
    /// Set when level names should be colored; lines are then re-rendered
    colored_format: Option<RecordFormat>,
}

impl ConsoleSink {
    pub fn stderr() -> Self {
        Self {
            target: ConsoleTarget::Stderr,
            level: None,
            colored_format: None,
        }
    }

    pub fn stdout() -> Self {
        Self {
            target: ConsoleTarget::Stdout,
            ..Self::stderr()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Option<LogLevel>) -> Self {
        self.level = level;
        self
    }

    /// Color level names, rendering lines with `format`
    ///
    /// Without the `console` feature lines are written uncolored.
    #[must_use]
    pub fn with_colors(mut self, format: RecordFormat) -> Self {
        self.colored_format = Some(format);
        self
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }

    fn render(&self, line: &str, record: &LogRecord) -> Option<String> {
        #[cfg(feature = "console")]
        if let Some(ref format) = self.colored_format {
            return Some(format.render_colored(record));
        }
        let _ = (line, record);
        None
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl Sink for ConsoleSink {
    fn write(&mut self, line: &str, record: &LogRecord) -> Result<()> {
        let colored = self.render(line, record);
        let text = colored.as_deref().unwrap_or(line);
        match self.target {
            ConsoleTarget::Stderr => writeln!(std::io::stderr().lock(), "{}", text)?,
            ConsoleTarget::Stdout => writeln!(std::io::stdout().lock(), "{}", text)?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match self.target {
            ConsoleTarget::Stderr => std::io::stderr().flush()?,
            ConsoleTarget::Stdout => std::io::stdout().flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        match self.target {
            ConsoleTarget::Stderr => "stderr",
            ConsoleTarget::Stdout => "stdout",
        }
    }

    fn level(&self) -> Option<LogLevel> {
        self.level
    }
}
