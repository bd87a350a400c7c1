//! Text formatting for log records
//!
//! A [`RecordFormat`] is a line template with `{field}` placeholders,
//! parsed once at configure time:
//!
//! | placeholder   | value                                   |
//! |---------------|-----------------------------------------|
//! | `{timestamp}` | creation time rendered by the date format |
//! | `{level}`     | `INFO`, `WARNING`, ...                  |
//! | `{name}`      | logger name                             |
//! | `{message}`   | record message                          |
//! | `{pid}`       | producer process id                     |
//! | `{thread}`    | producer thread name, or id if unnamed  |
//! | `{thread_id}` | producer thread id                      |
//!
//! `{{` and `}}` produce literal braces. Records carrying an error render
//! the error kind, message and trace on the lines after the record.

use super::error::{RelayError, Result};
use super::log_level::LogLevel;
use super::log_record::{escape_line, LogRecord};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use std::fmt::Write as _;

pub const DEFAULT_FORMAT: &str = "{timestamp} - [{pid}] - {thread} - {name} - {level} - {message}";
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// strftime pattern applied in local time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat(String);

impl DateFormat {
    /// Validate a strftime pattern
    ///
    /// # Errors
    ///
    /// Returns an error if chrono cannot interpret the pattern
    pub fn parse(pattern: &str) -> Result<Self> {
        if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
            return Err(RelayError::config(
                "date_format",
                format!("invalid strftime pattern '{}'", pattern),
            ));
        }
        Ok(Self(pattern.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn write(&self, out: &mut String, timestamp: &DateTime<Utc>) {
        let local = timestamp.with_timezone(&Local);
        let _ = write!(out, "{}", local.format(&self.0));
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self(DEFAULT_DATE_FORMAT.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Timestamp,
    Level,
    Name,
    Message,
    Pid,
    Thread,
    ThreadId,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "timestamp" => Field::Timestamp,
            "level" => Field::Level,
            "name" => Field::Name,
            "message" => Field::Message,
            "pid" => Field::Pid,
            "thread" => Field::Thread,
            "thread_id" => Field::ThreadId,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFormat {
    template: String,
    segments: Vec<Segment>,
    date_format: DateFormat,
}

impl RecordFormat {
    /// Parse a line template
    ///
    /// # Errors
    ///
    /// Returns an error for unknown placeholders and unbalanced braces
    pub fn parse(template: &str, date_format: DateFormat) -> Result<Self> {
        let invalid = |message: String| RelayError::config("format", message);

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(invalid(format!(
                                    "unclosed placeholder in '{}'",
                                    template
                                )))
                            }
                        }
                    }
                    let field = Field::parse(name.trim())
                        .ok_or_else(|| invalid(format!("unknown placeholder '{{{}}}'", name)))?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                '}' => {
                    return Err(invalid(format!("unmatched '}}' in '{}'", template)));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            template: template.to_string(),
            segments,
            date_format,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn date_format(&self) -> &DateFormat {
        &self.date_format
    }

    /// Render a record without trailing newline
    pub fn render(&self, record: &LogRecord) -> String {
        self.render_with(record, |level, out| out.push_str(level.to_str()))
    }

    /// Render with the level name colored for terminals
    #[cfg(feature = "console")]
    pub fn render_colored(&self, record: &LogRecord) -> String {
        use colored::Colorize;
        self.render_with(record, |level, out| {
            let _ = write!(out, "{}", level.to_str().color(level.color_code()));
        })
    }

    fn render_with(&self, record: &LogRecord, level: impl Fn(LogLevel, &mut String)) -> String {
        let mut out = String::with_capacity(self.template.len() + record.message.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(Field::Timestamp) => {
                    self.date_format.write(&mut out, &record.timestamp)
                }
                Segment::Field(Field::Level) => level(record.level, &mut out),
                // Records from the bridge were not built locally
                Segment::Field(Field::Name) => out.push_str(&escape_line(&record.logger_name)),
                Segment::Field(Field::Message) => out.push_str(&escape_line(&record.message)),
                Segment::Field(Field::Pid) => {
                    let _ = write!(out, "{}", record.origin.process_id);
                }
                Segment::Field(Field::Thread) => out.push_str(record.origin.thread_label()),
                Segment::Field(Field::ThreadId) => out.push_str(&record.origin.thread_id),
            }
        }

        if let Some(ref error) = record.attached_error {
            let _ = write!(out, "\n{}: {}", error.kind, escape_line(&error.message));
            if !error.trace.is_empty() {
                out.push('\n');
                out.push_str(&error.trace);
            }
        }

        out
    }
}

impl Default for RecordFormat {
    fn default() -> Self {
        // DEFAULT_FORMAT only uses known placeholders
        Self::parse(DEFAULT_FORMAT, DateFormat::default())
            .unwrap_or_else(|_| unreachable!("default format is valid"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_record::ErrorDetail;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(LogLevel::Warning, "svc.api", message)
    }

    #[test]
    fn test_message_only_template() {
        let format = RecordFormat::parse("{message}", DateFormat::default()).unwrap();
        assert_eq!(format.render(&record("hello")), "hello");
    }

    #[test]
    fn test_all_fields() {
        let format = RecordFormat::parse(
            "{level}|{name}|{pid}|{thread_id}|{message}",
            DateFormat::default(),
        )
        .unwrap();
        let rec = record("x");
        let expected = format!(
            "WARNING|svc.api|{}|{}|x",
            std::process::id(),
            rec.origin.thread_id
        );
        assert_eq!(format.render(&rec), expected);
    }

    #[test]
    fn test_escaped_braces() {
        let format = RecordFormat::parse("{{{level}}} {message}", DateFormat::default()).unwrap();
        assert_eq!(format.render(&record("m")), "{WARNING} m");
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err = RecordFormat::parse("{levelname} {message}", DateFormat::default()).unwrap_err();
        assert!(err.to_string().contains("unknown placeholder"));
    }

    #[test]
    fn test_unbalanced_braces_rejected() {
        assert!(RecordFormat::parse("{message", DateFormat::default()).is_err());
        assert!(RecordFormat::parse("message}", DateFormat::default()).is_err());
    }

    #[test]
    fn test_custom_date_format() {
        let format = RecordFormat::parse("{timestamp}", DateFormat::parse("%Y").unwrap()).unwrap();
        let rec = record("m");
        let year = rec.timestamp.with_timezone(&Local).format("%Y").to_string();
        assert_eq!(format.render(&rec), year);
    }

    #[test]
    fn test_invalid_date_format() {
        assert!(DateFormat::parse("%Q").is_err());
        assert!(DateFormat::parse("%H:%M:%S%.3f").is_ok());
    }

    #[test]
    fn test_error_block_follows_line() {
        let format = RecordFormat::parse("{message}", DateFormat::default()).unwrap();
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let rec = record("load failed").with_error(ErrorDetail::capture(&io));
        let rendered = format.render(&rec);
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("load failed"));
        let error_line = lines.next().unwrap();
        assert!(error_line.ends_with("Error: no such file"), "{}", error_line);
    }

    #[test]
    fn test_remote_fields_cannot_inject_lines() {
        let format = RecordFormat::parse("{name}|{message}", DateFormat::default()).unwrap();
        // Deserialized records skip the constructor's escaping
        let mut rec = record("ok");
        rec.logger_name = "worker\nforged".to_string();
        rec.message = "first\nsecond".to_string();
        rec.attached_error = Some(ErrorDetail {
            kind: "Remote".to_string(),
            message: "bad\r\nINFO fake".to_string(),
            trace: String::new(),
        });

        let rendered = format.render(&rec);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines, ["worker\\nforged|first\\nsecond", "Remote: bad\\r\\nINFO fake"]);
    }

    #[test]
    fn test_default_format_shape() {
        let rendered = RecordFormat::default().render(&record("ready"));
        assert!(rendered.ends_with(" - svc.api - WARNING - ready"));
        assert!(rendered.contains(&format!("[{}]", std::process::id())));
    }
}
