//! Level filtering by logger name
//!
//! Logger names are dot-separated paths (`db.pool.conn`). An override set
//! for `db.pool` applies to `db.pool` and every descendant such as
//! `db.pool.conn`, but not to `db.poolside`. The most specific override
//! wins; names without any matching override use the default level.

use super::log_level::LogLevel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelFilter {
    default: LogLevel,
    /// Sorted by descending prefix length so the first match is the most specific
    overrides: Vec<(String, LogLevel)>,
}

impl LevelFilter {
    pub fn new(default: LogLevel) -> Self {
        Self {
            default,
            overrides: Vec::new(),
        }
    }

    /// Set the minimum level for `name` and its descendants
    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, level: LogLevel) -> Self {
        let name = name.into();
        self.overrides.retain(|(existing, _)| *existing != name);
        self.overrides.push((name, level));
        self.overrides
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        self
    }

    pub fn default_level(&self) -> LogLevel {
        self.default
    }

    /// Effective minimum level for a logger name
    pub fn level_for(&self, name: &str) -> LogLevel {
        self.overrides
            .iter()
            .find(|(prefix, _)| is_descendant(name, prefix))
            .map(|(_, level)| *level)
            .unwrap_or(self.default)
    }

    #[inline]
    pub fn enabled(&self, name: &str, level: LogLevel) -> bool {
        level >= self.level_for(name)
    }

    /// Lowest level any logger could pass with; used for cheap early rejection
    pub fn floor(&self) -> LogLevel {
        self.overrides
            .iter()
            .map(|(_, level)| *level)
            .fold(self.default, LogLevel::min)
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

fn is_descendant(name: &str, prefix: &str) -> bool {
    match name.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}
