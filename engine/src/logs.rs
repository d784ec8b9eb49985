//! Leveled stderr logging for the CLI.
//!
//! The library only talks to the `log` facade; this module is the backend
//! the `sdtl` binary installs. Entries print with a fixed prefix per level,
//! and engine-level detail (debug, trace) is indented under the statement
//! that produced it.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Verbosity accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warning,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_lowercase().as_str() {
            "off" => LogLevel::Off,
            "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warning,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => return None,
        })
    }
}

/// A single formatted log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: log::Level,
    pub message: String,
    /// Nesting depth, three spaces each.
    pub indent: u8,
}

impl LogEntry {
    pub fn new(level: log::Level, message: impl Into<String>) -> Self {
        let indent = match level {
            log::Level::Debug | log::Level::Trace => 1,
            _ => 0,
        };
        Self {
            level,
            message: message.into(),
            indent,
        }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    pub fn render(&self) -> String {
        let prefix = match self.level {
            log::Level::Error => "   ❌",
            log::Level::Warn => "   ⚠️",
            log::Level::Info => "   ",
            log::Level::Debug => "   ·",
            log::Level::Trace => "   ‥",
        };
        let indent = "   ".repeat(self.indent as usize);
        format!("{}{} {}", indent, prefix, self.message)
    }
}

/// Writes every enabled record to stderr.
pub struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", LogEntry::new(record.level(), record.args().to_string()).render());
        }
    }

    fn flush(&self) {}
}

static LOGGER: Lazy<StderrLogger> = Lazy::new(|| StderrLogger);

/// Install the stderr logger. Later calls only change the level.
pub fn init(level: LogLevel) {
    let _ = log::set_logger(&*LOGGER);
    log::set_max_level(level.filter());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prefixes_and_indent() {
        assert_eq!(LogEntry::new(log::Level::Info, "done").render(), "    done");
        assert_eq!(LogEntry::new(log::Level::Debug, "calc").render(), "      · calc");
        assert_eq!(
            LogEntry::new(log::Level::Warn, "fallback").with_indent(0).render(),
            "   ⚠️ fallback"
        );
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("debug").map(LogLevel::filter), Some(log::LevelFilter::Debug));
        assert_eq!(LogLevel::parse("loud"), None);
    }
}
