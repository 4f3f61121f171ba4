//! Diagnostics collected while parsing a configuration artifact.

use crate::error::SodaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a parse log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseLogLevel {
    /// Informational
    Info,
    /// Something suspicious that did not stop parsing
    Warning,
    /// Something that makes the artifact unusable
    Error,
}

impl ParseLogLevel {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A single parse log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseLog {
    /// Severity
    pub level: ParseLogLevel,
    /// Human-readable message
    pub message: String,
}

impl fmt::Display for ParseLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level.as_str(), self.message)
    }
}

/// Ordered, append-only log of parse diagnostics.
///
/// Entries are appended while an artifact is parsed. Owners expose it by shared
/// reference afterwards, so it is read-only once parsing is done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseLogs {
    logs: Vec<ParseLog>,
}

impl ParseLogs {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an info entry.
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(ParseLogLevel::Info, message);
    }

    /// Append a warning entry.
    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(ParseLogLevel::Warning, message);
    }

    /// Append an error entry.
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(ParseLogLevel::Error, message);
    }

    fn push(&mut self, level: ParseLogLevel, message: impl Into<String>) {
        self.logs.push(ParseLog { level, message: message.into() });
    }

    /// All entries in insertion order.
    pub fn logs(&self) -> &[ParseLog] {
        &self.logs
    }

    /// Whether any entry is a warning or an error.
    pub fn has_warnings_or_errors(&self) -> bool {
        self.logs.iter().any(|log| log.level >= ParseLogLevel::Warning)
    }

    /// Whether any entry is an error.
    pub fn has_errors(&self) -> bool {
        self.logs.iter().any(|log| log.level == ParseLogLevel::Error)
    }

    /// Rendered entries, one line each.
    pub fn lines(&self) -> Vec<String> {
        self.logs.iter().map(ToString::to_string).collect()
    }

    /// Fail with a [`SodaError::Configuration`] labelled `context` if any
    /// warning or error was logged.
    pub fn ensure_no_warnings_or_errors(&self, context: &str) -> Result<(), SodaError> {
        if self.has_warnings_or_errors() {
            return Err(SodaError::configuration(context, self.lines()));
        }
        Ok(())
    }
}
