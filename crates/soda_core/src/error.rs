//! Errors raised by the core crate.
//!
//! SQL failures keep the server's SQLSTATE code, detail, hint and position so
//! a failing test can point at the statement that broke.

use std::path::{Path, PathBuf};
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum SodaError {
    /// Could not reach the warehouse, or the session went away.
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The warehouse rejected the credentials.
    #[error("Authentication error: {message}")]
    Authentication { message: String, hint: Option<String> },

    /// A statement failed on the server.
    #[error("{message}")]
    Query {
        message: String,
        detail: Option<String>,
        hint: Option<String>,
        /// 1-based character offset into the statement
        position: Option<usize>,
        /// SQLSTATE, e.g. `42P01`
        code: Option<String>,
    },

    /// A local file could not be read or written.
    #[error("File system error: {message}")]
    FileSystem {
        message: String,
        /// Path after `~` expansion
        path: Option<PathBuf>,
        not_found: bool,
    },

    /// YAML or JSON that could not be read or produced.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Parse logs carried warnings or errors.
    #[error("{} has warnings or errors: {}", .context, .logs.join("; "))]
    Configuration { context: String, logs: Vec<String> },

    /// The scan could not compute its measurements.
    #[error("Scan error: {message}")]
    Scan { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SodaError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// File system error for an I/O failure on `path`.
    pub fn file_system_io(path: impl AsRef<Path>, err: &std::io::Error) -> Self {
        let path = path.as_ref();
        Self::FileSystem {
            message: format!("{}: {err}", path.display()),
            path: Some(path.to_path_buf()),
            not_found: err.kind() == std::io::ErrorKind::NotFound,
        }
    }

    /// Error listing the parse logs of whatever `context` names.
    pub fn configuration(context: impl Into<String>, logs: Vec<String>) -> Self {
        Self::Configuration { context: context.into(), logs }
    }

    pub fn scan(message: impl Into<String>) -> Self {
        Self::Scan { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether a file the operation needed does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileSystem { not_found: true, .. })
    }

    /// Whether the warehouse session is unusable.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "Connection",
            Self::Authentication { .. } => "Authentication",
            Self::Query { .. } => "Query",
            Self::FileSystem { .. } => "FileSystem",
            Self::Serialization { .. } => "Serialization",
            Self::Configuration { .. } => "Configuration",
            Self::Scan { .. } => "Scan",
            Self::Internal { .. } => "Internal",
        }
    }

    /// What to check next, when there is something useful to say.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Connection { .. } => Some("Check that the warehouse is running and reachable"),
            Self::Authentication { hint, .. } => hint.as_deref(),
            Self::Query { hint: Some(hint), .. } => Some(hint),
            Self::Query { code: Some(code), .. } if code == "42P01" => {
                Some("Check the table name and the warehouse schema")
            }
            Self::Query { code: Some(code), .. } if code == "42703" => {
                Some("Check the column names in the scan configuration")
            }
            Self::FileSystem { not_found: true, .. } => Some("Check that the file exists"),
            Self::FileSystem { .. } => Some("Check file permissions"),
            Self::Serialization { .. } => Some("Check the file's YAML syntax"),
            _ => None,
        }
    }

    /// SQLSTATE of a failed statement.
    pub fn pg_code(&self) -> Option<&str> {
        match self {
            Self::Query { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<tokio_postgres::Error> for SodaError {
    fn from(err: tokio_postgres::Error) -> Self {
        let Some(db) = err.as_db_error() else {
            let message = if err.is_closed() { "Connection closed".to_string() } else { err.to_string() };
            return Self::Connection { message, source: Some(Box::new(err)) };
        };

        let message = db.message().to_string();
        let code = db.code().code();
        // Class 28 is invalid authorization, class 08 is connection exception.
        if code == "28P01" || code == "28000" {
            return Self::Authentication {
                message,
                hint: Some("Check username and password in the warehouse profile".to_string()),
            };
        }
        if code.starts_with("08") {
            return Self::Connection { message, source: Some(Box::new(err)) };
        }

        let position = match db.position() {
            Some(tokio_postgres::error::ErrorPosition::Original(pos)) => Some(*pos as usize),
            _ => None,
        };
        Self::Query {
            message,
            detail: db.detail().map(String::from),
            hint: db.hint().map(String::from),
            position,
            code: Some(code.to_string()),
        }
    }
}

impl From<std::io::Error> for SodaError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            message: err.to_string(),
            path: None,
            not_found: err.kind() == std::io::ErrorKind::NotFound,
        }
    }
}

impl From<serde_yaml::Error> for SodaError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization { message: format!("YAML: {err}") }
    }
}

impl From<serde_json::Error> for SodaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization { message: format!("JSON: {err}") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_detected_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = SodaError::file_system_io("/tmp/profiles.yml", &io);
        assert!(err.is_not_found());
        assert_eq!(err.category(), "FileSystem");
        assert_eq!(err.hint(), Some("Check that the file exists"));

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(!SodaError::file_system_io("/tmp/x", &denied).is_not_found());
    }

    #[test]
    fn test_configuration_error_lists_logs() {
        let err = SodaError::configuration(
            "Test scan",
            vec!["[error] table_name is required".to_string(), "[warning] x".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "Test scan has warnings or errors: [error] table_name is required; [warning] x"
        );
    }

    #[test]
    fn test_undefined_table_gets_a_hint() {
        let err = SodaError::Query {
            message: "relation \"t\" does not exist".to_string(),
            detail: None,
            hint: None,
            position: Some(15),
            code: Some("42P01".to_string()),
        };
        assert_eq!(err.pg_code(), Some("42P01"));
        assert_eq!(err.category(), "Query");
        assert_eq!(err.hint(), Some("Check the table name and the warehouse schema"));
        assert!(!err.is_connection_lost());
    }

    #[test]
    fn test_server_hint_wins() {
        let err = SodaError::Query {
            message: "boom".to_string(),
            detail: None,
            hint: Some("try this".to_string()),
            position: None,
            code: Some("42P01".to_string()),
        };
        assert_eq!(err.hint(), Some("try this"));
    }

    #[test]
    fn test_yaml_errors_are_serialization_errors() {
        let err: SodaError = serde_yaml::from_str::<Vec<String>>("{").unwrap_err().into();
        assert_eq!(err.category(), "Serialization");
        assert!(SodaError::connection("refused").is_connection_lost());
    }
}
