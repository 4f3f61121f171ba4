//! Error types for the scan test harness.
//!
//! Every variant is a fail-fast, test-local failure; nothing is retried.

use soda_core::SodaError;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which measurement assertion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    /// Metric set must equal the expected set
    Exact,
    /// Every expected metric must be present
    Present,
    /// No forbidden metric may be present
    Absent,
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "Measurements",
            Self::Present => "Measurements present",
            Self::Absent => "Measurements absent",
        })
    }
}

/// Main error type for the harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The profiles store did not exist; a scaffold was written for the operator to edit.
    #[error("{}", missing_message(.location, .profile, .target, .scaffold_error.as_deref()))]
    ConfigurationMissing {
        /// Where the scaffold was (or should have been) written
        location: PathBuf,
        /// Requested profile
        profile: String,
        /// Requested target
        target: String,
        /// Why the scaffold could not be written, if it couldn't
        scaffold_error: Option<String>,
    },

    /// The profile/target resolved with warnings or errors.
    #[error("{location} has warnings or errors for profile {profile}, target {target}: {}", .logs.join("; "))]
    ConfigurationInvalid {
        /// The profiles store consulted
        location: String,
        /// Requested profile
        profile: String,
        /// Requested target
        target: String,
        /// Rendered parse log lines
        logs: Vec<String>,
    },

    /// A freshly created warehouse reported warnings or errors.
    #[error("{context} has warnings or errors: {}", .logs.join("; "))]
    WarehouseSetupFailed {
        /// Label of the failing step
        context: String,
        /// Rendered parse log lines
        logs: Vec<String>,
    },

    /// A test-supplied scan configuration failed validation.
    #[error("{context} has warnings or errors: {}", .logs.join("; "))]
    ScanConfigurationInvalid {
        /// Label of the failing step
        context: String,
        /// Rendered parse log lines
        logs: Vec<String>,
    },

    /// Metrics measured for a column differ from what the test expected.
    #[error(
        "{kind} mismatch for column '{column}': expected {}, actual {}, offending {}",
        fmt_set(.expected),
        fmt_set(.actual),
        fmt_set(.offending)
    )]
    AssertionMismatch {
        /// Which assertion failed
        kind: AssertionKind,
        /// Column that was checked
        column: String,
        /// Metrics the test named
        expected: BTreeSet<String>,
        /// Metrics measured for the column
        actual: BTreeSet<String>,
        /// Extra/missing metrics for exact, missing for present, forbidden-but-present for absent
        offending: BTreeSet<String>,
    },

    /// A core failure (SQL, scan execution) passed through unchanged.
    #[error(transparent)]
    Core(#[from] SodaError),
}

impl HarnessError {
    /// Whether a runner should report this as a skip rather than a failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::ConfigurationMissing { .. })
    }

    /// Whether this is an assertion failure rather than a setup problem.
    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::AssertionMismatch { .. })
    }

    /// Rewrap a parse-log rejection from the core crate with `wrap`; any other
    /// error passes through as [`HarnessError::Core`].
    pub(crate) fn from_parse_logs(err: SodaError, wrap: impl FnOnce(String, Vec<String>) -> Self) -> Self {
        match err {
            SodaError::Configuration { context, logs } => wrap(context, logs),
            other => Self::Core(other),
        }
    }
}

fn missing_message(location: &Path, profile: &str, target: &str, scaffold_error: Option<&str>) -> String {
    let created = match scaffold_error {
        None => "Default initial version was created.".to_string(),
        Some(err) => format!("Default initial version couldn't be written: {err}."),
    };
    format!(
        "{} not found. {created} Update credentials for profile {profile}, target {target} in that file and retry.",
        location.display()
    )
}

fn fmt_set(set: &BTreeSet<String>) -> String {
    let items: Vec<&str> = set.iter().map(String::as_str).collect();
    format!("{{{}}}", items.join(", "))
}
