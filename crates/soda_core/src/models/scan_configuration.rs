//! Scan configuration parsed from a generic key/value mapping.
//!
//! Test code and YAML files hand us loosely-typed mappings. Parsing turns them
//! into a [`ScanConfiguration`] and records every problem as a [`ConfigurationIssue`]
//! in the configuration's [`ParseLogs`]; nothing is executed from a configuration
//! that has warnings or errors.

use crate::models::parse_logs::ParseLogs;
use crate::models::scan::Metric;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

const TABLE_NAME: &str = "table_name";
const METRICS: &str = "metrics";
const COLUMNS: &str = "columns";
const FILTER: &str = "filter";

/// A problem found while parsing a scan configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationIssue {
    /// The input is not a mapping.
    #[error("{location} must be a mapping")]
    NotAMapping {
        /// Where the mapping was expected
        location: String,
    },

    /// A required key is absent or empty.
    #[error("{key} is required")]
    MissingKey {
        /// The required key
        key: String,
    },

    /// A key holds a value of the wrong shape.
    #[error("{key} must be {expected}")]
    InvalidType {
        /// The offending key
        key: String,
        /// Description of the accepted shape
        expected: &'static str,
    },

    /// A metric name that is neither a metric nor a category.
    #[error("Unknown metric '{metric}' in {key}")]
    UnknownMetric {
        /// The key holding the metric list
        key: String,
        /// The unrecognized name
        metric: String,
    },

    /// A key the scan does not understand.
    #[error("Unknown key '{key}'")]
    UnknownKey {
        /// The unrecognized key, with its path
        key: String,
    },
}

impl ConfigurationIssue {
    /// Whether the issue makes the configuration unusable.
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::UnknownKey { .. })
    }
}

/// Per-column scan settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnConfiguration {
    /// Metrics requested for this column on top of the table-wide ones
    pub metrics: BTreeSet<Metric>,
}

/// A validated scan configuration.
#[derive(Debug, Clone, Default)]
pub struct ScanConfiguration {
    table_name: String,
    metrics: BTreeSet<Metric>,
    columns: BTreeMap<String, ColumnConfiguration>,
    filter: Option<String>,
    parse_logs: ParseLogs,
}

impl ScanConfiguration {
    /// Parse a configuration from a generic mapping.
    ///
    /// Never fails; inspect [`ScanConfiguration::parse_logs`] for problems.
    pub fn parse(input: &Value) -> Self {
        let mut configuration = Self::default();
        let mut issues = Vec::new();

        match input.as_object() {
            Some(map) => configuration.parse_mapping(map, &mut issues),
            None => issues.push(ConfigurationIssue::NotAMapping {
                location: "Scan configuration".to_string(),
            }),
        }

        for issue in issues {
            if issue.is_error() {
                configuration.parse_logs.error(issue.to_string());
            } else {
                configuration.parse_logs.warning(issue.to_string());
            }
        }
        configuration
    }

    fn parse_mapping(&mut self, map: &Map<String, Value>, issues: &mut Vec<ConfigurationIssue>) {
        match map.get(TABLE_NAME) {
            Some(Value::String(name)) if !name.trim().is_empty() => {
                self.table_name = name.trim().to_string();
            }
            Some(Value::String(_)) | None => {
                issues.push(ConfigurationIssue::MissingKey { key: TABLE_NAME.to_string() });
            }
            Some(_) => issues.push(ConfigurationIssue::InvalidType {
                key: TABLE_NAME.to_string(),
                expected: "a string",
            }),
        }

        if let Some(metrics) = map.get(METRICS) {
            self.metrics = parse_metrics(METRICS, metrics, issues);
        }

        if let Some(columns) = map.get(COLUMNS) {
            match columns.as_object() {
                Some(columns) => {
                    for (column_name, column) in columns {
                        let column_configuration = parse_column(column_name, column, issues);
                        self.columns.insert(column_name.to_lowercase(), column_configuration);
                    }
                }
                None => issues.push(ConfigurationIssue::NotAMapping {
                    location: COLUMNS.to_string(),
                }),
            }
        }

        match map.get(FILTER) {
            None | Some(Value::Null) => {}
            Some(Value::String(filter)) if !filter.trim().is_empty() => {
                self.filter = Some(filter.trim().to_string());
            }
            Some(_) => issues.push(ConfigurationIssue::InvalidType {
                key: FILTER.to_string(),
                expected: "a non-empty SQL expression",
            }),
        }

        for key in map.keys() {
            if ![TABLE_NAME, METRICS, COLUMNS, FILTER].contains(&key.as_str()) {
                issues.push(ConfigurationIssue::UnknownKey { key: key.clone() });
            }
        }
    }

    /// Table to scan.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Metrics requested for every column.
    pub fn metrics(&self) -> &BTreeSet<Metric> {
        &self.metrics
    }

    /// Per-column settings, keyed by lowercase column name.
    pub fn columns(&self) -> &BTreeMap<String, ColumnConfiguration> {
        &self.columns
    }

    /// Optional SQL filter applied to every scan query.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Diagnostics produced while parsing.
    pub fn parse_logs(&self) -> &ParseLogs {
        &self.parse_logs
    }

    /// Metrics requested for `column`: table-wide metrics plus column-specific ones.
    pub fn metrics_for_column(&self, column: &str) -> BTreeSet<Metric> {
        let mut metrics = self.metrics.clone();
        if let Some(column_configuration) = self.columns.get(&column.to_lowercase()) {
            metrics.extend(column_configuration.metrics.iter().copied());
        }
        metrics.remove(&Metric::RowCount);
        metrics
    }

    /// Whether `row_count` was requested anywhere.
    pub fn wants_row_count(&self) -> bool {
        self.metrics.contains(&Metric::RowCount)
            || self.columns.values().any(|c| c.metrics.contains(&Metric::RowCount))
    }
}

fn parse_column(
    column_name: &str,
    column: &Value,
    issues: &mut Vec<ConfigurationIssue>,
) -> ColumnConfiguration {
    let location = format!("{COLUMNS}.{column_name}");
    let Some(map) = column.as_object() else {
        issues.push(ConfigurationIssue::NotAMapping { location });
        return ColumnConfiguration::default();
    };

    let mut column_configuration = ColumnConfiguration::default();
    for (key, value) in map {
        if key == METRICS {
            column_configuration.metrics =
                parse_metrics(&format!("{location}.{METRICS}"), value, issues);
        } else {
            issues.push(ConfigurationIssue::UnknownKey { key: format!("{location}.{key}") });
        }
    }
    column_configuration
}

fn parse_metrics(key: &str, value: &Value, issues: &mut Vec<ConfigurationIssue>) -> BTreeSet<Metric> {
    let mut metrics = BTreeSet::new();
    let Some(names) = value.as_array() else {
        issues.push(ConfigurationIssue::InvalidType {
            key: key.to_string(),
            expected: "a list of metric names",
        });
        return metrics;
    };

    for name in names {
        match name.as_str().map(|n| (n, Metric::expand(n))) {
            Some((_, Some(expanded))) => metrics.extend(expanded),
            Some((n, None)) => issues.push(ConfigurationIssue::UnknownMetric {
                key: key.to_string(),
                metric: n.to_string(),
            }),
            None => issues.push(ConfigurationIssue::InvalidType {
                key: key.to_string(),
                expected: "a list of metric names",
            }),
        }
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_configuration_has_clean_logs() {
        let configuration = ScanConfiguration::parse(&json!({
            "table_name": "test_table",
            "metrics": ["row_count", "missing"],
            "columns": {
                "Size": {"metrics": ["statistics"]}
            },
            "filter": "size > 0"
        }));

        assert!(!configuration.parse_logs().has_warnings_or_errors());
        assert_eq!(configuration.table_name(), "test_table");
        assert_eq!(configuration.filter(), Some("size > 0"));
        assert!(configuration.wants_row_count());

        let size_metrics = configuration.metrics_for_column("size");
        assert!(size_metrics.contains(&Metric::Min));
        assert!(size_metrics.contains(&Metric::MissingCount));
        assert!(!size_metrics.contains(&Metric::RowCount));

        let name_metrics = configuration.metrics_for_column("name");
        assert!(!name_metrics.contains(&Metric::Min));
    }

    #[test]
    fn test_missing_table_name_is_an_error() {
        let configuration = ScanConfiguration::parse(&json!({"metrics": ["row_count"]}));
        assert!(configuration.parse_logs().has_errors());
        assert_eq!(configuration.parse_logs().logs()[0].message, "table_name is required");
    }

    #[test]
    fn test_unknown_metric_is_an_error() {
        let configuration =
            ScanConfiguration::parse(&json!({"table_name": "t", "metrics": ["row_cnt"]}));
        assert!(configuration.parse_logs().has_errors());
        assert_eq!(
            configuration.parse_logs().logs()[0].message,
            "Unknown metric 'row_cnt' in metrics"
        );
    }

    #[test]
    fn test_unknown_key_is_a_warning() {
        let configuration =
            ScanConfiguration::parse(&json!({"table_name": "t", "sample_percentage": 10}));
        assert!(configuration.parse_logs().has_warnings_or_errors());
        assert!(!configuration.parse_logs().has_errors());
    }

    #[test]
    fn test_non_mapping_input_is_rejected() {
        let configuration = ScanConfiguration::parse(&json!(["table_name", "t"]));
        assert!(configuration.parse_logs().has_errors());

        let configuration =
            ScanConfiguration::parse(&json!({"table_name": "t", "columns": {"id": 5}}));
        assert_eq!(configuration.parse_logs().logs()[0].message, "columns.id must be a mapping");
    }
}
