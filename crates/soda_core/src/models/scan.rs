//! Metrics, measurements and scan results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A metric the scan engine knows how to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Rows in the (filtered) table
    RowCount,
    /// Non-null values in a column
    ValuesCount,
    /// Non-null values as a percentage of rows
    ValuesPercentage,
    /// Null values in a column
    MissingCount,
    /// Null values as a percentage of rows
    MissingPercentage,
    /// Smallest numeric value
    Min,
    /// Largest numeric value
    Max,
    /// Average numeric value
    Avg,
    /// Sum of numeric values
    Sum,
    /// Shortest text length
    MinLength,
    /// Longest text length
    MaxLength,
    /// Average text length
    AvgLength,
    /// Number of distinct non-null values
    Distinct,
    /// Number of values occurring exactly once
    UniqueCount,
    /// Number of values occurring more than once
    DuplicateCount,
}

impl Metric {
    /// Every metric, in computation order.
    pub const ALL: [Metric; 15] = [
        Metric::RowCount,
        Metric::ValuesCount,
        Metric::ValuesPercentage,
        Metric::MissingCount,
        Metric::MissingPercentage,
        Metric::Min,
        Metric::Max,
        Metric::Avg,
        Metric::Sum,
        Metric::MinLength,
        Metric::MaxLength,
        Metric::AvgLength,
        Metric::Distinct,
        Metric::UniqueCount,
        Metric::DuplicateCount,
    ];

    /// Convert to the metric name used in configurations and results.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RowCount => "row_count",
            Self::ValuesCount => "values_count",
            Self::ValuesPercentage => "values_percentage",
            Self::MissingCount => "missing_count",
            Self::MissingPercentage => "missing_percentage",
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::MinLength => "min_length",
            Self::MaxLength => "max_length",
            Self::AvgLength => "avg_length",
            Self::Distinct => "distinct",
            Self::UniqueCount => "unique_count",
            Self::DuplicateCount => "duplicate_count",
        }
    }

    /// Parse a metric name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }

    /// Expand a metric name or category into the metrics it stands for.
    ///
    /// Categories: `missing`, `length`, `statistics`, `distinct`.
    pub fn expand(name: &str) -> Option<Vec<Self>> {
        let metrics = match name {
            "missing" => vec![
                Self::MissingCount,
                Self::MissingPercentage,
                Self::ValuesCount,
                Self::ValuesPercentage,
            ],
            "length" => vec![Self::MinLength, Self::MaxLength, Self::AvgLength],
            "statistics" => vec![Self::Min, Self::Max, Self::Avg, Self::Sum],
            "distinct" => vec![Self::Distinct, Self::UniqueCount, Self::DuplicateCount],
            other => vec![Self::parse(other)?],
        };
        Some(metrics)
    }

    /// Metrics that only apply to numeric columns.
    pub fn is_numeric_only(&self) -> bool {
        matches!(self, Self::Min | Self::Max | Self::Avg | Self::Sum)
    }

    /// Metrics that only apply to text columns.
    pub fn is_text_only(&self) -> bool {
        matches!(self, Self::MinLength | Self::MaxLength | Self::AvgLength)
    }

    /// Metrics computed from a group-by over the column's values.
    pub fn is_group_by(&self) -> bool {
        matches!(self, Self::Distinct | Self::UniqueCount | Self::DuplicateCount)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fact produced by a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Metric name (see [`Metric::as_str`])
    pub metric: String,
    /// Column the measurement describes; `None` for table-level metrics
    pub column_name: Option<String>,
    /// Measured value
    pub value: serde_json::Value,
}

impl Measurement {
    /// Create a column measurement.
    pub fn column(
        metric: impl Into<String>,
        column_name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self { metric: metric.into(), column_name: Some(column_name.into()), value: value.into() }
    }

    /// Create a table-level measurement.
    pub fn table(metric: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self { metric: metric.into(), column_name: None, value: value.into() }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column_name {
            Some(column) => write!(f, "{}({}) = {}", self.metric, column, self.value),
            None => write!(f, "{} = {}", self.metric, self.value),
        }
    }
}

/// Measurements produced by one scan execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Measurements in the order they were computed
    pub measurements: Vec<Measurement>,
    /// When the scan started
    pub started_at: DateTime<Utc>,
    /// When the scan finished
    pub finished_at: DateTime<Utc>,
}

impl ScanResult {
    /// Create a result from measurements, stamped now.
    pub fn new(measurements: Vec<Measurement>) -> Self {
        let now = Utc::now();
        Self { measurements, started_at: now, finished_at: now }
    }

    /// Distinct metric names measured for `column`.
    pub fn metrics_for_column(&self, column: &str) -> BTreeSet<&str> {
        self.measurements
            .iter()
            .filter(|m| m.column_name.as_deref() == Some(column))
            .map(|m| m.metric.as_str())
            .collect()
    }

    /// Find the value of `metric`, for `column` or at table level when `None`.
    pub fn find(&self, metric: &str, column: Option<&str>) -> Option<&serde_json::Value> {
        self.measurements
            .iter()
            .find(|m| m.metric == metric && m.column_name.as_deref() == column)
            .map(|m| &m.value)
    }

    /// Duration of the scan in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
