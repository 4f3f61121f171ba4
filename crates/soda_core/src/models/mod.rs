//! Data models for Soda SQL.
//!
//! This module contains all core data structures:
//! - `warehouse_configuration` - WarehouseConfiguration
//! - `parse_logs` - ParseLogs, ParseLog, ParseLogLevel
//! - `scan_configuration` - ScanConfiguration, ConfigurationIssue
//! - `scan` - Metric, Measurement, ScanResult

pub mod parse_logs;
pub mod scan;
pub mod scan_configuration;
pub mod warehouse_configuration;

pub use parse_logs::{ParseLog, ParseLogLevel, ParseLogs};
pub use scan::{Measurement, Metric, ScanResult};
pub use scan_configuration::{ColumnConfiguration, ConfigurationIssue, ScanConfiguration};
pub use warehouse_configuration::WarehouseConfiguration;
