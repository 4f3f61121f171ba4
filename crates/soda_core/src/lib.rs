//! Core types and services for Soda SQL.
//!
//! This crate provides what the scan harness drives:
//!
//! - **error**: Error handling with PostgreSQL-specific details
//! - **models**: Warehouse configurations, parse logs, scan configurations and results
//! - **services**: File access, profiles, warehouses and the scan engine
//! - **logging**: Structured logging setup

pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use error::SodaError;
pub use models::{
    ColumnConfiguration, ConfigurationIssue, Measurement, Metric, ParseLog, ParseLogLevel,
    ParseLogs, ScanConfiguration, ScanResult, WarehouseConfiguration,
};
pub use services::{
    DefaultConnector, FileSystem, Profile, Row, Scan, Warehouse, WarehouseConnection,
    WarehouseConnector, USER_HOME_PROFILES_YAML_LOCATION,
};
