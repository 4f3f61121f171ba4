//! Services for Soda SQL.
//!
//! This module contains all service layer abstractions:
//! - `file_system` - Local file access with `~` expansion
//! - `profiles` - Warehouse profiles from `~/.soda/profiles.yml`
//! - `warehouse` - Warehouse lifecycle and the connection/connector seams
//! - `connection` - Blocking PostgreSQL connections with deadpool-postgres
//! - `scan` - Metric computation over a table

pub mod connection;
pub mod file_system;
pub mod profiles;
pub mod scan;
pub mod warehouse;

pub use connection::{PostgresConnection, PostgresConnector};
pub use file_system::FileSystem;
pub use profiles::{Profile, ProfileEntry, ProfilesFile, USER_HOME_PROFILES_YAML_LOCATION};
pub use scan::{ColumnKind, Scan};
pub use warehouse::{DefaultConnector, Row, Warehouse, WarehouseConnection, WarehouseConnector};
