//! Warehouse connection configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default PostgreSQL port used when a configuration omits `port`.
pub const DEFAULT_PORT: u16 = 5432;

/// Connection parameters for a warehouse.
///
/// A key/value mapping (name, type, host, port, username, database, schema and
/// optional credentials). Two configurations are equal when every key/value pair
/// matches. Keys are kept in sorted order so equality and rendering are stable.
///
/// `Debug` and `Display` redact `password`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarehouseConfiguration {
    properties: BTreeMap<String, String>,
}

impl WarehouseConfiguration {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, returning the updated configuration.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Get a property by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Iterate over all key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the configuration has no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Warehouse display name.
    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    /// Warehouse type (e.g. `postgres`, `redshift`).
    pub fn warehouse_type(&self) -> Option<&str> {
        self.get("type")
    }

    /// Server hostname.
    pub fn host(&self) -> Option<&str> {
        self.get("host")
    }

    /// Server port, defaulting to 5432 when absent.
    pub fn port(&self) -> Result<u16, String> {
        match self.get("port") {
            None => Ok(DEFAULT_PORT),
            Some(port) => port.trim().parse().map_err(|_| format!("Invalid port '{port}'")),
        }
    }

    /// Login username.
    pub fn username(&self) -> Option<&str> {
        self.get("username")
    }

    /// Login password, if configured.
    pub fn password(&self) -> Option<&str> {
        self.get("password")
    }

    /// Database name.
    pub fn database(&self) -> Option<&str> {
        self.get("database")
    }

    /// Schema the scans run in.
    pub fn schema(&self) -> Option<&str> {
        self.get("schema")
    }

    /// Get the display connection string (without password).
    pub fn display_url(&self) -> String {
        format!(
            "{}://{}@{}:{}/{}",
            self.warehouse_type().unwrap_or("unknown"),
            self.username().unwrap_or(""),
            self.host().unwrap_or(""),
            self.get("port").unwrap_or("5432"),
            self.database().unwrap_or("")
        )
    }

    fn redacted(&self) -> BTreeMap<&str, &str> {
        self.properties
            .iter()
            .map(|(k, v)| {
                let v = if k == "password" { "***" } else { v.as_str() };
                (k.as_str(), v)
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for WarehouseConfiguration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { properties: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl fmt::Debug for WarehouseConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.redacted()).finish()
    }
}

impl fmt::Display for WarehouseConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> =
            self.redacted().into_iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> WarehouseConfiguration {
        WarehouseConfiguration::new()
            .with("name", "test_postgres_warehouse")
            .with("type", "postgres")
            .with("host", "localhost")
            .with("port", "5432")
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let reordered: WarehouseConfiguration = [
            ("port", "5432"),
            ("host", "localhost"),
            ("type", "postgres"),
            ("name", "test_postgres_warehouse"),
        ]
        .into_iter()
        .collect();
        assert_eq!(local(), reordered);
    }

    #[test]
    fn test_any_differing_value_breaks_equality() {
        assert_ne!(local(), local().with("port", "5433"));
        assert_ne!(local(), local().with("schema", "public"));
    }

    #[test]
    fn test_port_defaults_and_validates() {
        assert_eq!(WarehouseConfiguration::new().port(), Ok(5432));
        assert_eq!(local().with("port", "5439").port(), Ok(5439));
        assert!(local().with("port", "***").port().is_err());
    }

    #[test]
    fn test_password_is_redacted() {
        let config = local().with("password", "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
        assert!(!config.to_string().contains("hunter2"));
        assert_eq!(config.password(), Some("hunter2"));
    }
}
