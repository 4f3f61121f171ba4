//! The one warehouse a test run shares.
//!
//! Connecting is expensive, so a warehouse is kept across tests and only
//! replaced when the resolved configuration changes.

use crate::error::HarnessError;

use soda_core::{DefaultConnector, Warehouse, WarehouseConfiguration, WarehouseConnector};

/// Label used when a fresh warehouse reports problems.
pub const WAREHOUSE_CONTEXT: &str = "Test warehouse";

/// Caches at most one live [`Warehouse`].
pub struct WarehouseCache {
    connector: Box<dyn WarehouseConnector>,
    cached: Option<Warehouse>,
}

impl Default for WarehouseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl WarehouseCache {
    /// Empty cache connecting with the [`DefaultConnector`].
    pub fn new() -> Self {
        Self::with_connector(Box::new(DefaultConnector))
    }

    /// Empty cache connecting with `connector`.
    pub fn with_connector(connector: Box<dyn WarehouseConnector>) -> Self {
        Self { connector, cached: None }
    }

    /// Return a warehouse for `configuration`, reusing the cached one when equal.
    ///
    /// A cached warehouse with a different configuration, or one whose session
    /// was lost, is closed before the new one connects. A new warehouse whose
    /// parse logs hold warnings or errors is closed and not cached.
    pub fn ensure(&mut self, configuration: WarehouseConfiguration) -> Result<&mut Warehouse, HarnessError> {
        let reusable = match self.cached.take() {
            Some(warehouse) if warehouse.configuration() == &configuration && warehouse.is_connected() => {
                tracing::debug!(warehouse_id = %warehouse.id(), "Reusing cached warehouse");
                Some(warehouse)
            }
            Some(mut lost) if lost.configuration() == &configuration => {
                tracing::info!(warehouse_id = %lost.id(), "Cached warehouse lost its connection, reconnecting");
                lost.close();
                None
            }
            Some(mut stale) => {
                tracing::info!(
                    warehouse_id = %stale.id(),
                    "Warehouse configuration changed, closing cached warehouse"
                );
                stale.close();
                None
            }
            None => None,
        };

        let warehouse = match reusable {
            Some(warehouse) => warehouse,
            None => self.open(configuration)?,
        };
        Ok(self.cached.insert(warehouse))
    }

    fn open(&self, configuration: WarehouseConfiguration) -> Result<Warehouse, HarnessError> {
        let mut warehouse = Warehouse::with_connector(configuration, self.connector.as_ref());
        for log in warehouse.parse_logs().logs() {
            tracing::info!(warehouse_id = %warehouse.id(), "{log}");
        }

        let checked = warehouse.parse_logs().ensure_no_warnings_or_errors(WAREHOUSE_CONTEXT);
        if let Err(err) = checked {
            warehouse.close();
            return Err(HarnessError::from_parse_logs(err, |context, logs| {
                HarnessError::WarehouseSetupFailed { context, logs }
            }));
        }

        tracing::info!(
            warehouse_id = %warehouse.id(),
            url = %warehouse.configuration().display_url(),
            "Warehouse ready"
        );
        Ok(warehouse)
    }

    /// The cached warehouse, if any.
    pub fn current(&self) -> Option<&Warehouse> {
        self.cached.as_ref()
    }

    /// Roll back the cached warehouse's current transaction. No-op when empty.
    pub fn rollback(&mut self) -> Result<(), HarnessError> {
        if let Some(warehouse) = self.cached.as_mut() {
            warehouse.rollback()?;
        }
        Ok(())
    }

    /// Close and forget the cached warehouse.
    pub fn close(&mut self) {
        if let Some(mut warehouse) = self.cached.take() {
            warehouse.close();
        }
    }
}

impl std::fmt::Debug for WarehouseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseCache").field("cached", &self.cached).finish()
    }
}
