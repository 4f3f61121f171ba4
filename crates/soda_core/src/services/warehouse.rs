//! Warehouses: one live connection plus the diagnostics of setting it up.

use crate::error::SodaError;
use crate::models::{ParseLogs, ScanConfiguration, WarehouseConfiguration};
use crate::services::connection::PostgresConnector;
use crate::services::scan::Scan;

use uuid::Uuid;

/// A result row, one JSON value per selected column.
pub type Row = Vec<serde_json::Value>;

/// A live, blocking warehouse session.
///
/// Statements run inside an implicit transaction that is opened by the first
/// statement and ended by [`WarehouseConnection::rollback`]. There is no commit.
pub trait WarehouseConnection: Send {
    /// Execute a statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str) -> Result<u64, SodaError>;

    /// Execute a query and return its rows.
    fn query(&mut self, sql: &str) -> Result<Vec<Row>, SodaError>;

    /// Roll back the current transaction, if any.
    fn rollback(&mut self) -> Result<(), SodaError>;

    /// Close the session. Further calls fail with a connection error.
    fn close(&mut self);

    /// Whether [`WarehouseConnection::close`] was called.
    fn is_closed(&self) -> bool;
}

/// Opens warehouse connections from a configuration.
pub trait WarehouseConnector: Send + Sync {
    /// Open a connection for `configuration`.
    fn connect(
        &self,
        configuration: &WarehouseConfiguration,
    ) -> Result<Box<dyn WarehouseConnection>, SodaError>;
}

/// Dispatches on the configuration's `type`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConnector;

impl WarehouseConnector for DefaultConnector {
    fn connect(
        &self,
        configuration: &WarehouseConfiguration,
    ) -> Result<Box<dyn WarehouseConnection>, SodaError> {
        match configuration.warehouse_type() {
            Some("postgres") | Some("redshift") => PostgresConnector.connect(configuration),
            Some(other) => {
                Err(SodaError::connection(format!("Unsupported warehouse type '{other}'")))
            }
            None => Err(SodaError::connection("Warehouse type is required")),
        }
    }
}

/// One live warehouse connection and the diagnostics produced while opening it.
///
/// Construction never fails: problems are recorded in [`Warehouse::parse_logs`]
/// and the warehouse is left without a connection. Dropping a warehouse closes
/// its connection.
pub struct Warehouse {
    id: Uuid,
    configuration: WarehouseConfiguration,
    parse_logs: ParseLogs,
    connection: Option<Box<dyn WarehouseConnection>>,
}

impl Warehouse {
    /// Open a warehouse with the [`DefaultConnector`].
    pub fn new(configuration: WarehouseConfiguration) -> Self {
        Self::with_connector(configuration, &DefaultConnector)
    }

    /// Open a warehouse with a specific connector.
    pub fn with_connector(
        configuration: WarehouseConfiguration,
        connector: &dyn WarehouseConnector,
    ) -> Self {
        let id = Uuid::new_v4();
        let mut parse_logs = ParseLogs::new();

        for key in ["type", "host", "database", "username"] {
            if configuration.get(key).map_or(true, str::is_empty) {
                parse_logs.error(format!("{key} is required in the warehouse configuration"));
            }
        }
        if let Err(message) = configuration.port() {
            parse_logs.error(message);
        }

        let connection = if parse_logs.has_errors() {
            None
        } else {
            match connector.connect(&configuration) {
                Ok(connection) => {
                    parse_logs.info(format!("Connected to {}", configuration.display_url()));
                    Some(connection)
                }
                Err(err) => {
                    tracing::error!(warehouse_id = %id, error = %err, "Warehouse connection failed");
                    parse_logs.error(format!("Couldn't connect to {}: {err}", configuration.display_url()));
                    None
                }
            }
        };

        tracing::debug!(
            warehouse_id = %id,
            name = configuration.name().unwrap_or(""),
            connected = connection.is_some(),
            "Warehouse created"
        );

        Self { id, configuration, parse_logs, connection }
    }

    /// Unique identifier of this warehouse instance.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Configuration the warehouse was created from.
    pub fn configuration(&self) -> &WarehouseConfiguration {
        &self.configuration
    }

    /// Diagnostics produced while connecting.
    pub fn parse_logs(&self) -> &ParseLogs {
        &self.parse_logs
    }

    /// Whether the warehouse has an open connection.
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| !c.is_closed())
    }

    /// The live connection.
    pub fn connection(&mut self) -> Result<&mut dyn WarehouseConnection, SodaError> {
        match self.connection.as_deref_mut() {
            Some(connection) if !connection.is_closed() => Ok(connection),
            _ => Err(SodaError::connection(format!(
                "Warehouse {} has no open connection",
                self.configuration.display_url()
            ))),
        }
    }

    /// Prepare a scan of `configuration` on this warehouse's connection.
    pub fn create_scan(&mut self, configuration: ScanConfiguration) -> Result<Scan<'_>, SodaError> {
        let schema = self.configuration.schema().map(String::from);
        let connection = self.connection()?;
        Ok(Scan::new(connection, configuration, schema))
    }

    /// Roll back the connection's current transaction.
    ///
    /// A session lost during the rollback is closed, so [`Warehouse::is_connected`]
    /// reports it.
    pub fn rollback(&mut self) -> Result<(), SodaError> {
        let result = self.connection()?.rollback();
        if let Err(err) = &result {
            if err.is_connection_lost() {
                tracing::warn!(warehouse_id = %self.id, error = %err, "Connection lost during rollback");
                self.close();
            }
        }
        result
    }

    /// Close the connection. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
            tracing::info!(warehouse_id = %self.id, "Warehouse closed");
        }
    }
}

impl Drop for Warehouse {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warehouse")
            .field("id", &self.id)
            .field("configuration", &self.configuration)
            .field("connected", &self.is_connected())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{local_configuration, ScriptedConnection};
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RefusingConnector;

    impl WarehouseConnector for RefusingConnector {
        fn connect(
            &self,
            _configuration: &WarehouseConfiguration,
        ) -> Result<Box<dyn WarehouseConnection>, SodaError> {
            Err(SodaError::connection("connection refused"))
        }
    }

    #[test]
    fn test_connected_warehouse_has_clean_logs() {
        let script = ScriptedConnection::default();
        let mut warehouse = Warehouse::with_connector(local_configuration(), &script);

        assert!(!warehouse.parse_logs().has_warnings_or_errors());
        assert!(warehouse.is_connected());
        warehouse.connection().unwrap().execute("SELECT 1").unwrap();
        warehouse.rollback().unwrap();
        assert_eq!(script.statements(), vec!["SELECT 1", "ROLLBACK"]);
    }

    #[test]
    fn test_connect_failure_lands_in_parse_logs() {
        let mut warehouse = Warehouse::with_connector(local_configuration(), &RefusingConnector);
        assert!(warehouse.parse_logs().has_errors());
        assert!(!warehouse.is_connected());
        assert!(warehouse.connection().is_err());
        assert!(warehouse.rollback().is_err());
    }

    #[test]
    fn test_incomplete_configuration_does_not_connect() {
        let script = ScriptedConnection::default();
        let configuration = WarehouseConfiguration::new().with("type", "postgres").with("port", "x");
        let warehouse = Warehouse::with_connector(configuration, &script);

        let messages: Vec<_> =
            warehouse.parse_logs().logs().iter().map(|l| l.message.clone()).collect();
        assert!(messages.contains(&"host is required in the warehouse configuration".to_string()));
        assert!(messages.contains(&"Invalid port 'x'".to_string()));
        assert!(!warehouse.is_connected());
    }

    #[test]
    fn test_unsupported_type_is_refused() {
        let configuration = local_configuration().with("type", "snowflake");
        let warehouse = Warehouse::new(configuration);
        assert!(warehouse.parse_logs().has_errors());
        assert!(warehouse
            .parse_logs()
            .logs()
            .iter()
            .any(|l| l.message.contains("Unsupported warehouse type 'snowflake'")));
    }

    /// A session whose server went away: rollback fails with a connection error.
    #[derive(Clone, Default)]
    struct DroppedSession {
        closed: Arc<Mutex<bool>>,
    }

    impl WarehouseConnection for DroppedSession {
        fn execute(&mut self, _sql: &str) -> Result<u64, SodaError> {
            Err(SodaError::connection("Connection closed"))
        }

        fn query(&mut self, _sql: &str) -> Result<Vec<Row>, SodaError> {
            Err(SodaError::connection("Connection closed"))
        }

        fn rollback(&mut self) -> Result<(), SodaError> {
            Err(SodaError::connection("Connection closed"))
        }

        fn close(&mut self) {
            *self.closed.lock() = true;
        }

        fn is_closed(&self) -> bool {
            *self.closed.lock()
        }
    }

    impl WarehouseConnector for DroppedSession {
        fn connect(
            &self,
            _configuration: &WarehouseConfiguration,
        ) -> Result<Box<dyn WarehouseConnection>, SodaError> {
            Ok(Box::new(self.clone()))
        }
    }

    #[test]
    fn test_lost_connection_on_rollback_closes_warehouse() {
        let session = DroppedSession::default();
        let mut warehouse = Warehouse::with_connector(local_configuration(), &session);
        assert!(warehouse.is_connected());

        let err = warehouse.rollback().unwrap_err();

        assert!(err.is_connection_lost());
        assert!(!warehouse.is_connected());
        assert!(*session.closed.lock());
    }

    #[test]
    fn test_failed_rollback_on_live_session_keeps_connection() {
        struct RejectingRollback(ScriptedConnection);

        impl WarehouseConnection for RejectingRollback {
            fn execute(&mut self, sql: &str) -> Result<u64, SodaError> {
                self.0.execute(sql)
            }

            fn query(&mut self, sql: &str) -> Result<Vec<Row>, SodaError> {
                self.0.query(sql)
            }

            fn rollback(&mut self) -> Result<(), SodaError> {
                Err(SodaError::internal("rollback rejected"))
            }

            fn close(&mut self) {
                self.0.close()
            }

            fn is_closed(&self) -> bool {
                self.0.is_closed()
            }
        }

        struct Rejecting(ScriptedConnection);

        impl WarehouseConnector for Rejecting {
            fn connect(
                &self,
                _configuration: &WarehouseConfiguration,
            ) -> Result<Box<dyn WarehouseConnection>, SodaError> {
                Ok(Box::new(RejectingRollback(self.0.clone())))
            }
        }

        let script = ScriptedConnection::default();
        let mut warehouse = Warehouse::with_connector(local_configuration(), &Rejecting(script.clone()));

        assert!(warehouse.rollback().is_err());
        assert!(warehouse.is_connected());
        assert!(!script.is_closed());
    }

    #[test]
    fn test_drop_closes_connection() {
        let script = ScriptedConnection::default();
        {
            let _warehouse = Warehouse::with_connector(local_configuration(), &script);
            assert!(!script.is_closed());
        }
        assert!(script.is_closed());
    }
}
