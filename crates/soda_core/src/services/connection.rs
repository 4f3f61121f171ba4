//! Blocking PostgreSQL connections with deadpool-postgres.
//!
//! Scans and test helpers run synchronously on the calling thread, so each
//! connection owns a small tokio runtime and blocks on every call. The pool
//! holds exactly one connection which stays checked out for the connection's
//! lifetime, so every statement shares one session and one transaction.
//!
//! Redshift speaks the PostgreSQL wire protocol and uses the same connector.

use crate::error::SodaError;
use crate::models::WarehouseConfiguration;
use crate::services::warehouse::{Row, WarehouseConnection, WarehouseConnector};

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use serde_json::Value;
use std::time::Duration;
use tokio_postgres::types::Type;
use tokio_postgres::NoTls;

/// Connect timeout applied to new connections.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Application name reported to the server.
const APPLICATION_NAME: &str = "soda-sql";

/// Connector for `postgres` and `redshift` warehouses.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresConnector;

impl WarehouseConnector for PostgresConnector {
    fn connect(
        &self,
        configuration: &WarehouseConfiguration,
    ) -> Result<Box<dyn WarehouseConnection>, SodaError> {
        Ok(Box::new(PostgresConnection::connect(configuration)?))
    }
}

/// A single PostgreSQL session with implicit transactions.
///
/// The first statement after connecting or rolling back opens a transaction.
pub struct PostgresConnection {
    runtime: tokio::runtime::Runtime,
    pool: Pool,
    client: Option<Object>,
    in_transaction: bool,
}

impl PostgresConnection {
    /// Open a connection described by `configuration`.
    ///
    /// Validates connectivity with `SELECT 1` before returning.
    pub fn connect(configuration: &WarehouseConfiguration) -> Result<Self, SodaError> {
        let host = required(configuration, "host", configuration.host())?;
        let database = required(configuration, "database", configuration.database())?;
        let username = required(configuration, "username", configuration.username())?;
        let port = configuration.port().map_err(SodaError::connection)?;

        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(host);
        pg_config.port(port);
        pg_config.dbname(database);
        pg_config.user(username);
        if let Some(password) = configuration.password() {
            pg_config.password(password);
        }
        if let Some(schema) = configuration.schema() {
            pg_config.options(&format!("-c search_path={schema}"));
        }
        pg_config.application_name(APPLICATION_NAME);
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| SodaError::internal(format!("Failed to create tokio runtime: {e}")))?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig { recycling_method: RecyclingMethod::Fast },
        );

        let pool = Pool::builder(manager)
            .max_size(1)
            .create_timeout(Some(CONNECT_TIMEOUT))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| SodaError::connection(format!("Failed to create pool: {e}")))?;

        let client = runtime.block_on(pool.get()).map_err(|e| {
            SodaError::connection(format!("Failed to establish connection: {e}"))
        })?;

        runtime
            .block_on(client.execute("SELECT 1", &[]))
            .map_err(|e| SodaError::connection(format!("Connection validation failed: {e}")))?;

        tracing::info!(
            url = %configuration.display_url(),
            "Warehouse connection established"
        );

        Ok(Self { runtime, pool, client: Some(client), in_transaction: false })
    }

    fn client(&self) -> Result<&Object, SodaError> {
        self.client.as_ref().ok_or_else(|| SodaError::connection("Connection closed"))
    }

    fn begin_if_needed(&mut self) -> Result<(), SodaError> {
        if !self.in_transaction {
            let client = self.client()?;
            self.runtime.block_on(client.batch_execute("BEGIN"))?;
            self.in_transaction = true;
        }
        Ok(())
    }
}

impl WarehouseConnection for PostgresConnection {
    fn execute(&mut self, sql: &str) -> Result<u64, SodaError> {
        self.begin_if_needed()?;
        let client = self.client()?;
        Ok(self.runtime.block_on(client.execute(sql, &[]))?)
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>, SodaError> {
        self.begin_if_needed()?;
        let client = self.client()?;
        let rows = self.runtime.block_on(client.query(sql, &[]))?;
        rows.iter().map(row_values).collect()
    }

    fn rollback(&mut self) -> Result<(), SodaError> {
        if self.in_transaction {
            let client = self.client()?;
            self.runtime.block_on(client.batch_execute("ROLLBACK"))?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(client) = self.client.take() {
            drop(client);
            self.pool.close();
            self.in_transaction = false;
            tracing::info!("Warehouse connection closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.client.is_none()
    }
}

fn required<'a>(
    configuration: &WarehouseConfiguration,
    key: &str,
    value: Option<&'a str>,
) -> Result<&'a str, SodaError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        SodaError::connection(format!("{key} is required to connect to {}", configuration.display_url()))
    })
}

/// Convert a row into JSON values by column type.
///
/// Numeric aggregates are cast to `bigint` or `double precision` in the scan
/// SQL, so only a handful of types need direct support.
fn row_values(row: &tokio_postgres::Row) -> Result<Row, SodaError> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(idx)?.map(Value::from)
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(idx)?.map(Value::from)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(idx)?.map(Value::from)
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(idx)?.map(Value::from)
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::from(f64::from(v)))
        } else if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(idx)?.map(Value::from)
        } else {
            row.try_get::<_, Option<String>>(idx)?.map(Value::from)
        };
        values.push(value.unwrap_or(Value::Null));
    }
    Ok(values)
}
