//! Per-test fixture over the shared warehouse.
//!
//! A [`TestRun`] lives for the whole process (or test binary) and owns the
//! cached warehouse. Each test calls [`TestRun::set_up`] to get a
//! [`SqlTestCase`], runs SQL and scans through it, and ends with
//! [`SqlTestCase::tear_down`]. Tear-down only rolls back, so the connection
//! stays open for the next test.

use crate::error::HarnessError;
use crate::lifecycle::WarehouseCache;
use crate::resolver::ConfigurationResolver;
use crate::scan::invoke_scan;
use crate::settings::HarnessSettings;

use soda_core::{Row, ScanResult, Warehouse};

/// Table name tests use unless they need several tables.
pub const DEFAULT_TEST_TABLE_NAME: &str = "test_table";

/// State shared by every test in a run.
#[derive(Debug)]
pub struct TestRun {
    settings: HarnessSettings,
    resolver: ConfigurationResolver,
    warehouses: WarehouseCache,
}

impl TestRun {
    /// Run configured from the environment against the real home directory.
    pub fn from_env() -> Self {
        Self::new(HarnessSettings::from_env(), ConfigurationResolver::new(), WarehouseCache::new())
    }

    /// Run from explicit parts. Initializes test logging.
    pub fn new(settings: HarnessSettings, resolver: ConfigurationResolver, warehouses: WarehouseCache) -> Self {
        soda_core::logging::init_test_logging();
        Self { settings, resolver, warehouses }
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// Select another profile/target; the next `set_up` reconnects if it resolves differently.
    pub fn set_settings(&mut self, settings: HarnessSettings) {
        self.settings = settings;
    }

    pub fn warehouses(&self) -> &WarehouseCache {
        &self.warehouses
    }

    /// Resolve the configuration and make the shared warehouse ready for `test_name`.
    pub fn set_up(&mut self, test_name: &str) -> Result<SqlTestCase<'_>, HarnessError> {
        tracing::debug!("\n\n--- {test_name} ---");
        let configuration =
            self.resolver.resolve(&self.settings.profile_name, &self.settings.target_name)?;
        let warehouse = self.warehouses.ensure(configuration)?;
        Ok(SqlTestCase { name: test_name.to_string(), warehouse, torn_down: false })
    }

    /// Close the shared warehouse.
    pub fn close(&mut self) {
        self.warehouses.close();
    }
}

/// One test's view of the shared warehouse.
///
/// Dropping without [`SqlTestCase::tear_down`] still rolls back; failures are only logged.
#[derive(Debug)]
pub struct SqlTestCase<'r> {
    name: String,
    warehouse: &'r mut Warehouse,
    torn_down: bool,
}

impl SqlTestCase<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn warehouse(&mut self) -> &mut Warehouse {
        &mut *self.warehouse
    }

    /// Execute one statement inside the test's transaction.
    pub fn sql_update(&mut self, sql: &str) -> Result<u64, HarnessError> {
        tracing::debug!(test = %self.name, "Test SQL update: {sql}");
        Ok(self.warehouse.connection()?.execute(sql)?)
    }

    /// Execute statements in order, stopping at the first failure.
    pub fn sql_updates<S: AsRef<str>>(&mut self, sqls: &[S]) -> Result<(), HarnessError> {
        for sql in sqls {
            self.sql_update(sql.as_ref())?;
        }
        Ok(())
    }

    /// Run a query inside the test's transaction.
    pub fn sql_query(&mut self, sql: &str) -> Result<Vec<Row>, HarnessError> {
        tracing::debug!(test = %self.name, "Test SQL query: {sql}");
        Ok(self.warehouse.connection()?.query(sql)?)
    }

    /// Recreate `table_name` with `columns` (e.g. `"name VARCHAR(255)"`) and insert `rows` (e.g. `"('one', 1)"`).
    pub fn create_table<C, R>(&mut self, table_name: &str, columns: &[C], rows: &[R]) -> Result<(), HarnessError>
    where
        C: AsRef<str>,
        R: AsRef<str>,
    {
        let joined_columns = columns.iter().map(|c| c.as_ref()).collect::<Vec<&str>>().join(", ");
        let joined_rows = rows.iter().map(|r| r.as_ref()).collect::<Vec<&str>>().join(", ");

        let mut sqls = vec![
            format!("DROP TABLE IF EXISTS {table_name}"),
            format!("CREATE TABLE {table_name} ( {joined_columns} )"),
        ];
        if !rows.is_empty() {
            sqls.push(format!("INSERT INTO {table_name} VALUES {joined_rows}"));
        }
        self.sql_updates(&sqls)
    }

    /// Validate and run a scan configuration.
    pub fn scan(&mut self, input: &serde_json::Value) -> Result<ScanResult, HarnessError> {
        invoke_scan(self.warehouse, input)
    }

    /// Roll back everything this test did. The connection stays open.
    pub fn tear_down(mut self) -> Result<(), HarnessError> {
        self.torn_down = true;
        self.warehouse.rollback()?;
        Ok(())
    }
}

impl Drop for SqlTestCase<'_> {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        if let Err(err) = self.warehouse.rollback() {
            tracing::warn!(test = %self.name, error = %err, "Rollback on drop failed");
        }
    }
}
