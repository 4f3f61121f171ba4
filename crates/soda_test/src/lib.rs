//! Test harness for running Soda SQL scans against a real warehouse.
//!
//! - **settings**: Profile/target selection from `SODA_TEST_PROFILE` and `SODA_TEST_TARGET`
//! - **resolver**: Built-in local configuration or the profiles store, with scaffolding
//! - **lifecycle**: One cached warehouse per run, replaced when its configuration changes
//! - **sql_test_case**: Per-test set-up, SQL helpers and rollback on tear-down
//! - **scan**: Validating and executing test scan configurations
//! - **assertions**: Exact, present and absent checks over a column's metrics
//!
//! ```no_run
//! use serde_json::json;
//! use soda_test::{assert_measurements, TestRun, DEFAULT_TEST_TABLE_NAME};
//!
//! let mut run = TestRun::from_env();
//! let mut case = run.set_up("test_min_max").unwrap();
//! case.create_table(DEFAULT_TEST_TABLE_NAME, &["size INTEGER"], &["(1)", "(9)"]).unwrap();
//! let result = case
//!     .scan(&json!({
//!         "table_name": DEFAULT_TEST_TABLE_NAME,
//!         "columns": {"size": {"metrics": ["min", "max"]}}
//!     }))
//!     .unwrap();
//! assert_measurements(&result, "size", ["min", "max"]);
//! case.tear_down().unwrap();
//! ```

pub mod assertions;
pub mod error;
pub mod lifecycle;
pub mod resolver;
pub mod scan;
pub mod settings;
pub mod sql_test_case;

#[cfg(test)]
pub(crate) mod testing;

pub use assertions::{
    assert_measurements, assert_measurements_absent, assert_measurements_present, check_measurements,
    check_measurements_absent, check_measurements_present,
};
pub use error::{AssertionKind, HarnessError};
pub use lifecycle::WarehouseCache;
pub use resolver::{local_configuration, ConfigurationResolver};
pub use scan::invoke_scan;
pub use settings::{HarnessSettings, LOCAL_PROFILE, LOCAL_TARGET};
pub use sql_test_case::{SqlTestCase, TestRun, DEFAULT_TEST_TABLE_NAME};
