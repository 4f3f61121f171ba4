//! Run a test-supplied scan configuration against a warehouse.

use crate::error::HarnessError;

use soda_core::{ScanConfiguration, ScanResult, Warehouse};

/// Label used when a test scan configuration is rejected.
pub const SCAN_CONTEXT: &str = "Test scan";

/// Build a [`ScanConfiguration`] from `input`, validate it and run it on `warehouse`.
///
/// Every parse log is passed to the logging sink before validation fails, so
/// rejected configurations still show their diagnostics. Execution errors
/// are returned unchanged.
pub fn invoke_scan(warehouse: &mut Warehouse, input: &serde_json::Value) -> Result<ScanResult, HarnessError> {
    tracing::debug!(
        "Test scan configuration:\n{}",
        serde_json::to_string_pretty(input).unwrap_or_else(|_| input.to_string())
    );

    let configuration = ScanConfiguration::parse(input);
    for log in configuration.parse_logs().logs() {
        tracing::info!(table = %configuration.table_name(), "{log}");
    }
    configuration
        .parse_logs()
        .ensure_no_warnings_or_errors(SCAN_CONTEXT)
        .map_err(|err| HarnessError::from_parse_logs(err, |context, logs| {
            HarnessError::ScanConfigurationInvalid { context, logs }
        }))?;

    let scan = warehouse.create_scan(configuration)?;
    Ok(scan.execute()?)
}
