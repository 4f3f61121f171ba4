//! Compare the metrics a scan measured for a column against expected names.
//!
//! Only presence matters: duplicate measurements of one metric collapse into
//! a single set element.

use crate::error::{AssertionKind, HarnessError};

use soda_core::ScanResult;
use std::collections::BTreeSet;

/// Check that the metrics measured for `column` are exactly `expected`.
pub fn check_measurements<I>(scan_result: &ScanResult, column: &str, expected: I) -> Result<(), HarnessError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let expected = to_set(expected);
    let actual = actual_set(scan_result, column);
    let offending: BTreeSet<String> = expected.symmetric_difference(&actual).cloned().collect();
    mismatch(AssertionKind::Exact, column, expected, actual, offending)
}

/// Check that every metric in `expected` was measured for `column`.
pub fn check_measurements_present<I>(
    scan_result: &ScanResult,
    column: &str,
    expected: I,
) -> Result<(), HarnessError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let expected = to_set(expected);
    let actual = actual_set(scan_result, column);
    let offending: BTreeSet<String> = expected.difference(&actual).cloned().collect();
    mismatch(AssertionKind::Present, column, expected, actual, offending)
}

/// Check that no metric in `forbidden` was measured for `column`.
pub fn check_measurements_absent<I>(
    scan_result: &ScanResult,
    column: &str,
    forbidden: I,
) -> Result<(), HarnessError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let forbidden = to_set(forbidden);
    let actual = actual_set(scan_result, column);
    let offending: BTreeSet<String> = forbidden.intersection(&actual).cloned().collect();
    mismatch(AssertionKind::Absent, column, forbidden, actual, offending)
}

/// Panicking form of [`check_measurements`].
#[track_caller]
pub fn assert_measurements<I>(scan_result: &ScanResult, column: &str, expected: I)
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    if let Err(err) = check_measurements(scan_result, column, expected) {
        panic!("{err}");
    }
}

/// Panicking form of [`check_measurements_present`].
#[track_caller]
pub fn assert_measurements_present<I>(scan_result: &ScanResult, column: &str, expected: I)
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    if let Err(err) = check_measurements_present(scan_result, column, expected) {
        panic!("{err}");
    }
}

/// Panicking form of [`check_measurements_absent`].
#[track_caller]
pub fn assert_measurements_absent<I>(scan_result: &ScanResult, column: &str, forbidden: I)
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    if let Err(err) = check_measurements_absent(scan_result, column, forbidden) {
        panic!("{err}");
    }
}

fn to_set<I>(metrics: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    metrics.into_iter().map(|m| m.as_ref().to_string()).collect()
}

fn actual_set(scan_result: &ScanResult, column: &str) -> BTreeSet<String> {
    scan_result.metrics_for_column(column).into_iter().map(String::from).collect()
}

fn mismatch(
    kind: AssertionKind,
    column: &str,
    expected: BTreeSet<String>,
    actual: BTreeSet<String>,
    offending: BTreeSet<String>,
) -> Result<(), HarnessError> {
    if offending.is_empty() {
        return Ok(());
    }
    Err(HarnessError::AssertionMismatch { kind, column: column.to_string(), expected, actual, offending })
}
