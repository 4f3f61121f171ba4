//! Metric scans over a single table.
//!
//! A scan resolves the table's columns from `information_schema`, computes all
//! count, statistics and length metrics with one aggregate query, and runs one
//! group-by query for each column that asks for distinct metrics.

use crate::error::SodaError;
use crate::models::{Measurement, Metric, ScanConfiguration, ScanResult};
use crate::services::warehouse::{Row, WarehouseConnection};

use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeSet;

/// How a column's values can be measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Numeric types: statistics apply
    Numeric,
    /// Character types: length metrics apply
    Text,
    /// Anything else: only counts apply
    Other,
}

impl ColumnKind {
    /// Classify an `information_schema.columns.data_type` value.
    ///
    /// Only types with a direct cast to `double precision` count as numeric,
    /// so `money` and `interval` get counts only.
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type.trim().to_lowercase().as_str() {
            "smallint" | "integer" | "bigint" | "int" | "int2" | "int4" | "int8" | "real" | "float"
            | "float4" | "float8" | "double precision" | "numeric" | "decimal" => Self::Numeric,
            "character varying" | "character" | "varchar" | "char" | "bpchar" | "text" => Self::Text,
            _ => Self::Other,
        }
    }

    /// Whether `metric` can be computed for this kind of column.
    pub fn supports(&self, metric: Metric) -> bool {
        if metric.is_numeric_only() {
            *self == Self::Numeric
        } else if metric.is_text_only() {
            *self == Self::Text
        } else {
            metric != Metric::RowCount
        }
    }
}

/// A column and the metrics the scan computes for it.
#[derive(Debug, Clone)]
struct ColumnPlan {
    name: String,
    kind: ColumnKind,
    metrics: BTreeSet<Metric>,
}

impl ColumnPlan {
    fn needs_values_count(&self) -> bool {
        [Metric::ValuesCount, Metric::ValuesPercentage, Metric::MissingCount, Metric::MissingPercentage]
            .iter()
            .any(|m| self.metrics.contains(m))
    }

    fn needs_group_by(&self) -> bool {
        self.metrics.iter().any(Metric::is_group_by)
    }
}

/// A scan ready to run on a warehouse connection.
pub struct Scan<'w> {
    connection: &'w mut dyn WarehouseConnection,
    configuration: ScanConfiguration,
    schema: Option<String>,
}

impl<'w> Scan<'w> {
    /// Create a scan of `configuration` over `connection`.
    ///
    /// `schema` narrows the column lookup to one schema.
    pub fn new(
        connection: &'w mut dyn WarehouseConnection,
        configuration: ScanConfiguration,
        schema: Option<String>,
    ) -> Self {
        Self { connection, configuration, schema }
    }

    /// The configuration this scan runs.
    pub fn configuration(&self) -> &ScanConfiguration {
        &self.configuration
    }

    /// Run every query and collect the measurements.
    pub fn execute(mut self) -> Result<ScanResult, SodaError> {
        let started_at = Utc::now();
        let table_name = self.configuration.table_name().to_string();

        let (relation, columns) = self.query_columns()?;
        if columns.is_empty() {
            return Err(SodaError::scan(format!("Table '{table_name}' not found or has no columns")));
        }
        for configured in self.configuration.columns().keys() {
            if !columns.iter().any(|(name, _)| name.to_lowercase() == *configured) {
                tracing::warn!(table = %table_name, column = %configured, "Configured column not in table");
            }
        }

        let plans: Vec<ColumnPlan> = columns
            .into_iter()
            .map(|(name, data_type)| {
                let kind = ColumnKind::from_data_type(&data_type);
                let metrics = self
                    .configuration
                    .metrics_for_column(&name)
                    .into_iter()
                    .filter(|m| kind.supports(*m))
                    .collect();
                ColumnPlan { name, kind, metrics }
            })
            .collect();

        let mut measurements = self.run_aggregates(&relation, &plans)?;
        for plan in plans.iter().filter(|p| p.needs_group_by()) {
            measurements.extend(self.run_group_by(&relation, plan)?);
        }

        let result = ScanResult { measurements, started_at, finished_at: Utc::now() };
        tracing::info!(
            table = %table_name,
            measurement_count = result.measurements.len(),
            duration_ms = result.duration_ms(),
            "Scan completed"
        );
        Ok(result)
    }

    /// The quoted relation to select from, and the table's columns with their data types.
    fn query_columns(&mut self) -> Result<(String, Vec<(String, String)>), SodaError> {
        let mut sql = format!(
            "SELECT column_name, data_type, table_schema, table_name \nFROM information_schema.columns \nWHERE lower(table_name) = '{}'",
            quote_literal(&self.configuration.table_name().to_lowercase())
        );
        if let Some(schema) = &self.schema {
            sql.push_str(&format!(" \n  AND lower(table_schema) = '{}'", quote_literal(&schema.to_lowercase())));
        }
        sql.push_str(" \nORDER BY ordinal_position");

        let mut relation = None;
        let mut columns = Vec::new();
        for row in self.query(&sql)? {
            match row.as_slice() {
                [Value::String(name), Value::String(data_type), Value::String(schema), Value::String(table), ..] => {
                    relation.get_or_insert_with(|| {
                        format!("{}.{}", quote_identifier(schema), quote_identifier(table))
                    });
                    columns.push((name.clone(), data_type.clone()));
                }
                _ => return Err(SodaError::scan(format!("Unexpected column metadata row: {row:?}"))),
            }
        }
        let relation = relation.unwrap_or_else(|| quote_identifier(self.configuration.table_name()));
        Ok((relation, columns))
    }

    fn run_aggregates(&mut self, relation: &str, plans: &[ColumnPlan]) -> Result<Vec<Measurement>, SodaError> {
        let mut expressions = vec!["COUNT(*)".to_string()];
        // (plan index, metric, expression index)
        let mut slots: Vec<(usize, Metric, usize)> = Vec::new();

        for (idx, plan) in plans.iter().enumerate() {
            let column = quote_identifier(&plan.name);
            if plan.needs_values_count() {
                slots.push((idx, Metric::ValuesCount, expressions.len()));
                expressions.push(format!("COUNT({column})"));
            }
            for metric in &plan.metrics {
                let expression = match (plan.kind, *metric) {
                    (ColumnKind::Numeric, Metric::Min) => format!("CAST(MIN({column}) AS DOUBLE PRECISION)"),
                    (ColumnKind::Numeric, Metric::Max) => format!("CAST(MAX({column}) AS DOUBLE PRECISION)"),
                    (ColumnKind::Numeric, Metric::Avg) => format!("CAST(AVG({column}) AS DOUBLE PRECISION)"),
                    (ColumnKind::Numeric, Metric::Sum) => format!("CAST(SUM({column}) AS DOUBLE PRECISION)"),
                    (ColumnKind::Text, Metric::MinLength) => format!("MIN(LENGTH({column}))"),
                    (ColumnKind::Text, Metric::MaxLength) => format!("MAX(LENGTH({column}))"),
                    (ColumnKind::Text, Metric::AvgLength) => {
                        format!("CAST(AVG(LENGTH({column})) AS DOUBLE PRECISION)")
                    }
                    _ => continue,
                };
                slots.push((idx, *metric, expressions.len()));
                expressions.push(expression);
            }
        }

        let sql = format!(
            "SELECT \n  {} \nFROM {}{}",
            expressions.join(",\n  "),
            relation,
            self.where_clause(None)
        );
        let row = self.single_row(&sql, expressions.len())?;
        let row_count = count_value(&row[0])?;

        let mut measurements = Vec::new();
        if self.configuration.wants_row_count() {
            measurements.push(Measurement::table(Metric::RowCount.as_str(), row_count));
        }

        for (idx, plan) in plans.iter().enumerate() {
            let slot_value = |metric: Metric| {
                slots
                    .iter()
                    .find(|(plan_idx, m, _)| *plan_idx == idx && *m == metric)
                    .map(|(_, _, expression_idx)| &row[*expression_idx])
            };
            let values_count = slot_value(Metric::ValuesCount).map(count_value).transpose()?;

            for metric in Metric::ALL.into_iter().filter(|m| plan.metrics.contains(m)) {
                let value = match (metric, values_count) {
                    (Metric::ValuesCount, Some(values)) => Value::from(values),
                    (Metric::MissingCount, Some(values)) => Value::from(row_count - values),
                    (Metric::ValuesPercentage, Some(values)) => Value::from(percentage(values, row_count)),
                    (Metric::MissingPercentage, Some(values)) => {
                        Value::from(percentage(row_count - values, row_count))
                    }
                    _ => match slot_value(metric) {
                        Some(value) => value.clone(),
                        None => continue,
                    },
                };
                measurements.push(Measurement::column(metric.as_str(), plan.name.clone(), value));
            }
        }
        Ok(measurements)
    }

    fn run_group_by(&mut self, relation: &str, plan: &ColumnPlan) -> Result<Vec<Measurement>, SodaError> {
        let column = quote_identifier(&plan.name);
        let sql = format!(
            "SELECT \n  COUNT(*), \n  COUNT(CASE WHEN frequency = 1 THEN 1 END), \n  COUNT(CASE WHEN frequency > 1 THEN 1 END) \n\
             FROM (SELECT {column}, COUNT(*) AS frequency \n      FROM {}{} \n      GROUP BY {column}) AS value_frequencies",
            relation,
            self.where_clause(Some(&format!("{column} IS NOT NULL")))
        );
        let row = self.single_row(&sql, 3)?;

        let mut measurements = Vec::new();
        for (metric, value) in
            [(Metric::Distinct, &row[0]), (Metric::UniqueCount, &row[1]), (Metric::DuplicateCount, &row[2])]
        {
            if plan.metrics.contains(&metric) {
                measurements.push(Measurement::column(metric.as_str(), plan.name.clone(), count_value(value)?));
            }
        }
        Ok(measurements)
    }

    fn where_clause(&self, extra: Option<&str>) -> String {
        let conditions: Vec<String> = self
            .configuration
            .filter()
            .map(|f| format!("({f})"))
            .into_iter()
            .chain(extra.map(String::from))
            .collect();
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" \nWHERE {}", conditions.join(" AND "))
        }
    }

    fn single_row(&mut self, sql: &str, width: usize) -> Result<Row, SodaError> {
        let row = self
            .query(sql)?
            .into_iter()
            .next()
            .ok_or_else(|| SodaError::scan("Aggregate query returned no rows"))?;
        if row.len() < width {
            return Err(SodaError::scan(format!(
                "Aggregate query returned {} columns, expected {width}",
                row.len()
            )));
        }
        Ok(row)
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>, SodaError> {
        tracing::debug!(sql = %sql, "Scan query");
        self.connection.query(sql)
    }
}

fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn count_value(value: &Value) -> Result<i64, SodaError> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .ok_or_else(|| SodaError::scan(format!("Expected a count, got {value}")))
}

fn percentage(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::warehouse::testing::ScriptedConnection;
    use serde_json::json;

    fn columns_response() -> Vec<Row> {
        vec![
            vec![json!("id"), json!("integer"), json!("public"), json!("test_table")],
            vec![json!("name"), json!("character varying"), json!("public"), json!("test_table")],
        ]
    }

    #[test]
    fn test_column_kinds() {
        assert_eq!(ColumnKind::from_data_type("integer"), ColumnKind::Numeric);
        assert_eq!(ColumnKind::from_data_type("Double Precision"), ColumnKind::Numeric);
        assert_eq!(ColumnKind::from_data_type("character varying"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_data_type("text"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_data_type("date"), ColumnKind::Other);
        assert_eq!(ColumnKind::from_data_type("character"), ColumnKind::Text);
        assert!(!ColumnKind::Text.supports(Metric::Min));
        assert!(ColumnKind::Other.supports(Metric::MissingCount));
    }

    #[test]
    fn test_aggregate_metrics() {
        let mut script = ScriptedConnection::default();
        script.respond(columns_response());
        script.respond(vec![vec![json!(4), json!(3), json!(1.0), json!(3.0), json!(4), json!(2)]]);

        let configuration = ScanConfiguration::parse(&json!({
            "table_name": "test_table",
            "metrics": ["row_count", "missing", "min", "max", "min_length"]
        }));
        let result = Scan::new(&mut script, configuration, Some("public".to_string()))
            .execute()
            .unwrap();

        assert_eq!(result.find("row_count", None), Some(&json!(4)));
        assert_eq!(result.find("values_count", Some("id")), Some(&json!(3)));
        assert_eq!(result.find("missing_count", Some("id")), Some(&json!(1)));
        assert_eq!(result.find("missing_percentage", Some("id")), Some(&json!(25.0)));
        assert_eq!(result.find("values_percentage", Some("id")), Some(&json!(75.0)));
        assert_eq!(result.find("min", Some("id")), Some(&json!(1.0)));
        assert_eq!(result.find("max", Some("id")), Some(&json!(3.0)));
        assert_eq!(result.find("missing_count", Some("name")), Some(&json!(0)));
        assert_eq!(result.find("min_length", Some("name")), Some(&json!(2)));
        assert_eq!(result.find("min", Some("name")), None);
        assert_eq!(result.find("min_length", Some("id")), None);

        let statements = script.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("lower(table_name) = 'test_table'"));
        assert!(statements[0].contains("lower(table_schema) = 'public'"));
        assert!(statements[1].contains("CAST(MIN(\"id\") AS DOUBLE PRECISION)"));
        assert!(statements[1].contains("MIN(LENGTH(\"name\"))"));
        assert!(statements[1].contains("FROM \"public\".\"test_table\""));
        assert!(!statements[1].contains("WHERE"));
    }

    #[test]
    fn test_distinct_metrics_use_group_by_with_filter() {
        let mut script = ScriptedConnection::default();
        script.respond(columns_response());
        script.respond(vec![vec![json!(5)]]);
        script.respond(vec![vec![json!(3), json!(2), json!(1)]]);

        let configuration = ScanConfiguration::parse(&json!({
            "table_name": "test_table",
            "columns": {"name": {"metrics": ["distinct"]}},
            "filter": "id > 1"
        }));
        let result = Scan::new(&mut script, configuration, None).execute().unwrap();

        assert_eq!(result.find("row_count", None), None);
        assert_eq!(result.find("distinct", Some("name")), Some(&json!(3)));
        assert_eq!(result.find("unique_count", Some("name")), Some(&json!(2)));
        assert_eq!(result.find("duplicate_count", Some("name")), Some(&json!(1)));
        assert!(result.metrics_for_column("id").is_empty());

        let statements = script.statements();
        assert_eq!(statements.len(), 3);
        assert!(statements[1].contains("WHERE (id > 1)"));
        assert!(statements[2].contains("WHERE (id > 1) AND \"name\" IS NOT NULL"));
        assert!(statements[2].contains("GROUP BY \"name\""));
    }

    #[test]
    fn test_interval_and_money_are_not_numeric() {
        assert_eq!(ColumnKind::from_data_type("interval"), ColumnKind::Other);
        assert_eq!(ColumnKind::from_data_type("money"), ColumnKind::Other);
        assert_eq!(ColumnKind::from_data_type("character_data"), ColumnKind::Other);

        let mut script = ScriptedConnection::default();
        script.respond(vec![
            vec![json!("elapsed"), json!("interval"), json!("public"), json!("test_table")],
            vec![json!("price"), json!("money"), json!("public"), json!("test_table")],
        ]);
        script.respond(vec![vec![json!(2), json!(2), json!(1)]]);

        let configuration = ScanConfiguration::parse(&json!({
            "table_name": "test_table",
            "metrics": ["missing", "min", "max", "avg", "sum"]
        }));
        let result = Scan::new(&mut script, configuration, None).execute().unwrap();

        assert_eq!(result.find("missing_count", Some("elapsed")), Some(&json!(0)));
        assert_eq!(result.find("missing_count", Some("price")), Some(&json!(1)));
        assert_eq!(result.find("min", Some("elapsed")), None);
        assert_eq!(result.find("sum", Some("price")), None);
        let statements = script.statements();
        assert!(!statements[1].contains("MIN("));
        assert!(!statements[1].contains("SUM("));
    }

    #[test]
    fn test_mixed_case_identifiers_are_quoted() {
        let mut script = ScriptedConnection::default();
        script.respond(vec![vec![json!("Size"), json!("integer"), json!("Sales"), json!("Orders")]]);
        script.respond(vec![vec![json!(2), json!(1.0), json!(7.0)]]);
        script.respond(vec![vec![json!(2), json!(2), json!(0)]]);

        let configuration = ScanConfiguration::parse(&json!({
            "table_name": "orders",
            "columns": {"size": {"metrics": ["min", "max", "distinct"]}}
        }));
        let result = Scan::new(&mut script, configuration, None).execute().unwrap();

        assert_eq!(result.find("min", Some("Size")), Some(&json!(1.0)));
        assert_eq!(result.find("distinct", Some("Size")), Some(&json!(2)));
        let statements = script.statements();
        assert!(statements[1].contains("CAST(MIN(\"Size\") AS DOUBLE PRECISION)"));
        assert!(statements[1].contains("FROM \"Sales\".\"Orders\""));
        assert!(statements[2].contains("GROUP BY \"Size\""));
        assert!(statements[2].contains("\"Size\" IS NOT NULL"));
    }

    #[test]
    fn test_quote_identifier_doubles_quotes() {
        assert_eq!(quote_identifier("Size"), "\"Size\"");
        assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_missing_table_fails() {
        let mut script = ScriptedConnection::default();
        script.respond(vec![]);
        let configuration = ScanConfiguration::parse(&json!({"table_name": "nope"}));
        let err = Scan::new(&mut script, configuration, None).execute().unwrap_err();
        assert_eq!(err.category(), "Scan");
    }

    #[test]
    fn test_percentage_of_empty_table_is_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }
}
