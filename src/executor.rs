//! Executes a [`QueryIntent`] against the loaded table.
//!
//! Target and date columns are coerced up front into helper columns
//! (`parse_numeric` / `parse_date`), so junk cells become nulls and drop out
//! of every aggregation instead of failing it.

use crate::column_roles::ColumnRoleMap;
use crate::data_utils::{date_values, numeric_values, DateParsing};
use crate::error::{ResolveIssue, Result, SheetError};
use crate::intent::{Operation, QueryIntent, TrendGranularity};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

const TARGET: &str = "__sheet_target";
const PERIOD: &str = "__sheet_period";
const GROUP: &str = "__sheet_group";
const VALUE: &str = "__sheet_value";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupValue {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// `YYYY-MM` or `YYYY-MM-DD`
    pub period: String,
    pub value: f64,
}

/// Renderable result of a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutcome {
    Scalar {
        operation: Operation,
        column: Option<String>,
        value: Option<f64>,
    },
    Ranked {
        column: String,
        group_by: String,
        descending: bool,
        rows: Vec<GroupValue>,
    },
    Breakdown {
        operation: Operation,
        column: Option<String>,
        group_by: String,
        rows: Vec<GroupValue>,
    },
    Trend {
        column: String,
        date_column: String,
        granularity: TrendGranularity,
        points: Vec<TrendPoint>,
    },
    Unavailable {
        issue: ResolveIssue,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub outcome: QueryOutcome,
    pub total_rows: usize,
    /// Rows left after filters
    pub matched_rows: usize,
    /// Non-empty target/date cells that could not be coerced
    pub skipped_values: usize,
    /// Non-blocking issue from resolution (e.g. ranking fell back to max)
    pub notice: Option<ResolveIssue>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryExecutor;

impl QueryExecutor {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(
        &self,
        df: &DataFrame,
        roles: &ColumnRoleMap,
        intent: &QueryIntent,
    ) -> Result<ExecutionReport> {
        let total_rows = df.height();
        if let Some(issue) = intent.issue.as_ref().filter(|i| i.is_blocking()) {
            return Ok(ExecutionReport {
                outcome: QueryOutcome::Unavailable { issue: issue.clone() },
                total_rows,
                matched_rows: 0,
                skipped_values: 0,
                notice: None,
            });
        }

        let mut frame = df.clone();
        let mut skipped_values = 0;

        let target = intent
            .target_column
            .as_deref()
            .filter(|_| intent.operation.needs_numeric());
        if let Some(target) = target {
            let (values, skipped) = numeric_values(df.column(target)?)?;
            skipped_values += skipped;
            frame.with_column(Series::new(TARGET, values))?;
        }

        if intent.operation == Operation::Trend {
            let date_column = intent.date_column.as_deref().ok_or_else(|| {
                SheetError::Execution("trend requested without a date column".to_string())
            })?;
            let parsing = roles.date_parsing().unwrap_or(DateParsing::Strict);
            let (dates, skipped) = date_values(df.column(date_column)?, parsing)?;
            skipped_values += skipped;
            let periods: Vec<Option<String>> = dates
                .iter()
                .map(|d| d.map(|d| period_key(d, intent.granularity)))
                .collect();
            frame.with_column(Series::new(PERIOD, periods))?;
        }

        let mut lazy = frame.lazy();
        if let Some(mask) = filter_mask(&intent.filters) {
            lazy = lazy.filter(mask);
        }
        let filtered = lazy.collect()?;
        let matched_rows = filtered.height();
        debug!("{} of {} rows match filters {:?}", matched_rows, total_rows, intent.filters);

        let outcome = self.compute(&filtered, intent, target)?;

        Ok(ExecutionReport {
            outcome,
            total_rows,
            matched_rows,
            skipped_values,
            notice: intent.issue.clone(),
        })
    }

    fn compute(
        &self,
        filtered: &DataFrame,
        intent: &QueryIntent,
        target: Option<&str>,
    ) -> Result<QueryOutcome> {
        let missing_target = || SheetError::Execution("no target column resolved".to_string());

        match (intent.operation, intent.group_by_column.as_deref()) {
            (Operation::Top | Operation::Bottom, Some(group_by)) => {
                let column = target.ok_or_else(missing_target)?;
                let descending = intent.operation == Operation::Top;
                let mut rows = grouped(filtered, group_by, col(TARGET).sum())?;
                sort_rows(&mut rows, descending);
                rows.truncate(intent.limit.unwrap_or(rows.len()));
                Ok(QueryOutcome::Ranked {
                    column: column.to_string(),
                    group_by: group_by.to_string(),
                    descending,
                    rows,
                })
            }
            (Operation::Trend, _) => {
                let column = target.ok_or_else(missing_target)?;
                let mut points: Vec<TrendPoint> = grouped(filtered, PERIOD, col(TARGET).sum())?
                    .into_iter()
                    .map(|row| TrendPoint {
                        period: row.label,
                        value: row.value,
                    })
                    .collect();
                points.sort_by(|a, b| a.period.cmp(&b.period));
                Ok(QueryOutcome::Trend {
                    column: column.to_string(),
                    date_column: intent.date_column.clone().unwrap_or_default(),
                    granularity: intent.granularity,
                    points,
                })
            }
            (operation, Some(group_by)) => {
                let mut rows = grouped(filtered, group_by, aggregate(operation))?;
                sort_rows(&mut rows, true);
                Ok(QueryOutcome::Breakdown {
                    operation,
                    column: target.map(str::to_string),
                    group_by: group_by.to_string(),
                    rows,
                })
            }
            (operation, None) => {
                let value = if operation == Operation::Count {
                    Some(filtered.height() as f64)
                } else {
                    target.ok_or_else(missing_target)?;
                    let out = filtered
                        .clone()
                        .lazy()
                        .select([aggregate(operation).alias(VALUE)])
                        .collect()?;
                    let value = out.column(VALUE)?.cast(&DataType::Float64)?;
                    value.f64()?.get(0)
                };
                Ok(QueryOutcome::Scalar {
                    operation,
                    column: target.map(str::to_string),
                    value,
                })
            }
        }
    }
}

/// Aggregation over the coerced target column
fn aggregate(operation: Operation) -> Expr {
    match operation {
        Operation::Mean => col(TARGET).mean(),
        Operation::Max => col(TARGET).max(),
        Operation::Min => col(TARGET).min(),
        Operation::Count => len(),
        Operation::Sum | Operation::Top | Operation::Bottom | Operation::Trend => col(TARGET).sum(),
    }
}

/// AND of `column == value` over all filters
fn filter_mask(filters: &BTreeMap<String, String>) -> Option<Expr> {
    filters
        .iter()
        .map(|(column, value)| col(column).cast(DataType::String).eq(lit(value.clone())))
        .reduce(|acc, expr| acc.and(expr))
}

fn grouped(df: &DataFrame, group_by: &str, agg: Expr) -> Result<Vec<GroupValue>> {
    let out = df
        .clone()
        .lazy()
        .with_columns([col(group_by).cast(DataType::String).alias(GROUP)])
        .group_by([col(GROUP)])
        .agg([agg.alias(VALUE)])
        .collect()?;

    let labels = out.column(GROUP)?.str()?;
    let values = out.column(VALUE)?.cast(&DataType::Float64)?;
    let rows = labels
        .into_iter()
        .zip(values.f64()?.into_iter())
        .filter_map(|(label, value)| {
            Some(GroupValue {
                label: label?.to_string(),
                value: value?,
            })
        })
        .collect();
    Ok(rows)
}

/// Sort by value; equal values fall back to the label so output is stable
fn sort_rows(rows: &mut [GroupValue], descending: bool) {
    rows.sort_by(|a, b| {
        let by_value = if descending {
            b.value.total_cmp(&a.value)
        } else {
            a.value.total_cmp(&b.value)
        };
        match by_value {
            Ordering::Equal => a.label.cmp(&b.label),
            other => other,
        }
    });
}

fn period_key(date: NaiveDate, granularity: TrendGranularity) -> String {
    match granularity {
        TrendGranularity::Month => date.format("%Y-%m").to_string(),
        TrendGranularity::Day => date.format("%Y-%m-%d").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_roles::ColumnRoleClassifier;
    use crate::config::ResolverConfig;
    use crate::intent::QueryIntentResolver;
    use crate::lexicon::Lexicon;
    use crate::value_index::ValueIndex;

    fn run(df: &DataFrame, question: &str) -> (QueryIntent, ExecutionReport) {
        let config = ResolverConfig::default();
        let lexicon = Lexicon::from_config(&config.lexicon);
        let roles = ColumnRoleClassifier::new(&lexicon, &config).classify(df).unwrap();
        let values = ValueIndex::build(df, &roles).unwrap();
        let intent = QueryIntentResolver::new(&lexicon, &config).resolve(question, &roles, &values);
        let report = QueryExecutor::new().execute(df, &roles, &intent).unwrap();
        (intent, report)
    }

    fn orders() -> DataFrame {
        df! [
            "order_date" => ["2024-01-03", "2024-01-20", "2024-02-11", "2024-02-12", "2024-03-01"],
            "customer" => ["Sara", "Omar", "Sara", "Lina", "Omar"],
            "city" => ["Riyadh", "Jeddah", "Riyadh", "Riyadh", "Dammam"],
            "total_price" => [120.0, 80.0, 40.0, 300.0, 10.0]
        ]
        .unwrap()
    }

    #[test]
    fn test_scalar_sum_and_mean() {
        let (_, report) = run(&orders(), "total price");
        assert_eq!(
            report.outcome,
            QueryOutcome::Scalar {
                operation: Operation::Sum,
                column: Some("total_price".to_string()),
                value: Some(550.0),
            }
        );

        let (_, report) = run(&orders(), "average total_price in Riyadh");
        match report.outcome {
            QueryOutcome::Scalar { value: Some(v), .. } => assert!((v - 460.0 / 3.0).abs() < 1e-9),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(report.matched_rows, 3);
    }

    #[test]
    fn test_count_rows_with_filter() {
        let (_, report) = run(&orders(), "how many orders from Omar");
        assert_eq!(report.matched_rows, 2);
        match report.outcome {
            QueryOutcome::Scalar { operation: Operation::Count, value, .. } => {
                assert_eq!(value, Some(2.0))
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_top_customers_sorted_descending() {
        let (intent, report) = run(&orders(), "top customers");
        assert_eq!(intent.group_by_column.as_deref(), Some("customer"));
        match report.outcome {
            QueryOutcome::Ranked { rows, descending, .. } => {
                assert!(descending);
                assert!(rows.len() <= 10);
                let labels: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
                assert_eq!(labels, vec!["Lina", "Sara", "Omar"]);
                assert!(rows.iter().all(|r| rows[0].value >= r.value));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_bottom_city_sorted_ascending() {
        let (_, report) = run(&orders(), "lowest city");
        match report.outcome {
            QueryOutcome::Ranked { rows, descending, .. } => {
                assert!(!descending);
                assert_eq!(rows[0].label, "Dammam");
                assert!(rows.iter().all(|r| rows[0].value <= r.value));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_monthly_trend_is_chronological() {
        let (_, report) = run(&orders(), "monthly trend");
        match report.outcome {
            QueryOutcome::Trend { points, date_column, .. } => {
                assert_eq!(date_column, "order_date");
                assert_eq!(
                    points,
                    vec![
                        TrendPoint { period: "2024-01".to_string(), value: 200.0 },
                        TrendPoint { period: "2024-02".to_string(), value: 340.0 },
                        TrendPoint { period: "2024-03".to_string(), value: 10.0 },
                    ]
                );
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_daily_trend_with_filter() {
        let (_, report) = run(&orders(), "daily sales for Riyadh");
        match report.outcome {
            QueryOutcome::Trend { points, granularity, .. } => {
                assert_eq!(granularity, TrendGranularity::Day);
                let periods: Vec<&str> = points.iter().map(|p| p.period.as_str()).collect();
                assert_eq!(periods, vec!["2024-01-03", "2024-02-11", "2024-02-12"]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_breakdown_by_named_category() {
        let (_, report) = run(&orders(), "total price by city");
        match report.outcome {
            QueryOutcome::Breakdown { rows, group_by, .. } => {
                assert_eq!(group_by, "city");
                assert_eq!(rows[0], GroupValue { label: "Riyadh".to_string(), value: 460.0 });
                assert_eq!(rows.len(), 3);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_unparsable_dates_are_counted_and_skipped() {
        let df = df! [
            "Order Date" => ["05/01/2024", "17/02/2024", "28/02/2024", "01/03/2024", "?"],
            "Sales" => [1.0, 2.0, 3.0, 4.0, 5.0]
        ]
        .unwrap();

        let (_, report) = run(&df, "sales trend");
        assert_eq!(report.skipped_values, 1);
        match report.outcome {
            QueryOutcome::Trend { points, .. } => {
                let total: f64 = points.iter().map(|p| p.value).sum();
                assert_eq!(total, 10.0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_junk_target_cells_are_skipped() {
        let df = df! [
            "item" => ["pen", "cup", "hat"],
            "price" => ["10", "n/a", "5"]
        ]
        .unwrap();

        let (intent, report) = run(&df, "total price");
        assert_eq!(intent.target_column.as_deref(), Some("price"));
        assert!(intent.issue.is_none());
        assert_eq!(report.skipped_values, 1);
        assert_eq!(
            report.outcome,
            QueryOutcome::Scalar {
                operation: Operation::Sum,
                column: Some("price".to_string()),
                value: Some(15.0),
            }
        );
    }

    #[test]
    fn test_unavailable_trend() {
        let df = df! [
            "item" => ["pen", "cup"],
            "price" => [1.0, 2.0]
        ]
        .unwrap();

        let (_, report) = run(&df, "price trend");
        assert_eq!(
            report.outcome,
            QueryOutcome::Unavailable { issue: ResolveIssue::NoDateColumn }
        );
    }

    #[test]
    fn test_max_fallback_without_category() {
        let df = df! [ "sales" => [3.0, 11.0, 7.0] ].unwrap();

        let (_, report) = run(&df, "best sales");
        assert_eq!(report.notice, Some(ResolveIssue::NoCategoricalColumn));
        assert_eq!(
            report.outcome,
            QueryOutcome::Scalar {
                operation: Operation::Max,
                column: Some("sales".to_string()),
                value: Some(11.0),
            }
        );
    }
}
