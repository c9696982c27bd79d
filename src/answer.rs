//! Answers returned to the user, plus their one-line text rendering.

use crate::executor::{ExecutionReport, GroupValue, QueryOutcome};
use crate::intent::{Operation, QueryIntent, TrendGranularity};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantAnswer {
    pub id: Uuid,
    pub asked_at: DateTime<Utc>,
    pub question: String,
    /// `None` when no table was loaded
    pub intent: Option<QueryIntent>,
    /// `None` when nothing was executed
    pub report: Option<ExecutionReport>,
    pub message: String,
}

impl AssistantAnswer {
    pub fn new(
        question: &str,
        intent: Option<QueryIntent>,
        report: Option<ExecutionReport>,
        message: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            asked_at: Utc::now(),
            question: question.to_string(),
            intent,
            report,
            message,
        }
    }

    pub fn outcome(&self) -> Option<&QueryOutcome> {
        self.report.as_ref().map(|r| &r.outcome)
    }
}

/// Format a number for display: integers without decimals, thousands grouped
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    };
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };
    let (whole, fraction) = match digits.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (digits, None),
    };

    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match fraction {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

fn operation_label(operation: Operation) -> &'static str {
    match operation {
        Operation::Sum | Operation::Top | Operation::Bottom | Operation::Trend => "Total",
        Operation::Mean => "Average",
        Operation::Count => "Number of rows",
        Operation::Max => "Highest",
        Operation::Min => "Lowest",
    }
}

fn filter_clause(filters: &BTreeMap<String, String>) -> String {
    if filters.is_empty() {
        return String::new();
    }
    let parts = filters
        .iter()
        .map(|(column, value)| format!("{} = {}", column, value))
        .join(" and ");
    format!(" where {}", parts)
}

fn list_rows(rows: &[GroupValue]) -> String {
    rows.iter()
        .map(|r| format!("{} ({})", r.label, format_number(r.value)))
        .join(", ")
}

/// One-line answer text for an executed question
pub fn render_message(intent: &QueryIntent, report: &ExecutionReport) -> String {
    let filters = filter_clause(&intent.filters);

    let body = match &report.outcome {
        QueryOutcome::Unavailable { issue } => return issue.to_string(),
        QueryOutcome::Scalar { operation, column, value } => {
            let subject = match (operation, column) {
                (Operation::Count, _) | (_, None) => operation_label(*operation).to_string(),
                (_, Some(column)) => format!("{} {}", operation_label(*operation), column),
            };
            match value {
                Some(v) => format!("{}{}: {}", subject, filters, format_number(*v)),
                None => format!("{}{}: no values to aggregate", subject, filters),
            }
        }
        QueryOutcome::Ranked { column, group_by, descending, rows } => {
            if rows.is_empty() {
                format!("No {} values match{}", group_by, filters)
            } else {
                format!(
                    "{} {} {} by {}{}: {}",
                    if *descending { "Top" } else { "Bottom" },
                    rows.len(),
                    group_by,
                    column,
                    filters,
                    list_rows(rows)
                )
            }
        }
        QueryOutcome::Breakdown { operation, column, group_by, rows } => {
            let subject = match (operation, column) {
                (Operation::Count, _) | (_, None) => operation_label(*operation).to_string(),
                (_, Some(column)) => format!("{} {}", operation_label(*operation), column),
            };
            if rows.is_empty() {
                format!("{} by {}{}: no matching rows", subject, group_by, filters)
            } else {
                format!("{} by {}{}: {}", subject, group_by, filters, list_rows(rows))
            }
        }
        QueryOutcome::Trend { column, granularity, points, .. } => {
            let period = match granularity {
                TrendGranularity::Month => "month",
                TrendGranularity::Day => "day",
            };
            if points.is_empty() {
                format!("No dated rows to chart {} by {}{}", column, period, filters)
            } else {
                let series = points
                    .iter()
                    .map(|p| format!("{}: {}", p.period, format_number(p.value)))
                    .join(", ");
                format!("{} by {}{}: {}", column, period, filters, series)
            }
        }
    };

    let mut message = match &report.notice {
        Some(notice) => format!("{} {}", notice, body),
        None => body,
    };
    if report.skipped_values > 0 {
        message.push_str(&format!(
            " ({} values could not be read and were skipped)",
            report.skipped_values
        ));
    }
    message
}
