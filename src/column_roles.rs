//! Column Role Classifier
//!
//! Assigns every column of a loaded table one semantic role:
//!
//! 1. **Date**: stored as a date, or text whose every value parses as one.
//!    Only the first date-like column is kept; later ones are ignored.
//! 2. **NumericTarget**: numeric storage, or text where at least
//!    `numeric_share` of the non-empty cells coerce to numbers.
//!    Candidates are ranked by how strongly the header reads as money (2) or
//!    a quantity (1), ties kept in column order.
//! 3. **Categorical**: everything else, except identifier-named columns,
//!    which are **Ignored**.
//!
//! A second pass re-parses date-named text columns with lenient formats and
//! promotes them when no date column was found.

use crate::config::ResolverConfig;
use crate::data_utils::{date_values, numeric_values, string_values, DateParsing};
use crate::error::Result;
use crate::lexicon::Lexicon;
use itertools::Itertools;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Date,
    NumericTarget,
    Categorical,
    Ignored,
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ColumnRole::Date => "date",
            ColumnRole::NumericTarget => "numeric",
            ColumnRole::Categorical => "category",
            ColumnRole::Ignored => "ignored",
        };
        f.write_str(label)
    }
}

/// Classification of one column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub role: ColumnRole,
    /// Storage type as loaded
    pub dtype: String,
    /// Why the role was chosen
    pub reason: String,
}

/// A numeric column that can be aggregated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericCandidate {
    pub column: String,
    pub score: u32,
    /// Position in the table, used to break score ties
    pub position: usize,
}

/// Role of every column, built once per table load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnRoleMap {
    columns: Vec<ColumnProfile>,
    numeric_candidates: Vec<NumericCandidate>,
    date_column: Option<String>,
    date_parsing: Option<DateParsing>,
}

impl ColumnRoleMap {
    pub fn columns(&self) -> &[ColumnProfile] {
        &self.columns
    }

    pub fn role(&self, column: &str) -> Option<ColumnRole> {
        self.columns.iter().find(|c| c.name == column).map(|c| c.role)
    }

    /// Numeric candidates, best first
    pub fn numeric_candidates(&self) -> &[NumericCandidate] {
        &self.numeric_candidates
    }

    /// The column aggregated when a question names none
    pub fn default_target(&self) -> Option<&str> {
        self.numeric_candidates.first().map(|c| c.column.as_str())
    }

    pub fn date_column(&self) -> Option<&str> {
        self.date_column.as_deref()
    }

    pub fn date_parsing(&self) -> Option<DateParsing> {
        self.date_parsing
    }

    /// Categorical columns in table order
    pub fn categorical_columns(&self) -> Vec<&str> {
        self.columns_with_role(ColumnRole::Categorical)
    }

    pub fn columns_with_role(&self, role: ColumnRole) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.role == role)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn has_numeric(&self) -> bool {
        !self.numeric_candidates.is_empty()
    }

    pub fn has_categorical(&self) -> bool {
        self.columns.iter().any(|c| c.role == ColumnRole::Categorical)
    }
}

/// Builds a [`ColumnRoleMap`] from a table
pub struct ColumnRoleClassifier<'a> {
    lexicon: &'a Lexicon,
    config: &'a ResolverConfig,
}

impl<'a> ColumnRoleClassifier<'a> {
    pub fn new(lexicon: &'a Lexicon, config: &'a ResolverConfig) -> Self {
        Self { lexicon, config }
    }

    pub fn classify(&self, df: &DataFrame) -> Result<ColumnRoleMap> {
        let mut map = ColumnRoleMap::default();

        for (position, series) in df.get_columns().iter().enumerate() {
            let name = series.name().to_string();
            let dtype = format!("{}", series.dtype());

            if let Some(parsing) = self.date_like(series)? {
                if map.date_column.is_none() {
                    map.date_column = Some(name.clone());
                    map.date_parsing = Some(parsing);
                    map.columns.push(ColumnProfile {
                        name,
                        role: ColumnRole::Date,
                        dtype,
                        reason: "values are dates".to_string(),
                    });
                } else {
                    map.columns.push(ColumnProfile {
                        name,
                        role: ColumnRole::Ignored,
                        dtype,
                        reason: "additional date column (only one date column is used)".to_string(),
                    });
                }
                continue;
            }

            if self.is_numeric(series)? {
                if self.config.ignore_numeric_identifiers && self.lexicon.is_identifier_name(&name) {
                    map.columns.push(ColumnProfile {
                        name,
                        role: ColumnRole::Ignored,
                        dtype,
                        reason: "numeric identifier".to_string(),
                    });
                    continue;
                }
                let score = self.lexicon.relevance_score(&name);
                map.numeric_candidates.push(NumericCandidate {
                    column: name.clone(),
                    score,
                    position,
                });
                map.columns.push(ColumnProfile {
                    name,
                    role: ColumnRole::NumericTarget,
                    dtype,
                    reason: format!("numeric values, relevance score {}", score),
                });
                continue;
            }

            if self.lexicon.is_identifier_name(&name) {
                map.columns.push(ColumnProfile {
                    name,
                    role: ColumnRole::Ignored,
                    dtype,
                    reason: "identifier column".to_string(),
                });
            } else {
                map.columns.push(ColumnProfile {
                    name,
                    role: ColumnRole::Categorical,
                    dtype,
                    reason: "text values".to_string(),
                });
            }
        }

        // stable: equal scores keep column order
        map.numeric_candidates.sort_by(|a, b| b.score.cmp(&a.score));

        if map.date_column.is_none() {
            self.promote_date_named_column(df, &mut map)?;
        }

        info!(
            "Classified {} columns: date={:?}, default target={:?}, {} categorical",
            map.columns.len(),
            map.date_column,
            map.default_target(),
            map.categorical_columns().len()
        );
        Ok(map)
    }

    /// `Some` when the column is a date column in its own right
    fn date_like(&self, series: &Series) -> Result<Option<DateParsing>> {
        match series.dtype() {
            DataType::Date | DataType::Datetime(_, _) => Ok(Some(DateParsing::Native)),
            DataType::String => {
                let (values, skipped) = date_values(series, DateParsing::Strict)?;
                let parsed = values.iter().filter(|v| v.is_some()).count();
                if parsed > 0 && skipped == 0 {
                    Ok(Some(DateParsing::Strict))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    fn is_numeric(&self, series: &Series) -> Result<bool> {
        if series.dtype().is_numeric() {
            return Ok(true);
        }
        if !matches!(series.dtype(), DataType::String) {
            return Ok(false);
        }
        let (values, skipped) = numeric_values(series)?;
        let parsed = values.iter().filter(|v| v.is_some()).count();
        let non_empty = parsed + skipped;
        if skipped > 0 && parsed > 0 {
            debug!(
                "Column '{}': {}/{} text values parse as numbers",
                series.name(),
                parsed,
                non_empty
            );
        }
        Ok(parsed > 0 && parsed as f64 >= self.config.numeric_share * non_empty as f64)
    }

    /// Secondary pass: explicit lenient parse of date-named categorical columns
    fn promote_date_named_column(&self, df: &DataFrame, map: &mut ColumnRoleMap) -> Result<()> {
        let candidates: Vec<String> = map
            .columns
            .iter()
            .filter(|c| c.role == ColumnRole::Categorical && self.lexicon.is_date_name(&c.name))
            .map(|c| c.name.clone())
            .collect();

        for name in candidates {
            let series = df.column(&name)?;
            let (values, skipped) = date_values(series, DateParsing::Lenient)?;
            let parsed = values.iter().filter(|v| v.is_some()).count();
            let non_empty = parsed + skipped;
            if parsed == 0 || (parsed as f64) < self.config.lenient_date_share * non_empty as f64 {
                debug!(
                    "Column '{}' is named like a date but only {}/{} values parse",
                    name, parsed, non_empty
                );
                continue;
            }

            if let Some(profile) = map.columns.iter_mut().find(|c| c.name == name) {
                profile.role = ColumnRole::Date;
                profile.reason = format!("date-named column, {}/{} values parse", parsed, non_empty);
            }
            map.date_column = Some(name);
            map.date_parsing = Some(DateParsing::Lenient);
            break;
        }
        Ok(())
    }
}

/// Distinct non-empty text values of a column, in first-seen order
pub fn distinct_values(series: &Series) -> Result<Vec<String>> {
    Ok(string_values(series)?
        .into_iter()
        .flatten()
        .filter(|v| !v.trim().is_empty())
        .unique()
        .collect())
}
