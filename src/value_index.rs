//! Value index: reverse lookup from a distinct categorical cell value to the
//! column it came from, used to spot filters typed into a question
//! ("sales for Riyadh").
//!
//! Keys are normalized values. When the same value occurs in two categorical
//! columns the later column wins; the collision is kept for inspection but is
//! not treated as an error.

use crate::column_roles::{distinct_values, ColumnRoleMap};
use crate::error::Result;
use crate::fuzzy_matcher::FuzzyMatcher;
use crate::lexicon::normalize_text;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// The column and original spelling behind an index key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedValue {
    pub column: String,
    pub value: String,
}

/// A key that was claimed by more than one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCollision {
    pub key: String,
    pub replaced_column: String,
    pub winning_column: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValueIndex {
    entries: BTreeMap<String, IndexedValue>,
    collisions: Vec<ValueCollision>,
}

impl ValueIndex {
    /// Index every categorical column of the table, in column order
    pub fn build(df: &DataFrame, roles: &ColumnRoleMap) -> Result<Self> {
        let mut index = ValueIndex::default();
        for column in roles.categorical_columns() {
            let series = df.column(column)?;
            for value in distinct_values(series)? {
                index.insert(column, &value);
            }
        }
        debug!(
            "Indexed {} distinct values ({} collisions)",
            index.entries.len(),
            index.collisions.len()
        );
        Ok(index)
    }

    /// Insert one value; a key already owned by another column is taken over.
    pub fn insert(&mut self, column: &str, value: &str) {
        let key = normalize_text(value);
        if key.is_empty() {
            return;
        }
        let entry = IndexedValue {
            column: column.to_string(),
            value: value.to_string(),
        };
        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            if previous.column != column {
                debug!(
                    "Value '{}' appears in '{}' and '{}'; keeping '{}'",
                    value, previous.column, column, column
                );
                self.collisions.push(ValueCollision {
                    key,
                    replaced_column: previous.column,
                    winning_column: column.to_string(),
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup of a value (normalized before lookup)
    pub fn get(&self, value: &str) -> Option<&IndexedValue> {
        self.entries.get(&normalize_text(value))
    }

    pub fn collisions(&self) -> &[ValueCollision] {
        &self.collisions
    }

    /// Best fuzzy match for an already-normalized word
    pub fn best_match(&self, normalized: &str, matcher: &FuzzyMatcher) -> Option<(&IndexedValue, f64)> {
        if let Some(hit) = self.entries.get(normalized) {
            return Some((hit, 1.0));
        }
        let keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        let (idx, score) = matcher.find_best_match(normalized, keys.iter().copied())?;
        self.entries.get(keys[idx]).map(|hit| (hit, score))
    }
}
