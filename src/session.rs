//! Sheet session: one loaded table plus everything derived from it.
//!
//! Loading a table classifies its columns and builds the value index once;
//! questions are then resolved and executed against that state. Loading a
//! new table replaces it and clears the chat history.

use crate::answer::{render_message, AssistantAnswer};
use crate::column_roles::{ColumnRole, ColumnRoleClassifier, ColumnRoleMap};
use crate::config::ResolverConfig;
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::intent::{QueryIntent, QueryIntentResolver};
use crate::lexicon::Lexicon;
use crate::table_upload::{read_table, TableUpload};
use crate::value_index::ValueIndex;
use polars::prelude::*;
use std::fmt::Write;
use std::path::Path;
use tracing::{info, warn};

/// A table with its role map and value index
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub name: String,
    pub frame: DataFrame,
    pub roles: ColumnRoleMap,
    pub values: ValueIndex,
}

pub struct SheetSession {
    config: ResolverConfig,
    lexicon: Lexicon,
    executor: QueryExecutor,
    table: Option<LoadedTable>,
    history: Vec<AssistantAnswer>,
}

impl Default for SheetSession {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl SheetSession {
    pub fn new(config: ResolverConfig) -> Self {
        let lexicon = Lexicon::from_config(&config.lexicon);
        Self {
            config,
            lexicon,
            executor: QueryExecutor::new(),
            table: None,
            history: Vec::new(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Replace the current table
    pub fn load_table(&mut self, name: &str, frame: DataFrame) -> Result<&LoadedTable> {
        let roles = ColumnRoleClassifier::new(&self.lexicon, &self.config).classify(&frame)?;
        let values = ValueIndex::build(&frame, &roles)?;
        info!(
            "Table '{}' ready: {} rows, {} indexed values",
            name,
            frame.height(),
            values.len()
        );
        self.history.clear();
        Ok(&*self.table.insert(LoadedTable {
            name: name.to_string(),
            frame,
            roles,
            values,
        }))
    }

    /// Read a CSV / Parquet / JSON file and load it
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<TableUpload> {
        let (upload, frame) = read_table(path)?;
        self.load_table(&upload.table_name, frame)?;
        Ok(upload)
    }

    pub fn table(&self) -> Option<&LoadedTable> {
        self.table.as_ref()
    }

    pub fn roles(&self) -> Option<&ColumnRoleMap> {
        self.table.as_ref().map(|t| &t.roles)
    }

    pub fn value_index(&self) -> Option<&ValueIndex> {
        self.table.as_ref().map(|t| &t.values)
    }

    /// Resolve a question without executing it
    pub fn resolve(&self, question: &str) -> Option<QueryIntent> {
        let table = self.table.as_ref()?;
        let resolver = QueryIntentResolver::new(&self.lexicon, &self.config);
        Some(resolver.resolve(question, &table.roles, &table.values))
    }

    /// Answer a question. Never fails: a missing table or an execution error
    /// comes back as the answer message.
    pub fn ask(&mut self, question: &str) -> AssistantAnswer {
        let question = question.trim();
        let answer = match self.table.as_ref() {
            None => AssistantAnswer::new(
                question,
                None,
                None,
                "Please load a table before asking questions.".to_string(),
            ),
            Some(_) if question.is_empty() => AssistantAnswer::new(
                question,
                None,
                None,
                "Please ask a question about the table.".to_string(),
            ),
            Some(table) => {
                let intent = QueryIntentResolver::new(&self.lexicon, &self.config).resolve(
                    question,
                    &table.roles,
                    &table.values,
                );
                match self.executor.execute(&table.frame, &table.roles, &intent) {
                    Ok(report) => {
                        let message = render_message(&intent, &report);
                        AssistantAnswer::new(question, Some(intent), Some(report), message)
                    }
                    Err(e) => {
                        warn!("Failed to answer '{}': {}", question, e);
                        let message = format!("Sorry, this question could not be answered: {}", e);
                        AssistantAnswer::new(question, Some(intent), None, message)
                    }
                }
            }
        };
        self.history.push(answer.clone());
        answer
    }

    /// Answered questions since the current table was loaded, oldest first
    pub fn history(&self) -> &[AssistantAnswer] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Human-readable summary of the table and its column roles
    pub fn describe(&self) -> String {
        let Some(table) = self.table.as_ref() else {
            return "No table loaded.".to_string();
        };
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Table '{}': {} rows, {} columns",
            table.name,
            table.frame.height(),
            table.frame.width()
        );
        for profile in table.roles.columns() {
            let _ = write!(out, "  {} [{}] {}", profile.name, profile.dtype, profile.role);
            if profile.role == ColumnRole::NumericTarget
                && table.roles.default_target() == Some(profile.name.as_str())
            {
                out.push_str(" (default target)");
            }
            let _ = writeln!(out, ": {}", profile.reason);
        }
        if let Some(parsing) = table.roles.date_parsing() {
            let _ = writeln!(out, "Dates read as: {:?}", parsing);
        }
        let _ = writeln!(out, "Indexed values: {}", table.values.len());
        for collision in table.values.collisions() {
            let _ = writeln!(
                out,
                "  '{}' appears in {} and {}; {} is used",
                collision.key,
                collision.replaced_column,
                collision.winning_column,
                collision.winning_column
            );
        }
        out
    }
}
