use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Table load error: {0}")]
    Load(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for SheetError {
    fn from(err: polars::error::PolarsError) -> Self {
        SheetError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SheetError>;

/// Conditions under which a question cannot be answered as asked.
///
/// These never abort a question: they are carried on the intent/outcome and
/// rendered as the answer text.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResolveIssue {
    #[error("No numeric column is available to aggregate. Please load a table with amounts or quantities.")]
    NoNumericColumn,

    #[error("No date column is available, so a trend over time cannot be shown.")]
    NoDateColumn,

    #[error("There is no category column to rank by, so the overall value is shown instead.")]
    NoCategoricalColumn,
}

impl ResolveIssue {
    /// Blocking issues leave nothing to compute; the others are notices
    /// attached to a fallback answer.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, ResolveIssue::NoCategoricalColumn)
    }
}
