pub mod answer;
pub mod column_roles;
pub mod config;
pub mod data_utils;
pub mod error;
pub mod executor;
pub mod fuzzy_matcher;
pub mod intent;
pub mod lexicon;
pub mod session;
pub mod table_upload;
pub mod value_index;

pub use answer::AssistantAnswer;
pub use column_roles::{ColumnRole, ColumnRoleClassifier, ColumnRoleMap};
pub use config::ResolverConfig;
pub use error::{ResolveIssue, Result, SheetError};
pub use executor::{ExecutionReport, QueryExecutor, QueryOutcome};
pub use intent::{Operation, QueryIntent, QueryIntentResolver};
pub use session::SheetSession;
pub use value_index::ValueIndex;
