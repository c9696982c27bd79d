//! Resolver configuration
//!
//! Thresholds and word lists used by the column classifier and the question
//! resolver. Every field has a default, so a config file only needs to carry
//! the values it overrides:
//!
//! ```json
//! { "value_match_threshold": 0.92, "lexicon": { "entity_words": ["sku_name"] } }
//! ```

use crate::error::{Result, SheetError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Environment variable naming a JSON config file
pub const CONFIG_ENV_VAR: &str = "SHEET_ASSISTANT_CONFIG";

/// Hard cap on the number of rows a ranking question returns
pub const MAX_RANKING_ROWS: usize = 10;

/// String similarity algorithm used for fuzzy matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityKind {
    /// Normalized Levenshtein ratio
    #[default]
    Levenshtein,
    /// Jaro-Winkler similarity
    JaroWinkler,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum partial-ratio for a column name to count as mentioned in a question
    pub column_match_threshold: f64,
    /// Minimum ratio for a question word to match an indexed cell value
    pub value_match_threshold: f64,
    pub similarity: SimilarityKind,
    /// Rows returned by top/bottom questions (capped at `MAX_RANKING_ROWS`)
    pub ranking_limit: usize,
    /// Share of values that must parse before a date-named text column is promoted to a date
    pub lenient_date_share: f64,
    /// Share of non-empty text cells that must parse as numbers for the column to be a target
    pub numeric_share: f64,
    /// Treat numeric columns named like identifiers (barcode, sale_id) as ignored
    pub ignore_numeric_identifiers: bool,
    /// Shortest question word considered for value filters
    pub min_filter_token_chars: usize,
    pub lexicon: LexiconConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            column_match_threshold: 0.85,
            value_match_threshold: 0.90,
            similarity: SimilarityKind::Levenshtein,
            ranking_limit: 5,
            lenient_date_share: 0.8,
            numeric_share: 0.6,
            ignore_numeric_identifiers: true,
            min_filter_token_chars: 2,
            lexicon: LexiconConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: ResolverConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Loaded resolver config from {}", path.display());
        Ok(config)
    }

    /// Load from the file named by `SHEET_ASSISTANT_CONFIG`, else defaults
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("column_match_threshold", self.column_match_threshold),
            ("value_match_threshold", self.value_match_threshold),
            ("lenient_date_share", self.lenient_date_share),
            ("numeric_share", self.numeric_share),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SheetError::Config(format!(
                    "{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }
        if self.ranking_limit == 0 {
            return Err(SheetError::Config("ranking_limit must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn effective_ranking_limit(&self) -> usize {
        self.ranking_limit.clamp(1, MAX_RANKING_ROWS)
    }
}

/// Bilingual (English / Arabic) word lists.
///
/// Entries are normalized before use, so Arabic spelling variants
/// (أ/ا, ة/ه, ى/ي) may be written either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub top_words: Vec<String>,
    pub bottom_words: Vec<String>,
    pub mean_words: Vec<String>,
    pub trend_words: Vec<String>,
    pub count_words: Vec<String>,
    pub daily_words: Vec<String>,
    /// Column-name words for monetary amounts (weight 2)
    pub money_words: Vec<String>,
    /// Column-name words for quantities (weight 1)
    pub quantity_words: Vec<String>,
    pub identifier_words: Vec<String>,
    pub date_words: Vec<String>,
    /// Column-name words for the default ranking category
    pub entity_words: Vec<String>,
    /// Question words never used as value filters
    pub stop_words: Vec<String>,
    /// Question word -> cell values it may stand for
    pub value_glossary: BTreeMap<String, Vec<String>>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for LexiconConfig {
    fn default() -> Self {
        let glossary: BTreeMap<String, Vec<String>> = [
            ("شمال", vec!["north", "northern"]),
            ("جنوب", vec!["south", "southern"]),
            ("شرق", vec!["east", "eastern"]),
            ("غرب", vec!["west", "western"]),
            ("وسط", vec!["central", "center", "centre"]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), words(&v)))
        .collect();

        Self {
            top_words: words(&[
                "top", "most", "best", "highest", "largest", "biggest", "maximum",
                "أفضل", "أعلى", "أكثر", "أكبر", "الأفضل", "الأعلى",
            ]),
            bottom_words: words(&[
                "bottom", "worst", "lowest", "least", "smallest", "minimum", "fewest",
                "أسوأ", "أقل", "أدنى", "الأقل",
            ]),
            mean_words: words(&["average", "avg", "mean", "متوسط", "معدل"]),
            trend_words: words(&[
                "trend", "over time", "monthly", "per month", "by month", "timeline", "daily",
                "per day", "تطور", "اتجاه", "شهري", "عبر الزمن", "يومي",
            ]),
            count_words: words(&["count", "how many", "number of", "عدد", "كم"]),
            daily_words: words(&["daily", "per day", "by day", "each day", "يومي", "يوميا"]),
            money_words: words(&[
                "sales", "sale", "revenue", "amount", "price", "total", "profit", "cost",
                "income", "value", "مبيعات", "سعر", "اجمالي", "ربح", "تكلفة", "قيمة", "ايراد",
                "مبلغ",
            ]),
            quantity_words: words(&[
                "qty", "quantity", "stock", "units", "count", "كمية", "مخزون", "عدد",
            ]),
            identifier_words: words(&[
                "id", "code", "barcode", "sku", "uuid", "رقم", "كود", "باركود", "معرف",
            ]),
            date_words: words(&[
                "date", "time", "day", "month", "year", "timestamp", "تاريخ", "يوم", "شهر", "وقت",
            ]),
            entity_words: words(&[
                "product", "item", "customer", "client", "category", "brand", "name", "store",
                "branch", "منتج", "صنف", "عميل", "زبون", "فئة", "اسم", "فرع",
            ]),
            stop_words: words(&[
                "the", "in", "of", "for", "and", "by", "to", "what", "is", "are", "show", "me",
                "في", "من", "على", "الى", "عن", "ما", "هو", "هي",
            ]),
            value_glossary: glossary,
        }
    }
}
