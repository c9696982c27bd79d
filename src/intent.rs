//! Query Intent Resolver
//!
//! Turns a free-text question plus the table's role map and value index into
//! a [`QueryIntent`]. Each field comes from its own pass:
//!
//! 1. operator from keywords (top → bottom → mean → trend → count → sum)
//! 2. target column: a numeric column named in the question, else the best-ranked one
//! 3. group-by column: a categorical column named in the question; ranking
//!    questions fall back to an entity-like column
//! 4. filters: question words that match indexed cell values
//! 5. date column for trends
//!
//! Resolution never fails. Anything missing degrades to a default, and only
//! structurally impossible questions carry a [`ResolveIssue`].

use crate::column_roles::ColumnRoleMap;
use crate::config::{ResolverConfig, MAX_RANKING_ROWS};
use crate::error::ResolveIssue;
use crate::fuzzy_matcher::{similarity_for, FuzzyMatcher};
use crate::lexicon::{name_tokens, normalize_text, raw_words, strip_clitics, Lexicon, NormalizedQuery};
use crate::value_index::ValueIndex;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Longest run of words tried as a single multi-word cell value
const MAX_VALUE_WORDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Sum,
    Mean,
    Count,
    /// Scalar maximum, used when a ranking question has no category to rank
    Max,
    /// Scalar minimum, the `Bottom` counterpart of `Max`
    Min,
    Top,
    Bottom,
    Trend,
}

impl Operation {
    /// Whether the operation aggregates a numeric column
    pub fn needs_numeric(self) -> bool {
        !matches!(self, Operation::Count)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Operation::Sum => "sum",
            Operation::Mean => "mean",
            Operation::Count => "count",
            Operation::Max => "max",
            Operation::Min => "min",
            Operation::Top => "top",
            Operation::Bottom => "bottom",
            Operation::Trend => "trend",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrendGranularity {
    Day,
    #[default]
    Month,
}

/// Structured reading of one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntent {
    pub query: String,
    /// Operation to execute, after fallbacks
    pub operation: Operation,
    /// Operation the wording asked for
    pub requested_operation: Operation,
    pub target_column: Option<String>,
    pub group_by_column: Option<String>,
    pub date_column: Option<String>,
    pub granularity: TrendGranularity,
    /// Rows kept by top/bottom questions
    pub limit: Option<usize>,
    /// column -> value, combined with AND
    pub filters: BTreeMap<String, String>,
    pub issue: Option<ResolveIssue>,
    /// One line per resolution step
    pub reasoning: Vec<String>,
}

impl QueryIntent {
    /// False when the question cannot be computed at all
    pub fn is_answerable(&self) -> bool {
        !self.issue.as_ref().map_or(false, ResolveIssue::is_blocking)
    }
}

pub struct QueryIntentResolver<'a> {
    lexicon: &'a Lexicon,
    config: &'a ResolverConfig,
    column_matcher: FuzzyMatcher,
    value_matcher: FuzzyMatcher,
}

impl<'a> QueryIntentResolver<'a> {
    pub fn new(lexicon: &'a Lexicon, config: &'a ResolverConfig) -> Self {
        Self {
            lexicon,
            config,
            column_matcher: FuzzyMatcher::with_similarity(
                config.column_match_threshold,
                similarity_for(config.similarity),
            ),
            value_matcher: FuzzyMatcher::with_similarity(
                config.value_match_threshold,
                similarity_for(config.similarity),
            ),
        }
    }

    pub fn resolve(&self, question: &str, roles: &ColumnRoleMap, values: &ValueIndex) -> QueryIntent {
        let normalized = NormalizedQuery::new(question);
        let mut reasoning = Vec::new();

        let requested = self.extract_operation(&normalized);
        reasoning.push(format!("operation: {}", requested));

        let numeric: Vec<&str> = roles
            .numeric_candidates()
            .iter()
            .map(|c| c.column.as_str())
            .collect();
        let target = match self.named_column(question, &numeric) {
            Some(named) => {
                reasoning.push(format!("target: {} (named in question)", named));
                Some(named.to_string())
            }
            None => {
                let fallback = roles.default_target().map(str::to_string);
                if let Some(ref column) = fallback {
                    reasoning.push(format!("target: {} (highest ranked numeric column)", column));
                }
                fallback
            }
        };

        let categorical = roles.categorical_columns();
        let named_group = self.named_column(question, &categorical).map(str::to_string);

        let filters = self.extract_filters(question, roles, values);
        for (column, value) in &filters {
            reasoning.push(format!("filter: {} = {}", column, value));
        }

        let mut intent = QueryIntent {
            query: question.to_string(),
            operation: requested,
            requested_operation: requested,
            target_column: target,
            group_by_column: None,
            date_column: None,
            granularity: TrendGranularity::default(),
            limit: None,
            filters,
            issue: None,
            reasoning,
        };

        match requested {
            Operation::Trend => {
                intent.granularity = if self.lexicon.daily.matches(&normalized) {
                    TrendGranularity::Day
                } else {
                    TrendGranularity::Month
                };
                match roles.date_column() {
                    Some(date) => {
                        intent.date_column = Some(date.to_string());
                        intent.reasoning.push(format!("date column: {}", date));
                    }
                    None => intent.issue = Some(ResolveIssue::NoDateColumn),
                }
            }
            Operation::Top | Operation::Bottom => {
                let group = named_group.or_else(|| self.best_guess_category(roles));
                match group {
                    Some(column) => {
                        intent.reasoning.push(format!("rank by: {}", column));
                        intent.group_by_column = Some(column);
                        intent.limit = Some(self.ranking_limit(&normalized));
                    }
                    None => {
                        intent.operation = if requested == Operation::Top {
                            Operation::Max
                        } else {
                            Operation::Min
                        };
                        intent.issue = Some(ResolveIssue::NoCategoricalColumn);
                        intent
                            .reasoning
                            .push(format!("no category column, falling back to {}", intent.operation));
                    }
                }
            }
            Operation::Count => {
                intent.target_column = None;
                intent.group_by_column = self.breakdown_column(named_group, &intent.filters);
            }
            _ => {
                intent.group_by_column = self.breakdown_column(named_group, &intent.filters);
            }
        }

        if let Some(ref group) = intent.group_by_column {
            if intent.operation != Operation::Top && intent.operation != Operation::Bottom {
                intent.reasoning.push(format!("group by: {}", group));
            }
        }

        if intent.issue.as_ref().map_or(true, |i| !i.is_blocking())
            && intent.operation.needs_numeric()
            && intent.target_column.is_none()
        {
            intent.issue = Some(ResolveIssue::NoNumericColumn);
        }

        info!(
            "Resolved '{}': {} on {:?}, group={:?}, filters={:?}, issue={:?}",
            question,
            intent.operation,
            intent.target_column,
            intent.group_by_column,
            intent.filters,
            intent.issue
        );
        intent
    }

    /// Keyword precedence: top, bottom, mean, trend, count, then sum
    pub fn extract_operation(&self, query: &NormalizedQuery) -> Operation {
        let ordered = [
            (&self.lexicon.top, Operation::Top),
            (&self.lexicon.bottom, Operation::Bottom),
            (&self.lexicon.mean, Operation::Mean),
            (&self.lexicon.trend, Operation::Trend),
            (&self.lexicon.count, Operation::Count),
        ];
        ordered
            .iter()
            .find(|(set, _)| set.matches(query))
            .map(|(_, op)| *op)
            .unwrap_or(Operation::Sum)
    }

    /// First candidate column (in the given order) the question mentions
    fn named_column<'c>(&self, question: &str, candidates: &[&'c str]) -> Option<&'c str> {
        candidates
            .iter()
            .copied()
            .find(|column| self.column_matcher.mentions(column, question))
    }

    fn best_guess_category(&self, roles: &ColumnRoleMap) -> Option<String> {
        let categorical = roles.categorical_columns();
        categorical
            .iter()
            .find(|c| self.lexicon.is_entity_name(c))
            .or_else(|| categorical.first())
            .map(|c| c.to_string())
    }

    /// A named category only groups the result when it is not just the
    /// context of a filter ("sales for customer Omar").
    fn breakdown_column(
        &self,
        named_group: Option<String>,
        filters: &BTreeMap<String, String>,
    ) -> Option<String> {
        named_group.filter(|column| !filters.contains_key(column))
    }

    /// Row count for ranking questions: an explicit "top 3", else the configured default
    fn ranking_limit(&self, query: &NormalizedQuery) -> usize {
        query
            .tokens
            .iter()
            .filter_map(|t| t.parse::<usize>().ok())
            .find(|n| (1..=MAX_RANKING_ROWS).contains(n))
            .unwrap_or_else(|| self.config.effective_ranking_limit())
    }

    /// Spellings of a question word worth looking up in the value index
    fn filter_candidates(&self, normalized: &str) -> Vec<String> {
        std::iter::once(normalized.to_string())
            .chain(strip_clitics(normalized))
            .chain(self.lexicon.glossary_values(normalized).into_iter().map(str::to_string))
            .unique()
            .collect()
    }

    /// Question words naming a column ("customer", "region") are never value filters
    fn is_header_word(&self, normalized: &str, header_words: &[String]) -> bool {
        let stripped = strip_clitics(normalized);
        header_words.iter().any(|header| {
            header == normalized
                || stripped.as_deref() == Some(header.as_str())
                || self.column_matcher.is_match(normalized, header)
        })
    }

    fn extract_filters(
        &self,
        question: &str,
        roles: &ColumnRoleMap,
        values: &ValueIndex,
    ) -> BTreeMap<String, String> {
        let mut filters = BTreeMap::new();
        if values.is_empty() {
            return filters;
        }
        let words = raw_words(question);
        let header_words: Vec<String> = roles
            .columns()
            .iter()
            .flat_map(|c| name_tokens(&c.name))
            .unique()
            .collect();

        for word in &words {
            let normalized = normalize_text(word);
            if normalized.is_empty()
                || self.lexicon.is_stop_word(&normalized)
                || self.lexicon.is_operator_word(&normalized)
                || self.is_header_word(&normalized, &header_words)
            {
                continue;
            }
            // short codes ("A") only count when spelled exactly like the cell
            if normalized.chars().count() < self.config.min_filter_token_chars {
                if let Some(hit) = values.get(&normalized).filter(|hit| hit.value == *word) {
                    filters.insert(hit.column.clone(), hit.value.clone());
                }
                continue;
            }
            let digits_only = normalized.chars().all(|c| c.is_ascii_digit());

            for candidate in self.filter_candidates(&normalized) {
                let hit = if digits_only {
                    values.get(&candidate).map(|hit| (hit, 1.0))
                } else {
                    values.best_match(&candidate, &self.value_matcher)
                };
                if let Some((hit, score)) = hit {
                    debug!(
                        "'{}' matches {} = '{}' ({:.2})",
                        word, hit.column, hit.value, score
                    );
                    filters.insert(hit.column.clone(), hit.value.clone());
                    break;
                }
            }
        }

        // multi-word values ("New York") only match exactly
        for width in 2..=MAX_VALUE_WORDS {
            for window in words.windows(width) {
                if let Some(hit) = values.get(&window.join(" ")) {
                    filters.insert(hit.column.clone(), hit.value.clone());
                }
            }
        }

        filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_roles::ColumnRoleClassifier;
    use polars::prelude::*;

    struct Fixture {
        config: ResolverConfig,
        lexicon: Lexicon,
    }

    impl Fixture {
        fn new() -> Self {
            let config = ResolverConfig::default();
            let lexicon = Lexicon::from_config(&config.lexicon);
            Self { config, lexicon }
        }

        fn resolve(&self, df: &DataFrame, question: &str) -> QueryIntent {
            let roles = ColumnRoleClassifier::new(&self.lexicon, &self.config)
                .classify(df)
                .unwrap();
            let values = ValueIndex::build(df, &roles).unwrap();
            QueryIntentResolver::new(&self.lexicon, &self.config).resolve(question, &roles, &values)
        }
    }

    fn sales_table() -> DataFrame {
        df! [
            "Product" => ["A", "B", "A"],
            "Region" => ["North", "South", "South"],
            "Sales" => [100.0, 50.0, 30.0]
        ]
        .unwrap()
    }

    #[test]
    fn test_no_keywords_defaults_to_sum() {
        let fixture = Fixture::new();
        let intent = fixture.resolve(&sales_table(), "hello there");
        assert_eq!(intent.operation, Operation::Sum);
        assert_eq!(intent.target_column.as_deref(), Some("Sales"));
        assert!(intent.filters.is_empty());
        assert_eq!(intent.group_by_column, None);
        assert!(intent.issue.is_none());
    }

    #[test]
    fn test_operator_precedence() {
        let fixture = Fixture::new();
        let df = sales_table();
        assert_eq!(fixture.resolve(&df, "top products").operation, Operation::Top);
        assert_eq!(fixture.resolve(&df, "worst region").operation, Operation::Bottom);
        assert_eq!(fixture.resolve(&df, "average sales").operation, Operation::Mean);
        assert_eq!(fixture.resolve(&df, "how many rows").operation, Operation::Count);
        // ranking beats average when both appear
        assert_eq!(
            fixture.resolve(&df, "highest average sales").operation,
            Operation::Top
        );
    }

    #[test]
    fn test_arabic_best_product() {
        let fixture = Fixture::new();
        let intent = fixture.resolve(&sales_table(), "أفضل منتج");
        assert_eq!(intent.operation, Operation::Top);
        assert_eq!(intent.target_column.as_deref(), Some("Sales"));
        assert_eq!(intent.group_by_column.as_deref(), Some("Product"));
        assert_eq!(intent.limit, Some(5));
    }

    #[test]
    fn test_arabic_total_in_north() {
        let fixture = Fixture::new();
        let intent = fixture.resolve(&sales_table(), "اجمالي المبيعات في الشمال");
        assert_eq!(intent.operation, Operation::Sum);
        assert_eq!(intent.target_column.as_deref(), Some("Sales"));
        assert_eq!(intent.filters.len(), 1);
        assert_eq!(intent.filters.get("Region").map(String::as_str), Some("North"));
        assert_eq!(intent.group_by_column, None);
    }

    #[test]
    fn test_exact_header_selects_column() {
        let fixture = Fixture::new();
        let df = df! [
            "Store" => ["s1", "s2"],
            "Gross Margin" => [1.0, 2.0],
            "Sales" => [10.0, 20.0]
        ]
        .unwrap();

        let intent = fixture.resolve(&df, "Gross Margin");
        assert_eq!(intent.target_column.as_deref(), Some("Gross Margin"));
    }

    #[test]
    fn test_filter_round_trip_keeps_original_casing() {
        let fixture = Fixture::new();
        let intent = fixture.resolve(&sales_table(), "total sales in the south");
        assert_eq!(intent.filters.get("Region").map(String::as_str), Some("South"));
    }

    #[test]
    fn test_filter_tolerates_typo() {
        let fixture = Fixture::new();
        let df = df! [
            "City" => ["Johannesburg", "Cairo"],
            "Amount" => [5.0, 7.0]
        ]
        .unwrap();

        let intent = fixture.resolve(&df, "amount in Johanesburg");
        assert_eq!(
            intent.filters.get("City").map(String::as_str),
            Some("Johannesburg")
        );
    }

    #[test]
    fn test_trend_without_date_column_reports_issue() {
        let fixture = Fixture::new();
        let intent = fixture.resolve(&sales_table(), "sales trend");
        assert_eq!(intent.operation, Operation::Trend);
        assert_eq!(intent.issue, Some(ResolveIssue::NoDateColumn));
        assert!(!intent.is_answerable());
    }

    #[test]
    fn test_trend_granularity() {
        let fixture = Fixture::new();
        let df = df! [
            "date" => ["2024-01-01", "2024-01-02"],
            "Sales" => [1.0, 2.0]
        ]
        .unwrap();

        let monthly = fixture.resolve(&df, "sales over time");
        assert_eq!(monthly.date_column.as_deref(), Some("date"));
        assert_eq!(monthly.granularity, TrendGranularity::Month);

        let daily = fixture.resolve(&df, "daily sales");
        assert_eq!(daily.operation, Operation::Trend);
        assert_eq!(daily.granularity, TrendGranularity::Day);
    }

    #[test]
    fn test_ranking_without_category_falls_back_to_max() {
        let fixture = Fixture::new();
        let df = df! [ "Sales" => [1.0, 9.0, 4.0] ].unwrap();

        let intent = fixture.resolve(&df, "highest sales");
        assert_eq!(intent.requested_operation, Operation::Top);
        assert_eq!(intent.operation, Operation::Max);
        assert_eq!(intent.issue, Some(ResolveIssue::NoCategoricalColumn));
        assert!(intent.is_answerable());
    }

    #[test]
    fn test_numeric_question_without_numeric_column() {
        let fixture = Fixture::new();
        let df = df! [ "name" => ["a", "b"] ].unwrap();

        let sum = fixture.resolve(&df, "total");
        assert_eq!(sum.issue, Some(ResolveIssue::NoNumericColumn));

        let count = fixture.resolve(&df, "how many");
        assert_eq!(count.operation, Operation::Count);
        assert!(count.issue.is_none());
    }

    #[test]
    fn test_explicit_ranking_limit_and_group() {
        let fixture = Fixture::new();
        let intent = fixture.resolve(&sales_table(), "top 2 region");
        assert_eq!(intent.group_by_column.as_deref(), Some("Region"));
        assert_eq!(intent.limit, Some(2));
    }

    #[test]
    fn test_named_category_groups_sum() {
        let fixture = Fixture::new();
        let intent = fixture.resolve(&sales_table(), "sales by region");
        assert_eq!(intent.operation, Operation::Sum);
        assert_eq!(intent.group_by_column.as_deref(), Some("Region"));
    }

    #[test]
    fn test_column_name_words_are_not_filters() {
        let fixture = Fixture::new();
        let df = df! [
            "Customer" => ["Sara", "Omar", "Lina"],
            "Segment" => ["Customer", "Partner", "Partner"],
            "Sales" => [10.0, 20.0, 30.0]
        ]
        .unwrap();

        let intent = fixture.resolve(&df, "top customer");
        assert!(intent.filters.is_empty());
        assert_eq!(intent.group_by_column.as_deref(), Some("Customer"));

        // the value itself is still reachable when the header is not mentioned
        let partner = fixture.resolve(&df, "sales for partner");
        assert_eq!(partner.filters.get("Segment").map(String::as_str), Some("Partner"));
    }

    #[test]
    fn test_filters_on_two_columns() {
        let fixture = Fixture::new();
        let intent = fixture.resolve(&sales_table(), "sales for A in South");
        assert_eq!(intent.filters.len(), 2);
        assert_eq!(intent.filters.get("Product").map(String::as_str), Some("A"));
        assert_eq!(intent.filters.get("Region").map(String::as_str), Some("South"));
        assert_eq!(intent.group_by_column, None);

        // a lower-case article is not the product code
        let article = fixture.resolve(&sales_table(), "what is a total");
        assert!(article.filters.is_empty());
    }

    #[test]
    fn test_repeated_filter_column_keeps_last_value() {
        let fixture = Fixture::new();
        let intent = fixture.resolve(&sales_table(), "sales in North South");
        assert_eq!(intent.filters.len(), 1);
        assert_eq!(intent.filters.get("Region").map(String::as_str), Some("South"));
    }

    #[test]
    fn test_filtered_category_does_not_group() {
        let fixture = Fixture::new();
        let intent = fixture.resolve(&sales_table(), "sales for region North");
        assert_eq!(intent.group_by_column, None);
        assert_eq!(intent.filters.get("Region").map(String::as_str), Some("North"));
    }
}
