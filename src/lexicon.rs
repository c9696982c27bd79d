//! Text normalization and keyword lexicons
//!
//! Questions and column headers arrive in English or Arabic, often with
//! spelling variants. Everything that is compared goes through
//! [`normalize_text`] first: lower-cased, Arabic letter variants folded to a
//! canonical form, diacritics and tatweel dropped, separators collapsed.

use crate::config::LexiconConfig;
use std::collections::{HashMap, HashSet};

/// Arabic clitic prefixes, longest first
const CLITIC_PREFIXES: [&str; 10] = ["وال", "بال", "كال", "فال", "لل", "ال", "و", "ب", "ل", "ف"];

/// Normalize text for comparison.
///
/// - lower-cases
/// - folds أ إ آ ٱ to ا, ة to ه, ى to ي
/// - removes tatweel and harakat
/// - turns `_` and `-` into spaces and collapses whitespace
pub fn normalize_text(input: &str) -> String {
    let mut folded = String::with_capacity(input.len());
    for ch in input.chars().flat_map(char::to_lowercase) {
        match ch {
            'أ' | 'إ' | 'آ' | 'ٱ' => folded.push('ا'),
            'ة' => folded.push('ه'),
            'ى' => folded.push('ي'),
            'ـ' | '\u{064B}'..='\u{0652}' | '\u{0670}' => {}
            '_' | '-' => folded.push(' '),
            c => folded.push(c),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split already-normalized text into word tokens
pub fn word_tokens(normalized: &str) -> Vec<String> {
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Split a raw question into words, keeping each word's original spelling.
pub fn raw_words(question: &str) -> Vec<&str> {
    question
        .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation() || "،؛؟«»".contains(c))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Strip one Arabic clitic prefix (ال, و, ب, ...) if enough of the word remains.
pub fn strip_clitics(token: &str) -> Option<String> {
    for prefix in CLITIC_PREFIXES {
        if let Some(rest) = token.strip_prefix(prefix) {
            if rest.chars().count() >= 2 {
                return Some(rest.to_string());
            }
        }
    }
    None
}

/// Tokens of a column header: separators and camelCase boundaries split, then normalized.
pub fn name_tokens(name: &str) -> Vec<String> {
    let mut spaced = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for ch in name.chars() {
        if let Some(p) = prev {
            if p.is_lowercase() && ch.is_uppercase() {
                spaced.push(' ');
            }
        }
        spaced.push(ch);
        prev = Some(ch);
    }
    word_tokens(&normalize_text(&spaced))
}

/// A question after normalization, with its tokens
#[derive(Debug, Clone)]
pub struct NormalizedQuery {
    pub text: String,
    pub tokens: Vec<String>,
}

impl NormalizedQuery {
    pub fn new(question: &str) -> Self {
        let text = normalize_text(question);
        let tokens = word_tokens(&text);
        Self { text, tokens }
    }
}

/// A set of keywords matched against a normalized question.
///
/// Single words must match a whole token (or the token without its clitic
/// prefix); multi-word entries match as phrases.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    words: HashSet<String>,
    phrases: Vec<String>,
}

impl KeywordSet {
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut set = KeywordSet::default();
        for entry in entries {
            let normalized = normalize_text(entry.as_ref());
            if normalized.is_empty() {
                continue;
            }
            if normalized.contains(' ') {
                set.phrases.push(normalized);
            } else {
                set.words.insert(normalized);
            }
        }
        set
    }

    pub fn contains_word(&self, token: &str) -> bool {
        self.words.contains(token)
            || strip_clitics(token).map_or(false, |stripped| self.words.contains(&stripped))
    }

    pub fn matches(&self, query: &NormalizedQuery) -> bool {
        if query.tokens.iter().any(|t| self.contains_word(t)) {
            return true;
        }
        let padded = format!(" {} ", query.text);
        self.phrases
            .iter()
            .any(|phrase| padded.contains(&format!(" {} ", phrase)))
    }
}

/// Compiled form of [`LexiconConfig`]
#[derive(Debug, Clone)]
pub struct Lexicon {
    pub top: KeywordSet,
    pub bottom: KeywordSet,
    pub mean: KeywordSet,
    pub trend: KeywordSet,
    pub count: KeywordSet,
    pub daily: KeywordSet,
    money: Vec<String>,
    quantity: Vec<String>,
    identifier: Vec<String>,
    date: Vec<String>,
    entity: Vec<String>,
    stop: HashSet<String>,
    glossary: HashMap<String, Vec<String>>,
}

fn normalized_list(entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .map(|e| normalize_text(e))
        .filter(|e| !e.is_empty())
        .collect()
}

/// Does any header token carry `word`?
///
/// Short words (ids, codes) must equal a token; longer words may also sit
/// inside a compound token such as `totalsales`.
fn name_has_word(tokens: &[String], word: &str) -> bool {
    tokens.iter().any(|token| {
        token == word
            || strip_clitics(token).map_or(false, |s| s == word)
            || (word.chars().count() >= 4 && token.contains(word))
    })
}

impl Lexicon {
    pub fn from_config(config: &LexiconConfig) -> Self {
        let glossary = config
            .value_glossary
            .iter()
            .map(|(word, values)| (normalize_text(word), normalized_list(values)))
            .collect();

        Self {
            top: KeywordSet::new(&config.top_words),
            bottom: KeywordSet::new(&config.bottom_words),
            mean: KeywordSet::new(&config.mean_words),
            trend: KeywordSet::new(&config.trend_words),
            count: KeywordSet::new(&config.count_words),
            daily: KeywordSet::new(&config.daily_words),
            money: normalized_list(&config.money_words),
            quantity: normalized_list(&config.quantity_words),
            identifier: normalized_list(&config.identifier_words),
            date: normalized_list(&config.date_words),
            entity: normalized_list(&config.entity_words),
            stop: normalized_list(&config.stop_words).into_iter().collect(),
            glossary,
        }
    }

    /// Relevance of a numeric column as an aggregation target: 2 for money
    /// words, 1 for quantity words, 0 otherwise.
    pub fn relevance_score(&self, column_name: &str) -> u32 {
        let tokens = name_tokens(column_name);
        if self.money.iter().any(|w| name_has_word(&tokens, w)) {
            2
        } else if self.quantity.iter().any(|w| name_has_word(&tokens, w)) {
            1
        } else {
            0
        }
    }

    pub fn is_identifier_name(&self, column_name: &str) -> bool {
        let tokens = name_tokens(column_name);
        self.identifier.iter().any(|w| name_has_word(&tokens, w))
    }

    pub fn is_date_name(&self, column_name: &str) -> bool {
        let tokens = name_tokens(column_name);
        self.date.iter().any(|w| name_has_word(&tokens, w))
    }

    pub fn is_entity_name(&self, column_name: &str) -> bool {
        let tokens = name_tokens(column_name);
        self.entity.iter().any(|w| name_has_word(&tokens, w))
    }

    /// True for normalized tokens that drive the operator rather than name a value
    pub fn is_operator_word(&self, token: &str) -> bool {
        [&self.top, &self.bottom, &self.mean, &self.trend, &self.count]
            .iter()
            .any(|set| set.contains_word(token))
    }

    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop.contains(token)
    }

    /// Cell values a question word may stand for (e.g. الشمال -> north)
    pub fn glossary_values(&self, token: &str) -> Vec<&str> {
        let mut values: Vec<&str> = Vec::new();
        let stripped = strip_clitics(token);
        for key in std::iter::once(token).chain(stripped.as_deref()) {
            if let Some(found) = self.glossary.get(key) {
                values.extend(found.iter().map(String::as_str));
            }
        }
        values
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::from_config(&LexiconConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_arabic_variants() {
        assert_eq!(normalize_text("أفضل"), "افضل");
        assert_eq!(normalize_text("إجمالي"), normalize_text("اجمالي"));
        assert_eq!(normalize_text("كمية"), "كميه");
        assert_eq!(normalize_text("أدنى"), "ادني");
        assert_eq!(normalize_text("مُنتَج"), "منتج");
        assert_eq!(normalize_text("  Total_Price-USD "), "total price usd");
    }

    #[test]
    fn test_strip_clitics() {
        assert_eq!(strip_clitics("الشمال").as_deref(), Some("شمال"));
        assert_eq!(strip_clitics("والمبيعات").as_deref(), Some("مبيعات"));
        assert_eq!(strip_clitics("ال"), None);
        assert_eq!(strip_clitics("north"), None);
    }

    #[test]
    fn test_name_tokens_split_camel_case() {
        assert_eq!(name_tokens("ProductID"), vec!["product", "id"]);
        assert_eq!(name_tokens("sale_id"), vec!["sale", "id"]);
        assert_eq!(name_tokens("Product"), vec!["product"]);
    }

    #[test]
    fn test_keyword_set_matches_words_and_phrases() {
        let set = KeywordSet::new(&["top", "over time", "أفضل"]);
        assert!(set.matches(&NormalizedQuery::new("Top customers")));
        assert!(set.matches(&NormalizedQuery::new("sales over time")));
        assert!(set.matches(&NormalizedQuery::new("الأفضل مبيعا")));
        assert!(!set.matches(&NormalizedQuery::new("stop the count")));
    }

    #[test]
    fn test_relevance_score() {
        let lexicon = Lexicon::default();
        assert_eq!(lexicon.relevance_score("Sales"), 2);
        assert_eq!(lexicon.relevance_score("selling_price"), 2);
        assert_eq!(lexicon.relevance_score("quantity"), 1);
        assert_eq!(lexicon.relevance_score("الكمية"), 1);
        assert_eq!(lexicon.relevance_score("rating"), 0);
    }

    #[test]
    fn test_identifier_names() {
        let lexicon = Lexicon::default();
        assert!(lexicon.is_identifier_name("customer_id"));
        assert!(lexicon.is_identifier_name("ProductID"));
        assert!(lexicon.is_identifier_name("barcode"));
        assert!(!lexicon.is_identifier_name("Product"));
        assert!(!lexicon.is_identifier_name("paid"));
    }

    #[test]
    fn test_glossary_values_through_clitics() {
        let lexicon = Lexicon::default();
        assert_eq!(lexicon.glossary_values("الشمال"), vec!["north", "northern"]);
        assert!(lexicon.glossary_values("north").is_empty());
    }
}
