use crate::config::SimilarityKind;
use crate::lexicon::normalize_text;
use strsim::{jaro_winkler, normalized_levenshtein};

/// String similarity behind a narrow interface so the algorithm can be swapped.
///
/// Scores are in 0.0..=1.0 (higher = more similar). Inputs are compared as
/// given; callers normalize first.
pub trait Similarity: Send + Sync {
    fn ratio(&self, a: &str, b: &str) -> f64;

    /// Best ratio of `needle` against any same-length window of `haystack`.
    ///
    /// An exact substring always scores 1.0.
    fn partial_ratio(&self, needle: &str, haystack: &str) -> f64 {
        if needle.is_empty() || haystack.is_empty() {
            return 0.0;
        }
        if haystack.contains(needle) {
            return 1.0;
        }
        let hay: Vec<char> = haystack.chars().collect();
        let width = needle.chars().count();
        if width >= hay.len() {
            return self.ratio(needle, haystack);
        }
        hay.windows(width)
            .map(|window| {
                let candidate: String = window.iter().collect();
                self.ratio(needle, &candidate)
            })
            .fold(0.0, f64::max)
    }
}

/// Normalized Levenshtein ratio
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinRatio;

impl Similarity for LevenshteinRatio {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        normalized_levenshtein(a, b)
    }
}

/// Jaro-Winkler similarity, kinder to shared prefixes (name variations)
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl Similarity for JaroWinkler {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        jaro_winkler(a, b)
    }
}

pub fn similarity_for(kind: SimilarityKind) -> Box<dyn Similarity> {
    match kind {
        SimilarityKind::Levenshtein => Box::new(LevenshteinRatio),
        SimilarityKind::JaroWinkler => Box::new(JaroWinkler),
    }
}

/// Fuzzy matcher for column names and cell values
pub struct FuzzyMatcher {
    /// Similarity threshold (0.0-1.0) for considering two strings as matches
    pub similarity_threshold: f64,
    similarity: Box<dyn Similarity>,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85, // 85% similarity threshold
            similarity: Box::new(LevenshteinRatio),
        }
    }
}

impl std::fmt::Debug for FuzzyMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuzzyMatcher")
            .field("similarity_threshold", &self.similarity_threshold)
            .finish()
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            similarity_threshold: threshold,
            ..Self::default()
        }
    }

    pub fn with_similarity(threshold: f64, similarity: Box<dyn Similarity>) -> Self {
        Self {
            similarity_threshold: threshold,
            similarity,
        }
    }

    /// Normalize a string for fuzzy matching
    pub fn normalize_string(&self, s: &str) -> String {
        normalize_text(s)
    }

    /// Similarity of two strings after normalization
    pub fn similarity(&self, s1: &str, s2: &str) -> f64 {
        let norm1 = self.normalize_string(s1);
        let norm2 = self.normalize_string(s2);
        if norm1 == norm2 {
            return 1.0;
        }
        self.similarity.ratio(&norm1, &norm2)
    }

    /// Check if two strings are similar enough to be considered a match
    pub fn is_match(&self, s1: &str, s2: &str) -> bool {
        self.similarity(s1, s2) >= self.similarity_threshold
    }

    /// Score for `phrase` (e.g. a column header) appearing somewhere inside `text`
    pub fn mention_score(&self, phrase: &str, text: &str) -> f64 {
        let phrase = self.normalize_string(phrase);
        let text = self.normalize_string(text);
        self.similarity.partial_ratio(&phrase, &text)
    }

    /// Is `phrase` mentioned in `text`, exactly or above the threshold?
    pub fn mentions(&self, phrase: &str, text: &str) -> bool {
        self.mention_score(phrase, text) >= self.similarity_threshold
    }

    /// Find the best matching candidate for an already-normalized `target`.
    ///
    /// Returns (candidate index, score) when the best score clears the
    /// threshold; ties keep the earliest candidate.
    pub fn find_best_match<'a, I>(&self, target: &str, candidates: I) -> Option<(usize, f64)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut best: Option<(usize, f64)> = None;
        for (idx, candidate) in candidates.into_iter().enumerate() {
            let score = if candidate == target {
                1.0
            } else {
                self.similarity.ratio(target, candidate)
            };
            if score < self.similarity_threshold {
                continue;
            }
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((idx, score));
            }
        }
        best
    }
}
