use super::{normalize, validate_threshold, Matcher, DEFAULT_THRESHOLD};
use crate::error::{PyramidError, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use strsim::{jaro_winkler, levenshtein};

/// Scoring function applied to normalized strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FuzzyScorer {
    /// `100 * (1 - levenshtein / max_len)`
    #[default]
    Ratio,
    /// Best `Ratio` of the shorter string against same-length windows of the longer one.
    PartialRatio,
    /// `Ratio` after sorting whitespace separated tokens.
    TokenSortRatio,
    /// `Ratio` over the shared and unshared token sets.
    TokenSetRatio,
    /// Weighted best of the ratio, partial and token scorers, scaled down by
    /// how unequal the two lengths are.
    WRatio,
    JaroWinkler,
}

impl FuzzyScorer {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuzzyScorer::Ratio => "ratio",
            FuzzyScorer::PartialRatio => "partial_ratio",
            FuzzyScorer::TokenSortRatio => "token_sort_ratio",
            FuzzyScorer::TokenSetRatio => "token_set_ratio",
            FuzzyScorer::WRatio => "wratio",
            FuzzyScorer::JaroWinkler => "jaro_winkler",
        }
    }

    fn apply(&self, a: &str, b: &str) -> f64 {
        match self {
            FuzzyScorer::Ratio => ratio(a, b),
            FuzzyScorer::PartialRatio => partial_ratio(a, b),
            FuzzyScorer::TokenSortRatio => token_sort_ratio(a, b),
            FuzzyScorer::TokenSetRatio => token_set_ratio(a, b),
            FuzzyScorer::WRatio => wratio(a, b),
            FuzzyScorer::JaroWinkler => 100.0 * jaro_winkler(a, b),
        }
    }
}

impl FromStr for FuzzyScorer {
    type Err = PyramidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ratio" | "levenshtein" => Ok(FuzzyScorer::Ratio),
            "partial_ratio" => Ok(FuzzyScorer::PartialRatio),
            "token_sort_ratio" => Ok(FuzzyScorer::TokenSortRatio),
            "token_set_ratio" => Ok(FuzzyScorer::TokenSetRatio),
            "wratio" | "w_ratio" => Ok(FuzzyScorer::WRatio),
            "jaro_winkler" => Ok(FuzzyScorer::JaroWinkler),
            _ => Err(PyramidError::UnknownScorer(s.to_string())),
        }
    }
}

impl fmt::Display for FuzzyScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edit-distance matcher over case and whitespace normalized names.
///
/// A pair is accepted when its score is at least the threshold. With a
/// threshold of 0 every pair of non-empty names is accepted, even at score 0.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    threshold: f64,
    scorer: FuzzyScorer,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            scorer: FuzzyScorer::default(),
        }
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Result<Self> {
        Self::with_scorer(threshold, FuzzyScorer::default())
    }

    pub fn with_scorer(threshold: f64, scorer: FuzzyScorer) -> Result<Self> {
        Ok(Self {
            threshold: validate_threshold(threshold)?,
            scorer,
        })
    }

    pub fn scorer(&self) -> FuzzyScorer {
        self.scorer
    }

    /// Score two raw strings. Empty strings after normalization score 0.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let a = normalize(a);
        let b = normalize(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        self.scorer.apply(&a, &b).clamp(0.0, 100.0)
    }
}

impl Matcher for FuzzyMatcher {
    fn name(&self) -> String {
        self.to_string()
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn score(&self, reference: &str, candidate: &str) -> Result<f64> {
        Ok(self.similarity(reference, candidate))
    }
}

impl fmt::Display for FuzzyMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FuzzyMatcher(scorer: {}, threshold: {})", self.scorer, self.threshold)
    }
}

fn ratio(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    100.0 * (1.0 - levenshtein(a, b) as f64 / max_len as f64)
}

fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long): (Vec<char>, Vec<char>) = if a.chars().count() <= b.chars().count() {
        (a.chars().collect(), b.chars().collect())
    } else {
        (b.chars().collect(), a.chars().collect())
    };
    if short.is_empty() {
        return 0.0;
    }

    let short: String = short.into_iter().collect();
    let width = short.chars().count();
    let mut best = 0.0_f64;
    for start in 0..=(long.len() - width) {
        let window: String = long[start..start + width].iter().collect();
        best = best.max(ratio(&short, &window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    let shared = join_tokens(tokens_a.intersection(&tokens_b).copied());
    let only_a = join_tokens(tokens_a.difference(&tokens_b).copied());
    let only_b = join_tokens(tokens_b.difference(&tokens_a).copied());

    let combined_a = join_tokens([shared.as_str(), only_a.as_str()].into_iter());
    let combined_b = join_tokens([shared.as_str(), only_b.as_str()].into_iter());

    ratio(&shared, &combined_a)
        .max(ratio(&shared, &combined_b))
        .max(ratio(&combined_a, &combined_b))
}

/// Token and partial variants are discounted: the partial ones more so when one
/// name is much longer than the other.
fn wratio(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }

    const TOKEN_SCALE: f64 = 0.95;
    let len_ratio = len_a.max(len_b) as f64 / len_a.min(len_b) as f64;
    let best = ratio(a, b);

    if len_ratio < 1.5 {
        let token = token_sort_ratio(a, b).max(token_set_ratio(a, b));
        return best.max(token * TOKEN_SCALE);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    best.max(partial_ratio(a, b) * partial_scale)
        .max(partial_token_ratio(a, b) * TOKEN_SCALE * partial_scale)
}

fn partial_token_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_subset(&tokens_b) || tokens_b.is_subset(&tokens_a) {
        return 100.0;
    }

    let only_a = join_tokens(tokens_a.difference(&tokens_b).copied());
    let only_b = join_tokens(tokens_b.difference(&tokens_a).copied());
    partial_ratio(&sorted_tokens(a), &sorted_tokens(b)).max(partial_ratio(&only_a, &only_b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn join_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> String {
    tokens.filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ")
}
