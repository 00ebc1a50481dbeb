//! Pluggable similarity strategies.
//!
//! The cascade only ever sees `dyn Matcher`: a bounded score in `[0, 100]` and
//! an acceptance threshold. Concrete strategies live in the submodules.

pub mod exact;
pub mod fuzzy;

use crate::error::{PyramidError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

pub use exact::ExactMatcher;
pub use fuzzy::{FuzzyMatcher, FuzzyScorer};

/// Threshold used when the caller does not pick one.
pub const DEFAULT_THRESHOLD: f64 = 80.0;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// A similarity strategy with an acceptance threshold.
pub trait Matcher: Send + Sync {
    /// Human readable description, used in logs.
    fn name(&self) -> String;

    fn threshold(&self) -> f64;

    /// Similarity between a reference key and a candidate key, in `[0, 100]`.
    fn score(&self, reference: &str, candidate: &str) -> Result<f64>;

    fn accepts(&self, score: f64) -> bool {
        score >= self.threshold()
    }
}

/// Registered matcher strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    Fuzzy,
    Exact,
}

impl MatcherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherKind::Fuzzy => "fuzzy",
            MatcherKind::Exact => "exact",
        }
    }

    /// Build a boxed matcher of this kind. `scorer` only applies to `Fuzzy`.
    pub fn build(&self, scorer: FuzzyScorer, threshold: f64) -> Result<Box<dyn Matcher>> {
        Ok(match self {
            MatcherKind::Fuzzy => Box::new(FuzzyMatcher::with_scorer(threshold, scorer)?),
            MatcherKind::Exact => Box::new(ExactMatcher::new(threshold)?),
        })
    }
}

impl FromStr for MatcherKind {
    type Err = PyramidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fuzzy" => Ok(MatcherKind::Fuzzy),
            "exact" => Ok(MatcherKind::Exact),
            _ => Err(PyramidError::UnknownMatcher(s.to_string())),
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names accepted by `MatcherKind::from_str`.
pub fn available_matchers() -> Vec<&'static str> {
    vec![MatcherKind::Fuzzy.as_str(), MatcherKind::Exact.as_str()]
}

pub(crate) fn validate_threshold(threshold: f64) -> Result<f64> {
    if (0.0..=100.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(PyramidError::InvalidThreshold(threshold))
    }
}

/// Lowercase, collapse whitespace runs and trim.
pub fn normalize(s: &str) -> String {
    WHITESPACE.replace_all(&s.to_lowercase(), " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Haut   KATANGA "), "haut katanga");
        assert_eq!(normalize("\tKwilu\n"), "kwilu");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_matcher_kind_from_str() {
        assert_eq!("fuzzy".parse::<MatcherKind>().unwrap(), MatcherKind::Fuzzy);
        assert_eq!(" Exact ".parse::<MatcherKind>().unwrap(), MatcherKind::Exact);

        let err = "geometry".parse::<MatcherKind>().unwrap_err();
        assert!(matches!(err, PyramidError::UnknownMatcher(ref name) if name == "geometry"));
        assert!(err.to_string().contains("available: fuzzy, exact"));
    }

    #[test]
    fn test_available_matchers() {
        let names = available_matchers();
        assert!(names.contains(&"fuzzy"));
        assert!(names.contains(&"exact"));
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(100.0).is_ok());
        assert!(validate_threshold(-1.0).is_err());
        assert!(validate_threshold(100.5).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
    }

    #[test]
    fn test_build_boxed_matchers() {
        let fuzzy = MatcherKind::Fuzzy.build(FuzzyScorer::Ratio, 75.0).unwrap();
        assert_eq!(fuzzy.threshold(), 75.0);
        assert!(fuzzy.accepts(75.0));
        assert!(!fuzzy.accepts(74.9));

        let exact = MatcherKind::Exact.build(FuzzyScorer::Ratio, 100.0).unwrap();
        assert_eq!(exact.score("Kwilu", "KWILU").unwrap(), 100.0);
    }
}
