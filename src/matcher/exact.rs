use super::{normalize, validate_threshold, Matcher};
use crate::error::Result;
use std::fmt;

/// Scores 100 when normalized names are equal, 0 otherwise.
#[derive(Debug, Clone)]
pub struct ExactMatcher {
    threshold: f64,
}

impl ExactMatcher {
    pub fn new(threshold: f64) -> Result<Self> {
        Ok(Self {
            threshold: validate_threshold(threshold)?,
        })
    }
}

impl Matcher for ExactMatcher {
    fn name(&self) -> String {
        self.to_string()
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn score(&self, reference: &str, candidate: &str) -> Result<f64> {
        let reference = normalize(reference);
        if reference.is_empty() {
            return Ok(0.0);
        }
        Ok(if reference == normalize(candidate) { 100.0 } else { 0.0 })
    }
}

impl fmt::Display for ExactMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExactMatcher(threshold: {})", self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_scores() {
        let matcher = ExactMatcher::new(100.0).unwrap();
        assert_eq!(matcher.score("Bas Uele", "BAS  UELE").unwrap(), 100.0);
        assert_eq!(matcher.score("Bas Uele", "Haut Uele").unwrap(), 0.0);
        assert_eq!(matcher.score("", "").unwrap(), 0.0);
    }
}
