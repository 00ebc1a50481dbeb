use crate::error::Result;
use crate::matcher::{FuzzyScorer, Matcher, MatcherKind, DEFAULT_THRESHOLD};
use crate::schema::{validate_suffix, DEFAULT_MATCHING_SUFFIX};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one matching run, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Matcher strategy name, see `matcher::available_matchers`.
    pub matcher: String,
    /// Fuzzy scorer name; ignored by non-fuzzy matchers.
    pub scorer: String,
    pub threshold: f64,
    pub matching_col_suffix: String,
    /// Restrict matching to these levels; all common levels when absent.
    pub levels_to_match: Option<Vec<u32>>,
    pub parallel: bool,
    pub deadline_ms: Option<u64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherKind::Fuzzy.as_str().to_string(),
            scorer: FuzzyScorer::Ratio.as_str().to_string(),
            threshold: DEFAULT_THRESHOLD,
            matching_col_suffix: DEFAULT_MATCHING_SUFFIX.to_string(),
            levels_to_match: None,
            parallel: false,
            deadline_ms: None,
        }
    }
}

impl MatchConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: MatchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.build_matcher()?;
        validate_suffix(&self.matching_col_suffix)
    }

    pub fn build_matcher(&self) -> Result<Box<dyn Matcher>> {
        let kind: MatcherKind = self.matcher.parse()?;
        let scorer: FuzzyScorer = self.scorer.parse()?;
        kind.build(scorer, self.threshold)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, PyramidError};

    #[test]
    fn test_defaults() {
        let config = MatchConfig::default();
        assert_eq!(config.threshold, 80.0);
        assert_eq!(config.matching_col_suffix, "_name");
        assert!(config.validate().is_ok());
        assert!(config.build_matcher().unwrap().name().contains("FuzzyMatcher"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MatchConfig::from_json_str(
            r#"{"threshold": 90, "levels_to_match": [2, 3], "deadline_ms": 1500}"#,
        )
        .unwrap();
        assert_eq!(config.threshold, 90.0);
        assert_eq!(config.matcher, "fuzzy");
        assert_eq!(config.levels_to_match, Some(vec![2, 3]));
        assert_eq!(config.deadline(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_wratio_scorer_selectable() {
        let config = MatchConfig::from_json_str(r#"{"scorer": "wratio"}"#).unwrap();
        let matcher = config.build_matcher().unwrap();
        assert!(matcher.name().contains("wratio"));
        assert!(matcher.accepts(matcher.score("Province 1", "Province 1 bis").unwrap()));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for json in [
            r#"{"threshold": 101}"#,
            r#"{"matcher": "transformer"}"#,
            r#"{"scorer": "soundex"}"#,
            r#"{"matching_col_suffix": "name"}"#,
            r#"{"threshold": "high"}"#,
        ] {
            let err = MatchConfig::from_json_str(json).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "{}", json);
        }

        assert!(matches!(
            MatchConfig::from_json_str(r#"{"threshold": -5}"#),
            Err(PyramidError::InvalidThreshold(_))
        ));
    }
}
