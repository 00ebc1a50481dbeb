use crate::assembler::{assemble, SideInput};
use crate::cascade::{CascadeEngine, CascadeOutcome};
use crate::config::MatchConfig;
use crate::error::Result;
use crate::hierarchy::Hierarchy;
use crate::matcher::{FuzzyMatcher, Matcher};
use crate::pyramid::{Pyramid, Side};
use crate::schema::{LevelSchema, DEFAULT_MATCHING_SUFFIX};
use crate::unmatched::collect_unmatched;
use polars::prelude::*;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

/// Hierarchical matching of a candidate pyramid onto a reference pyramid.
///
/// Levels are matched top-down. A candidate entity at level `n` is only
/// compared with references under the entity its level `n - 1` parent was
/// matched to. Each run is a pure function of the two tables and the settings
/// held here.
pub struct PyramidMatcher {
    matcher: Box<dyn Matcher>,
    levels_to_match: Option<Vec<u32>>,
    matching_col_suffix: String,
    parallel: bool,
    deadline: Option<Duration>,
}

impl Default for PyramidMatcher {
    fn default() -> Self {
        Self::with_default_matcher()
    }
}

impl PyramidMatcher {
    pub fn new(matcher: Box<dyn Matcher>) -> Self {
        Self {
            matcher,
            levels_to_match: None,
            matching_col_suffix: DEFAULT_MATCHING_SUFFIX.to_string(),
            parallel: false,
            deadline: None,
        }
    }

    /// `FuzzyMatcher` with the `ratio` scorer and a threshold of 80.
    pub fn with_default_matcher() -> Self {
        Self::new(Box::new(FuzzyMatcher::default()))
    }

    pub fn from_config(config: &MatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.build_matcher()?)
            .with_matching_suffix(&config.matching_col_suffix)
            .with_levels(config.levels_to_match.clone())
            .with_parallel(config.parallel)
            .with_deadline(config.deadline()))
    }

    pub fn with_levels(mut self, levels: Option<Vec<u32>>) -> Self {
        self.levels_to_match = levels;
        self
    }

    pub fn with_matching_suffix(mut self, suffix: &str) -> Self {
        self.matching_col_suffix = suffix.to_string();
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn matcher(&self) -> &dyn Matcher {
        self.matcher.as_ref()
    }

    /// Match `candidate` onto `reference` and build the four output tables.
    pub fn run_matching(&self, reference: &DataFrame, candidate: &DataFrame) -> Result<MatchOutputs> {
        let deadline = self.deadline.map(|d| Instant::now() + d);

        let reference = Pyramid::new(Side::Reference, reference)?;
        let candidate = Pyramid::new(Side::Candidate, candidate)?;
        let schema = LevelSchema::resolve(
            &reference,
            &candidate,
            &self.matching_col_suffix,
            self.levels_to_match.as_deref(),
        )?;
        info!("Detected levels to match: {:?}", schema.level_numbers());

        let reference_hierarchy = Hierarchy::build(&reference, &schema)?;
        let candidate_hierarchy = Hierarchy::build(&candidate, &schema)?;
        info!(
            "Indexed {} reference and {} candidate entities",
            reference_hierarchy.entity_count(),
            candidate_hierarchy.entity_count()
        );

        info!("Using matcher: {}", self.matcher.name());
        let outcome = CascadeEngine::new(self.matcher.as_ref())
            .parallel(self.parallel)
            .deadline(deadline)
            .run(&schema, &reference_hierarchy, &candidate_hierarchy)?;

        let tables = assemble(
            &schema,
            SideInput {
                pyramid: &reference,
                hierarchy: &reference_hierarchy,
            },
            SideInput {
                pyramid: &candidate,
                hierarchy: &candidate_hierarchy,
            },
            &outcome,
        )?;
        let reference_not_matched =
            collect_unmatched(&schema, &reference, &reference_hierarchy, &outcome)?;
        let candidate_not_matched =
            collect_unmatched(&schema, &candidate, &candidate_hierarchy, &outcome)?;

        let summary = MatchSummary {
            matcher: self.matcher.name(),
            levels: summarize_levels(&outcome),
            reference_rows: reference.height(),
            candidate_rows: candidate.height(),
            matched_rows: tables.matched_data.height(),
            reference_not_matched: reference_not_matched.height(),
            candidate_not_matched: candidate_not_matched.height(),
        };
        info!(
            "Matched {} branches; {} reference and {} candidate rows not matched",
            summary.matched_rows, summary.reference_not_matched, summary.candidate_not_matched
        );

        Ok(MatchOutputs {
            matched_data: tables.matched_data,
            matched_data_simplified: tables.matched_data_simplified,
            reference_not_matched,
            candidate_not_matched,
            summary,
        })
    }
}

/// The four result tables of a run.
#[derive(Debug, Clone)]
pub struct MatchOutputs {
    pub matched_data: DataFrame,
    pub matched_data_simplified: DataFrame,
    pub reference_not_matched: DataFrame,
    pub candidate_not_matched: DataFrame,
    pub summary: MatchSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelSummary {
    pub level: u32,
    pub key_column: String,
    pub matches: usize,
    pub repeated: usize,
    pub pairs_scored: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchSummary {
    pub matcher: String,
    pub levels: Vec<LevelSummary>,
    pub reference_rows: usize,
    pub candidate_rows: usize,
    pub matched_rows: usize,
    pub reference_not_matched: usize,
    pub candidate_not_matched: usize,
}

impl fmt::Display for MatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matcher: {}", self.matcher)?;
        for level in &self.levels {
            writeln!(
                f,
                "  {}: {} matches, {} repeated, {} pairs scored",
                level.key_column, level.matches, level.repeated, level.pairs_scored
            )?;
        }
        writeln!(f, "Matched branches: {}", self.matched_rows)?;
        writeln!(
            f,
            "Reference not matched: {} of {}",
            self.reference_not_matched, self.reference_rows
        )?;
        write!(
            f,
            "Candidate not matched: {} of {}",
            self.candidate_not_matched, self.candidate_rows
        )
    }
}

fn summarize_levels(outcome: &CascadeOutcome) -> Vec<LevelSummary> {
    outcome
        .levels
        .iter()
        .map(|level| LevelSummary {
            level: level.level,
            key_column: level.key_column.clone(),
            matches: level.matches.len(),
            repeated: level.repeated_count(),
            pairs_scored: level.pairs_scored,
        })
        .collect()
}
