//! Cascading Match Engine
//!
//! Matches level 1 over the full cross product, then walks down one level at a
//! time. At level `k` a candidate entity is only compared with the children of
//! the reference entity its parent was matched to. A branch that fails at a
//! level is never tried deeper.
//!
//! Each candidate takes the reference with the highest accepted score. Ties go
//! to the reference with the lexicographically smallest key, so the result does
//! not depend on iteration order or on parallel execution.

use crate::error::{PyramidError, Result};
use crate::hierarchy::{EntityId, Hierarchy};
use crate::matcher::Matcher;
use crate::pyramid::Side;
use crate::schema::{LevelColumns, LevelSchema};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

/// An accepted (reference, candidate) pair at one level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelMatch {
    /// Index into `LevelSchema::levels`.
    pub depth: usize,
    pub reference: EntityId,
    pub candidate: EntityId,
    pub score: f64,
    /// More than one candidate entity was accepted against `reference`.
    pub repeated: bool,
    /// Position of the parent match in the previous level's matches.
    pub parent: Option<usize>,
}

/// A scored pair before the accept/reject decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPair {
    pub reference: EntityId,
    pub candidate: EntityId,
    pub score: f64,
    pub accepted: bool,
}

#[derive(Debug, Clone)]
pub struct LevelOutcome {
    pub level: u32,
    pub key_column: String,
    pub matches: Vec<LevelMatch>,
    pub pairs_scored: usize,
}

impl LevelOutcome {
    pub fn repeated_count(&self) -> usize {
        self.matches.iter().filter(|m| m.repeated).count()
    }
}

/// Accepted matches of every level that was reached, shallowest first.
#[derive(Debug, Clone, Default)]
pub struct CascadeOutcome {
    pub levels: Vec<LevelOutcome>,
}

impl CascadeOutcome {
    /// Chains of matches that reached level `depth` (the deepest common level),
    /// shallowest first.
    pub fn full_branches(&self, depth: usize) -> Vec<Vec<&LevelMatch>> {
        if depth == 0 || self.levels.len() != depth {
            return Vec::new();
        }

        self.levels[depth - 1]
            .matches
            .iter()
            .map(|leaf| {
                let mut branch = vec![leaf];
                let mut current = leaf;
                while let Some(parent) = current.parent {
                    current = &self.levels[current.depth - 1].matches[parent];
                    branch.push(current);
                }
                branch.reverse();
                branch
            })
            .collect()
    }

    /// Entities of one side that were accepted at each level.
    pub fn matched_entities(&self, side: Side) -> Vec<HashSet<EntityId>> {
        self.levels
            .iter()
            .map(|level| {
                level
                    .matches
                    .iter()
                    .map(|m| match side {
                        Side::Reference => m.reference,
                        Side::Candidate => m.candidate,
                    })
                    .collect()
            })
            .collect()
    }
}

pub struct CascadeEngine<'a> {
    matcher: &'a dyn Matcher,
    parallel: bool,
    deadline: Option<Instant>,
}

impl<'a> CascadeEngine<'a> {
    pub fn new(matcher: &'a dyn Matcher) -> Self {
        Self {
            matcher,
            parallel: false,
            deadline: None,
        }
    }

    /// Score candidates of a group on the rayon pool.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Checked before each level starts.
    pub fn deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn run(
        &self,
        schema: &LevelSchema,
        reference: &Hierarchy,
        candidate: &Hierarchy,
    ) -> Result<CascadeOutcome> {
        let mut outcome = CascadeOutcome::default();

        for (depth, level) in schema.levels.iter().enumerate() {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(PyramidError::DeadlineExceeded { level: level.level });
                }
            }

            info!("Matching level {} on {}", level.level, level.key_column);

            let groups: Vec<(Option<usize>, &[EntityId], &[EntityId])> = match outcome.levels.last() {
                None => vec![(None, reference.roots(), candidate.roots())],
                Some(previous) => previous
                    .matches
                    .iter()
                    .enumerate()
                    .map(|(idx, m)| {
                        (
                            Some(idx),
                            reference.children(m.reference),
                            candidate.children(m.candidate),
                        )
                    })
                    .collect(),
            };

            let mut matches = Vec::new();
            let mut pairs_scored = 0;
            for (parent, references, candidates) in groups {
                let scored = self.match_group(level, reference, candidate, references, candidates)?;
                pairs_scored += scored.pairs_scored;
                matches.extend(scored.accepted.into_iter().map(|pair| LevelMatch {
                    depth,
                    reference: pair.reference,
                    candidate: pair.candidate,
                    score: pair.score,
                    repeated: false,
                    parent,
                }));
            }

            flag_repeated(&mut matches);

            let level_outcome = LevelOutcome {
                level: level.level,
                key_column: level.key_column.clone(),
                matches,
                pairs_scored,
            };
            info!(
                "Level {}: {} matches ({} repeated) from {} scored pairs",
                level.level,
                level_outcome.matches.len(),
                level_outcome.repeated_count(),
                pairs_scored
            );
            outcome.levels.push(level_outcome);
        }

        Ok(outcome)
    }

    fn match_group(
        &self,
        level: &LevelColumns,
        reference: &Hierarchy,
        candidate: &Hierarchy,
        references: &[EntityId],
        candidates: &[EntityId],
    ) -> Result<GroupMatches> {
        let references: Vec<EntityId> = references
            .iter()
            .copied()
            .filter(|id| reference.entity(*id).is_matchable())
            .collect();
        let candidates: Vec<EntityId> = candidates
            .iter()
            .copied()
            .filter(|id| candidate.entity(*id).is_matchable())
            .collect();

        if references.is_empty() || candidates.is_empty() {
            return Ok(GroupMatches::default());
        }

        let best = |cand: &EntityId| {
            self.best_reference(level, reference, candidate, &references, *cand)
        };
        let selected: Vec<Option<ScoredPair>> = if self.parallel {
            candidates.par_iter().map(best).collect::<Result<Vec<_>>>()?
        } else {
            candidates.iter().map(best).collect::<Result<Vec<_>>>()?
        };

        Ok(GroupMatches {
            accepted: selected.into_iter().flatten().collect(),
            pairs_scored: references.len() * candidates.len(),
        })
    }

    /// Highest accepted reference for one candidate, or `None`.
    fn best_reference(
        &self,
        level: &LevelColumns,
        reference: &Hierarchy,
        candidate: &Hierarchy,
        references: &[EntityId],
        cand: EntityId,
    ) -> Result<Option<ScoredPair>> {
        let candidate_key = &candidate.entity(cand).key;
        let mut best: Option<ScoredPair> = None;

        for &refr in references {
            let reference_key = &reference.entity(refr).key;
            let pair = self.score_pair(level, reference_key, candidate_key, refr, cand)?;
            if !pair.accepted {
                continue;
            }
            let better = match &best {
                None => true,
                Some(current) => {
                    pair.score > current.score
                        || (pair.score == current.score
                            && *reference_key < reference.entity(current.reference).key)
                }
            };
            if better {
                best = Some(pair);
            }
        }

        if let Some(pair) = &best {
            debug!(
                "{}: '{}' -> '{}' ({:.1})",
                level.key_column,
                candidate_key,
                reference.entity(pair.reference).key,
                pair.score
            );
        }
        Ok(best)
    }

    fn score_pair(
        &self,
        level: &LevelColumns,
        reference_key: &str,
        candidate_key: &str,
        refr: EntityId,
        cand: EntityId,
    ) -> Result<ScoredPair> {
        let scoring_error = |message: String| PyramidError::Scoring {
            column: level.key_column.clone(),
            reference: reference_key.to_string(),
            candidate: candidate_key.to_string(),
            message,
        };

        let score = self
            .matcher
            .score(reference_key, candidate_key)
            .map_err(|e| scoring_error(e.to_string()))?;
        if !(0.0..=100.0).contains(&score) {
            return Err(scoring_error(format!("score {} outside [0, 100]", score)));
        }

        Ok(ScoredPair {
            reference: refr,
            candidate: cand,
            score,
            accepted: self.matcher.accepts(score),
        })
    }
}

#[derive(Debug, Default)]
struct GroupMatches {
    accepted: Vec<ScoredPair>,
    pairs_scored: usize,
}

/// Mark every match whose reference entity was accepted by more than one
/// distinct candidate entity at this level.
fn flag_repeated(matches: &mut [LevelMatch]) {
    let mut per_reference: HashMap<EntityId, HashSet<EntityId>> = HashMap::new();
    for m in matches.iter() {
        per_reference.entry(m.reference).or_default().insert(m.candidate);
    }
    for m in matches.iter_mut() {
        m.repeated = per_reference
            .get(&m.reference)
            .is_some_and(|candidates| candidates.len() > 1);
    }
}
