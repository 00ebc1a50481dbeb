//! Hierarchical matching of two administrative pyramids.
//!
//! A pyramid is a polars `DataFrame` with one row per leaf entity and every
//! ancestor level denormalized as `level_{n}_*` columns. `PyramidMatcher`
//! aligns a candidate pyramid onto a reference pyramid level by level and
//! returns matched rows plus the rows of each side that could not be matched.

pub mod assembler;
pub mod cascade;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod matcher;
pub mod pyramid;
pub mod pyramid_matcher;
pub mod schema;
pub mod unmatched;

pub use config::MatchConfig;
pub use error::{ErrorKind, PyramidError, Result};
pub use matcher::{ExactMatcher, FuzzyMatcher, FuzzyScorer, Matcher, MatcherKind};
pub use pyramid_matcher::{MatchOutputs, MatchSummary, PyramidMatcher};
pub use unmatched::UNMATCHED_LEVEL_COLUMN;
