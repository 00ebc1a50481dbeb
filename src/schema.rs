//! Level Schema Resolver
//!
//! Works out which `level_{n}` tiers both pyramids can be matched on and which
//! attribute columns ride along with each of them.

use crate::error::{PyramidError, Result};
use crate::pyramid::{Pyramid, Side};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

pub const LEVEL_PREFIX: &str = "level_";
pub const DEFAULT_MATCHING_SUFFIX: &str = "_name";

/// Columns attached to one common level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelColumns {
    pub level: u32,
    /// `level_{n}{suffix}`, present on both sides.
    pub key_column: String,
    pub reference_attributes: Vec<String>,
    pub candidate_attributes: Vec<String>,
}

impl LevelColumns {
    pub fn attributes(&self, side: Side) -> &[String] {
        match side {
            Side::Reference => &self.reference_attributes,
            Side::Candidate => &self.candidate_attributes,
        }
    }
}

/// Ordered common levels, shallowest first.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSchema {
    pub suffix: String,
    pub levels: Vec<LevelColumns>,
}

impl LevelSchema {
    pub fn resolve(
        reference: &Pyramid,
        candidate: &Pyramid,
        suffix: &str,
        requested: Option<&[u32]>,
    ) -> Result<Self> {
        validate_suffix(suffix)?;

        let reference_levels = scan_side(reference, suffix)?;
        let candidate_levels = scan_side(candidate, suffix)?;

        let keyed = |levels: &BTreeMap<u32, SideLevel>| -> BTreeSet<u32> {
            levels
                .iter()
                .filter(|(_, l)| l.has_key)
                .map(|(n, _)| *n)
                .collect()
        };
        let reference_keyed = keyed(&reference_levels);
        let candidate_keyed = keyed(&candidate_levels);

        for level in reference_keyed.symmetric_difference(&candidate_keyed) {
            debug!(
                "Ignoring {}: only one pyramid has it",
                key_column(*level, suffix)
            );
        }

        let mut common: BTreeSet<u32> = reference_keyed
            .intersection(&candidate_keyed)
            .copied()
            .collect();

        if let Some(requested) = requested {
            let requested: BTreeSet<u32> = requested.iter().copied().collect();
            let missing = requested.difference(&common).map(|l| key_column(*l, suffix)).join(", ");
            if !missing.is_empty() {
                warn!("Requested levels not present in both pyramids: {}", missing);
            }
            common = common.intersection(&requested).copied().collect();
        }

        if common.is_empty() {
            return Err(PyramidError::NoCommonLevels {
                suffix: suffix.to_string(),
            });
        }

        let attributes = |levels: &BTreeMap<u32, SideLevel>, level: u32| -> Vec<String> {
            levels
                .get(&level)
                .map(|l| l.attributes.clone())
                .unwrap_or_default()
        };

        let levels = common
            .into_iter()
            .map(|level| LevelColumns {
                level,
                key_column: key_column(level, suffix),
                reference_attributes: attributes(&reference_levels, level),
                candidate_attributes: attributes(&candidate_levels, level),
            })
            .collect();

        Ok(Self {
            suffix: suffix.to_string(),
            levels,
        })
    }

    pub fn level_numbers(&self) -> Vec<u32> {
        self.levels.iter().map(|l| l.level).collect()
    }
}

pub fn key_column(level: u32, suffix: &str) -> String {
    format!("{}{}{}", LEVEL_PREFIX, level, suffix)
}

pub fn validate_suffix(suffix: &str) -> Result<()> {
    if suffix.len() > 1 && suffix.starts_with('_') {
        Ok(())
    } else {
        Err(PyramidError::InvalidSuffix(suffix.to_string()))
    }
}

/// Level number of a `level_{n}_...` column, `None` for non-level columns.
pub fn parse_level(column: &str) -> Result<Option<u32>> {
    let Some(rest) = column.strip_prefix(LEVEL_PREFIX) else {
        return Ok(None);
    };

    let malformed = || PyramidError::MalformedLevelColumn {
        column: column.to_string(),
    };

    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let tail = &rest[digits.len()..];
    if digits.is_empty() || tail.len() < 2 || !tail.starts_with('_') {
        return Err(malformed());
    }

    match digits.parse::<u32>() {
        Ok(level) if level >= 1 => Ok(Some(level)),
        _ => Err(malformed()),
    }
}

#[derive(Debug, Default)]
struct SideLevel {
    has_key: bool,
    attributes: Vec<String>,
}

fn scan_side(pyramid: &Pyramid, suffix: &str) -> Result<BTreeMap<u32, SideLevel>> {
    let mut levels: BTreeMap<u32, SideLevel> = BTreeMap::new();
    for column in pyramid.column_names() {
        let Some(level) = parse_level(&column)? else {
            continue;
        };
        let entry = levels.entry(level).or_default();
        if column == key_column(level, suffix) {
            entry.has_key = true;
        } else {
            entry.attributes.push(column);
        }
    }

    for (level, side_level) in levels.iter_mut() {
        if !side_level.has_key && !side_level.attributes.is_empty() {
            warn!(
                "Dropping {} pyramid columns [{}]: no {} column",
                pyramid.side(),
                side_level.attributes.join(", "),
                key_column(*level, suffix)
            );
            side_level.attributes.clear();
        }
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn pyramid(side: Side, frame: DataFrame) -> Pyramid {
        Pyramid::new(side, &frame).unwrap()
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("level_2_name").unwrap(), Some(2));
        assert_eq!(parse_level("level_12_id").unwrap(), Some(12));
        assert_eq!(parse_level("population").unwrap(), None);
        assert!(parse_level("level_x_name").is_err());
        assert!(parse_level("level_0_name").is_err());
        assert!(parse_level("level_3").is_err());
        assert!(parse_level("level_3_").is_err());
    }

    #[test]
    fn test_resolve_common_levels_and_attributes() {
        let reference = pyramid(
            Side::Reference,
            df! [
                "level_1_name" => ["RDC"],
                "level_2_name" => ["Kwilu"],
                "level_2_id" => ["abc"],
                "level_3_name" => ["Bulungu"]
            ]
            .unwrap(),
        );
        let candidate = pyramid(
            Side::Candidate,
            df! [
                "level_2_name" => ["KWILU"],
                "level_2_geometry" => ["POINT(1 2)"],
                "level_3_name" => ["Bulungu"],
                "level_3_id" => [7i64],
                "population" => [1000i64]
            ]
            .unwrap(),
        );

        let schema = LevelSchema::resolve(&reference, &candidate, "_name", None).unwrap();
        assert_eq!(schema.level_numbers(), vec![2, 3]);

        let level_2 = &schema.levels[0];
        assert_eq!(level_2.key_column, "level_2_name");
        assert_eq!(level_2.reference_attributes, vec!["level_2_id".to_string()]);
        assert_eq!(level_2.candidate_attributes, vec!["level_2_geometry".to_string()]);

        let level_3 = &schema.levels[1];
        assert!(level_3.reference_attributes.is_empty());
        assert_eq!(level_3.candidate_attributes, vec!["level_3_id".to_string()]);
    }

    #[test]
    fn test_requested_levels_intersected() {
        let frame = df! [
            "level_1_name" => ["A"],
            "level_2_name" => ["B"]
        ]
        .unwrap();
        let reference = pyramid(Side::Reference, frame.clone());
        let candidate = pyramid(Side::Candidate, frame);

        let schema = LevelSchema::resolve(&reference, &candidate, "_name", Some(&[2, 5][..])).unwrap();
        assert_eq!(schema.level_numbers(), vec![2]);

        let err = LevelSchema::resolve(&reference, &candidate, "_name", Some(&[5][..])).unwrap_err();
        assert!(matches!(err, PyramidError::NoCommonLevels { .. }));
    }

    #[test]
    fn test_attribute_without_key_dropped() {
        let reference = pyramid(
            Side::Reference,
            df! [
                "level_1_name" => ["A"],
                "level_2_id" => ["x"]
            ]
            .unwrap(),
        );
        let candidate = pyramid(
            Side::Candidate,
            df! [
                "level_1_name" => ["A"],
                "level_2_name" => ["B"]
            ]
            .unwrap(),
        );

        let schema = LevelSchema::resolve(&reference, &candidate, "_name", None).unwrap();
        assert_eq!(schema.level_numbers(), vec![1]);
        assert!(schema.levels[0].reference_attributes.is_empty());
    }

    #[test]
    fn test_no_common_levels() {
        let reference = pyramid(Side::Reference, df! ["level_1_name" => ["A"]].unwrap());
        let candidate = pyramid(Side::Candidate, df! ["level_2_name" => ["A"]].unwrap());

        let err = LevelSchema::resolve(&reference, &candidate, "_name", None).unwrap_err();
        assert!(matches!(err, PyramidError::NoCommonLevels { ref suffix } if suffix == "_name"));
    }

    #[test]
    fn test_malformed_column_fails() {
        let reference = pyramid(
            Side::Reference,
            df! [
                "level_1_name" => ["A"],
                "level_one_id" => ["x"]
            ]
            .unwrap(),
        );
        let candidate = pyramid(Side::Candidate, df! ["level_1_name" => ["A"]].unwrap());

        let err = LevelSchema::resolve(&reference, &candidate, "_name", None).unwrap_err();
        assert!(matches!(err, PyramidError::MalformedLevelColumn { ref column } if column == "level_one_id"));
    }

    #[test]
    fn test_custom_suffix() {
        let frame = df! [
            "level_1_code" => ["CD"],
            "level_1_name" => ["Congo"]
        ]
        .unwrap();
        let reference = pyramid(Side::Reference, frame.clone());
        let candidate = pyramid(Side::Candidate, frame);

        let schema = LevelSchema::resolve(&reference, &candidate, "_code", None).unwrap();
        assert_eq!(schema.levels[0].key_column, "level_1_code");
        assert_eq!(schema.levels[0].reference_attributes, vec!["level_1_name".to_string()]);

        assert!(LevelSchema::resolve(&reference, &candidate, "code", None).is_err());
    }
}
