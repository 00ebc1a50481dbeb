//! Match Assembler
//!
//! Turns full cascade branches into `matched_data` (attributes of both sides,
//! per-level score and repeated flag) and `matched_data_simplified` (the same
//! rows without the score and repeated columns).

use crate::cascade::{CascadeOutcome, LevelMatch};
use crate::error::Result;
use crate::hierarchy::{EntityId, Hierarchy};
use crate::pyramid::{Pyramid, Side};
use crate::schema::LevelSchema;
use polars::prelude::*;

pub fn score_column(level: u32) -> String {
    format!("score_level_{}", level)
}

pub fn repeated_column(level: u32) -> String {
    format!("repeated_level_{}", level)
}

#[derive(Debug, Clone)]
pub struct MatchedTables {
    pub matched_data: DataFrame,
    pub matched_data_simplified: DataFrame,
}

/// Input for one side of the join.
pub struct SideInput<'a> {
    pub pyramid: &'a Pyramid,
    pub hierarchy: &'a Hierarchy,
}

pub fn assemble(
    schema: &LevelSchema,
    reference: SideInput<'_>,
    candidate: SideInput<'_>,
    outcome: &CascadeOutcome,
) -> Result<MatchedTables> {
    let branches = outcome.full_branches(schema.levels.len());

    let reference_rows = branch_rows(&branches, &reference, |m| m.reference);
    let candidate_rows = branch_rows(&branches, &candidate, |m| m.candidate);

    let mut full: Vec<Series> = Vec::new();
    let mut simplified: Vec<Series> = Vec::new();

    for (depth, level) in schema.levels.iter().enumerate() {
        for (side, input, rows) in [
            (Side::Reference, &reference, &reference_rows),
            (Side::Candidate, &candidate, &candidate_rows),
        ] {
            let columns = std::iter::once(&level.key_column).chain(level.attributes(side));
            for column in columns {
                let mut series = input.pyramid.frame().column(column)?.take(rows)?;
                series.rename(&side.output_column(column));
                full.push(series.clone());
                simplified.push(series);
            }
        }

        let scores: Vec<f64> = branches.iter().map(|b| b[depth].score).collect();
        let repeated: Vec<bool> = branches.iter().map(|b| b[depth].repeated).collect();
        full.push(Series::new(&score_column(level.level), scores));
        full.push(Series::new(&repeated_column(level.level), repeated));
    }

    Ok(MatchedTables {
        matched_data: DataFrame::new(full)?,
        matched_data_simplified: DataFrame::new(simplified)?,
    })
}

/// Row of the deepest entity of each branch; it carries every ancestor's columns.
fn branch_rows(
    branches: &[Vec<&LevelMatch>],
    input: &SideInput<'_>,
    entity_of: impl Fn(&LevelMatch) -> EntityId,
) -> IdxCa {
    let rows: Vec<IdxSize> = branches
        .iter()
        .filter_map(|branch| branch.last())
        .map(|leaf| input.hierarchy.entity(entity_of(leaf)).first_row as IdxSize)
        .collect();
    IdxCa::from_vec("rows", rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::CascadeEngine;
    use crate::matcher::FuzzyMatcher;

    #[test]
    fn test_assemble_columns_and_values() {
        let reference = Pyramid::new(
            Side::Reference,
            &df! [
                "level_1_name" => ["Kwilu", "Kwilu"],
                "level_1_id" => [100i64, 100],
                "level_2_name" => ["Bulungu", "Kikwit"],
                "level_2_id" => [200i64, 201]
            ]
            .unwrap(),
        )
        .unwrap();
        let candidate = Pyramid::new(
            Side::Candidate,
            &df! [
                "level_1_name" => ["KWILU"],
                "level_2_name" => ["Kikwit"],
                "level_2_uid" => ["x9"]
            ]
            .unwrap(),
        )
        .unwrap();

        let schema = LevelSchema::resolve(&reference, &candidate, "_name", None).unwrap();
        let reference_hierarchy = Hierarchy::build(&reference, &schema).unwrap();
        let candidate_hierarchy = Hierarchy::build(&candidate, &schema).unwrap();
        let matcher = FuzzyMatcher::new(80.0).unwrap();
        let outcome = CascadeEngine::new(&matcher)
            .run(&schema, &reference_hierarchy, &candidate_hierarchy)
            .unwrap();

        let tables = assemble(
            &schema,
            SideInput { pyramid: &reference, hierarchy: &reference_hierarchy },
            SideInput { pyramid: &candidate, hierarchy: &candidate_hierarchy },
            &outcome,
        )
        .unwrap();

        let full = &tables.matched_data;
        assert_eq!(
            full.get_column_names(),
            vec![
                "reference_level_1_name",
                "reference_level_1_id",
                "candidate_level_1_name",
                "score_level_1",
                "repeated_level_1",
                "reference_level_2_name",
                "reference_level_2_id",
                "candidate_level_2_name",
                "candidate_level_2_uid",
                "score_level_2",
                "repeated_level_2",
            ]
        );
        assert_eq!(full.height(), 1);
        assert_eq!(
            full.column("reference_level_2_id").unwrap().i64().unwrap().get(0),
            Some(201)
        );
        assert_eq!(
            full.column("candidate_level_2_uid").unwrap().str().unwrap().get(0),
            Some("x9")
        );
        assert_eq!(full.column("score_level_1").unwrap().f64().unwrap().get(0), Some(100.0));
        assert_eq!(full.column("repeated_level_2").unwrap().bool().unwrap().get(0), Some(false));

        let simple = &tables.matched_data_simplified;
        assert_eq!(simple.width(), 7);
        assert!(simple
            .get_column_names()
            .iter()
            .all(|c| !c.starts_with("score_") && !c.starts_with("repeated_")));
    }

    #[test]
    fn test_column_names() {
        assert_eq!(score_column(3), "score_level_3");
        assert_eq!(repeated_column(3), "repeated_level_3");
    }
}
