//! Unmatched Collector
//!
//! For one side, keeps every input row whose branch stopped before the deepest
//! common level and records where it stopped.

use crate::cascade::CascadeOutcome;
use crate::error::Result;
use crate::hierarchy::Hierarchy;
use crate::pyramid::Pyramid;
use crate::schema::LevelSchema;
use polars::prelude::*;
use tracing::debug;

pub const UNMATCHED_LEVEL_COLUMN: &str = "unmatched_level";

/// Rows of `pyramid` whose chain broke, in input order, with an
/// `unmatched_level` column naming the shallowest unmatched key column.
pub fn collect_unmatched(
    schema: &LevelSchema,
    pyramid: &Pyramid,
    hierarchy: &Hierarchy,
    outcome: &CascadeOutcome,
) -> Result<DataFrame> {
    let matched = outcome.matched_entities(pyramid.side());

    let mut rows: Vec<IdxSize> = Vec::new();
    let mut failed_at: Vec<String> = Vec::new();
    for row in 0..hierarchy.row_count() {
        let failing = hierarchy
            .row_path(row)
            .iter()
            .enumerate()
            .find(|(depth, id)| !matched.get(*depth).is_some_and(|set| set.contains(*id)));

        if let Some((depth, _)) = failing {
            rows.push(row as IdxSize);
            failed_at.push(schema.levels[depth].key_column.clone());
        }
    }

    debug!(
        "{} of {} {} rows not matched",
        rows.len(),
        hierarchy.row_count(),
        pyramid.side()
    );

    let mut frame = pyramid.frame().take(&IdxCa::from_vec("rows", rows))?;
    frame.with_column(Series::new(UNMATCHED_LEVEL_COLUMN, failed_at))?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::CascadeEngine;
    use crate::matcher::FuzzyMatcher;
    use crate::pyramid::Side;

    #[test]
    fn test_failing_level_recorded_per_row() {
        let reference = Pyramid::new(
            Side::Reference,
            &df! [
                "level_1_name" => ["Kwilu", "Kwilu", "Maniema"],
                "level_2_name" => ["Bulungu", "Kikwit", "Kindu"]
            ]
            .unwrap(),
        )
        .unwrap();
        let candidate = Pyramid::new(
            Side::Candidate,
            &df! [
                "level_1_name" => ["Kwilu", "Kwilu", "Lomami"],
                "level_2_name" => ["Bulungu", "Gungu", "Kabinda"]
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

        let unmatched =
            collect_unmatched(&schema, &reference, &reference_hierarchy, &outcome).unwrap();
        assert_eq!(unmatched.height(), 2);
        let names: Vec<Option<&str>> = unmatched
            .column("level_2_name")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(names, vec![Some("Kikwit"), Some("Kindu")]);
        let levels: Vec<Option<&str>> = unmatched
            .column(UNMATCHED_LEVEL_COLUMN)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(levels, vec![Some("level_2_name"), Some("level_1_name")]);

        let unmatched =
            collect_unmatched(&schema, &candidate, &candidate_hierarchy, &outcome).unwrap();
        assert_eq!(unmatched.height(), 2);
        assert_eq!(unmatched.width(), 3);
    }
}
