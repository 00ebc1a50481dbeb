//! Input side of the engine: a validated, deduplicated pyramid table.

use crate::error::{PyramidError, Result};
use polars::prelude::*;
use std::fmt;
use tracing::debug;

/// Which of the two pyramids a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Reference,
    Candidate,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Reference => "reference",
            Side::Candidate => "candidate",
        }
    }

    /// Namespace prepended to this side's columns in the matched output.
    pub fn output_column(&self, column: &str) -> String {
        format!("{}_{}", self.as_str(), column)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pyramid table: one row per leaf entity, ancestors denormalized as
/// `level_{n}_*` columns.
#[derive(Debug, Clone)]
pub struct Pyramid {
    side: Side,
    frame: DataFrame,
}

impl Pyramid {
    /// Validate `frame` and drop exact duplicate rows, keeping the first occurrence
    /// and the input order.
    pub fn new(side: Side, frame: &DataFrame) -> Result<Self> {
        if frame.height() == 0 || frame.width() == 0 {
            return Err(PyramidError::EmptyPyramid {
                side: side.to_string(),
            });
        }

        let deduped = frame
            .clone()
            .lazy()
            .unique_stable(None, UniqueKeepStrategy::First)
            .collect()?;
        if deduped.height() < frame.height() {
            debug!(
                "Dropped {} duplicate rows from the {} pyramid",
                frame.height() - deduped.height(),
                side
            );
        }

        Ok(Self {
            side,
            frame: deduped,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        column_names(&self.frame)
    }

    /// Read a key column as text, one entry per row. Nulls stay `None`.
    pub fn key_values(&self, column: &str) -> Result<Vec<Option<String>>> {
        let invalid = |message: String| PyramidError::InvalidKeyColumn {
            side: self.side.to_string(),
            column: column.to_string(),
            message,
        };

        let series = self
            .frame
            .column(column)
            .map_err(|e| invalid(e.to_string()))?
            .cast(&DataType::String)
            .map_err(|e| invalid(e.to_string()))?;
        let values = series.str().map_err(|e| invalid(e.to_string()))?;

        Ok(values
            .into_iter()
            .map(|value| value.map(str::to_string))
            .collect())
    }

    /// Per-row rendering of one column, used to compare values for equality.
    pub fn rendered_values(&self, column: &str) -> Result<Vec<String>> {
        rendered_values(&self.frame, column)
    }
}

fn column_names(frame: &DataFrame) -> Vec<String> {
    frame
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

fn rendered_values(frame: &DataFrame, column: &str) -> Result<Vec<String>> {
    let series = frame.column(column)?;
    (0..series.len())
        .map(|row| Ok(format!("{:?}", series.get(row)?)))
        .collect()
}
