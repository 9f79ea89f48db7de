use crate::error::IngestError;
use crate::spreadsheet::reference::col_to_index;
use crate::spreadsheet::reference::row_to_index;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors related to merge range parsing.
#[derive(Error, Debug)]
pub enum RangeError {
    #[error("Invalid merge range '{0}'")]
    FormatError(String),
}

/// A rectangular group of cells displayed as one, sourced from its top-left cell.
///
/// Coordinates are 0-based and inclusive, `r1 <= r2` and `c1 <= c2`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeRange {
    pub r1: usize,
    pub c1: usize,
    pub r2: usize,
    pub c2: usize,
}

impl MergeRange {
    /// Builds a range from two corners given in any order.
    pub fn new(row_a: usize, col_a: usize, row_b: usize, col_b: usize) -> Self {
        MergeRange {
            r1: row_a.min(row_b),
            c1: col_a.min(col_b),
            r2: row_a.max(row_b),
            c2: col_a.max(col_b),
        }
    }

    /// Checks whether `(row, col)` lies inside the range.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.r1 <= row && row <= self.r2 && self.c1 <= col && col <= self.c2
    }
}

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\$?([A-Z]+)\$?(\d+)(:\$?([A-Z]+)\$?(\d+))?$").expect("Hardcode regex pattern")
    })
}

impl TryFrom<&str> for MergeRange {
    type Error = IngestError;

    /// Parses an OOXML `mergeCell/@ref` such as `"A1:C2"`; a single
    /// reference yields a one-cell range.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim().to_ascii_uppercase();
        let captures = pattern()
            .captures(value.as_str())
            .ok_or_else(|| RangeError::FormatError(value.to_owned()))?;
        let corner = |col: usize, row: usize| -> Option<(usize, usize)> {
            let col = captures.get(col).map(|matcher| matcher.as_str()).and_then(col_to_index)?;
            let row = captures.get(row).map(|matcher| matcher.as_str()).and_then(row_to_index)?;
            Some((row, col))
        };
        let (r1, c1) = corner(1, 2).ok_or_else(|| RangeError::FormatError(value.to_owned()))?;
        let (r2, c2) = if captures.get(3).is_some() {
            corner(4, 5).ok_or_else(|| RangeError::FormatError(value.to_owned()))?
        } else {
            (r1, c1)
        };
        Ok(MergeRange::new(r1, c1, r2, c2))
    }
}
