use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::range::MergeRange;
use serde::Serialize;

/// Rectangular table of cell values; every row has the same width.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Grid {
    rows: Vec<Vec<CellValue>>,
    width: usize,
}

impl Grid {
    /// Builds a grid from ragged rows, padding short rows with empty cells.
    pub fn from_rows(mut rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in rows.iter_mut() {
            row.resize(width, CellValue::Empty);
        }
        Grid { rows, width }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row `index`, or an empty slice past the end.
    pub fn row(&self, index: usize) -> &[CellValue] {
        self.rows.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row)?.get(col)
    }

    /// Copies each merge's top-left value into the blank cells of its range.
    ///
    /// Only merges starting above `scan_rows` are filled, populated cells are
    /// never overwritten and ranges are clipped to the grid. Returns the number
    /// of cells written.
    pub fn apply_merged_fill(&mut self, merges: &[MergeRange], scan_rows: usize) -> usize {
        let mut filled = 0usize;
        for merge in merges.iter().filter(|merge| merge.r1 < scan_rows) {
            let source = match self.get(merge.r1, merge.c1) {
                Some(value) if !value.is_blank() => value.clone(),
                _ => continue,
            };
            for row in merge.r1..=merge.r2.min(self.height().saturating_sub(1)) {
                for col in merge.c1..=merge.c2.min(self.width.saturating_sub(1)) {
                    if (row, col) == (merge.r1, merge.c1) {
                        continue;
                    }
                    let cell = &mut self.rows[row][col];
                    if cell.is_blank() {
                        *cell = source.clone();
                        filled += 1;
                    }
                }
            }
        }
        filled
    }
}
