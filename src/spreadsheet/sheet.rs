use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::range::MergeRange;

/// One decoded sheet: its name, dense grid and merge ranges.
#[derive(Clone, Debug)]
pub struct SheetData {
    pub name: String,
    pub grid: Grid,
    pub merges: Vec<MergeRange>,
}

/// Accumulates decoded cells of a sheet into a grid capped at
/// `max_rows` x `max_cols`.
pub(crate) struct Sheet {
    /// Sheet name
    pub(crate) name: String,
    rows: Vec<Vec<CellValue>>,
    merges: Vec<MergeRange>,
    max_rows: usize,
    max_cols: usize,
    /// Cells dropped because they fell outside the caps
    pub(crate) truncated: usize,
}

impl Sheet {
    pub(crate) fn new(name: &str, criteria: &Criteria) -> Self {
        Self {
            name: name.to_owned(),
            rows: Vec::new(),
            merges: Vec::new(),
            max_rows: criteria.max_rows,
            max_cols: criteria.max_cols,
            truncated: 0,
        }
    }

    /// Checks if a row lies past the row cap; readers stop there.
    pub(crate) fn after_row_upper_bound(&self, row: usize) -> bool {
        row >= self.max_rows
    }

    /// Checks if a column lies past the column cap.
    pub(crate) fn after_col_upper_bound(&self, col: usize) -> bool {
        col >= self.max_cols
    }

    pub(crate) fn contains(&self, row: usize, col: usize) -> bool {
        !self.after_row_upper_bound(row) && !self.after_col_upper_bound(col)
    }

    /// Places a decoded cell; blank values and cells outside the caps are skipped.
    pub(crate) fn push(&mut self, cell: Cell) {
        if !self.contains(cell.row, cell.col) {
            self.truncated += 1;
            return;
        }
        let value = cell.to_value();
        if value.is_blank() {
            return;
        }
        if self.rows.len() <= cell.row {
            self.rows.resize_with(cell.row + 1, Vec::new);
        }
        let record = &mut self.rows[cell.row];
        if record.len() <= cell.col {
            record.resize(cell.col + 1, CellValue::Empty);
        }
        record[cell.col] = value;
    }

    /// Places an already typed row, as produced by the CSV reader.
    pub(crate) fn push_row(&mut self, mut record: Vec<CellValue>) {
        if self.after_row_upper_bound(self.rows.len()) {
            self.truncated += record.len();
            return;
        }
        if record.len() > self.max_cols {
            self.truncated += record.len() - self.max_cols;
            record.truncate(self.max_cols);
        }
        self.rows.push(record);
    }

    pub(crate) fn push_merge(&mut self, merge: MergeRange) {
        if self.contains(merge.r1, merge.c1) {
            self.merges.push(merge);
        }
    }

    /// Pads the accumulated rows into a rectangular grid.
    pub(crate) fn finish(self) -> SheetData {
        if self.truncated > 0 {
            tracing::warn!(sheet = %self.name, cells = self.truncated, "sheet truncated to grid caps");
        }
        SheetData {
            name: self.name,
            grid: Grid::from_rows(self.rows),
            merges: self.merges,
        }
    }
}
