use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::grid::Grid;

/// A contiguous block this long is trusted as the table body.
const MIN_BLOCK_ROWS: usize = 8;

/// Table-like rows a fallback window needs.
const MIN_DENSE_ROWS: usize = 4;

/// Rows inspected by the density fallback.
const WINDOW_ROWS: usize = 5;

/// A row with at least three populated cells spanning at least three columns.
pub fn is_table_like(row: &[CellValue]) -> bool {
    let mut populated = row.iter().enumerate().filter(|(_, value)| !value.is_blank());
    let Some((first, _)) = populated.next() else {
        return false;
    };
    let (count, last) = populated.fold((1usize, first), |(count, _), (col, _)| (count + 1, col));
    count >= 3 && last - first + 1 >= 3
}

/// Guesses the first row of the table body within the first `scan_rows` rows.
///
/// The longest run of table-like rows wins when it reaches eight rows, the
/// later run on ties. Otherwise the first five-row window holding at least
/// four table-like rows decides, and row 0 is the last resort.
pub fn find_table_start(grid: &Grid, scan_rows: usize) -> usize {
    let limit = grid.height().min(scan_rows);

    let mut best_start = 0usize;
    let mut best_len = 0usize;
    let mut current_start = 0usize;
    let mut current_len = 0usize;
    for row in 0..limit {
        if is_table_like(grid.row(row)) {
            if current_len == 0 {
                current_start = row;
            }
            current_len += 1;
        } else {
            current_len = 0;
        }
        if current_len > 0 && current_len >= best_len {
            best_start = current_start;
            best_len = current_len;
        }
    }
    if best_len >= MIN_BLOCK_ROWS {
        tracing::debug!(start = best_start, rows = best_len, "table block found");
        return best_start;
    }

    for start in 0..=limit.saturating_sub(WINDOW_ROWS) {
        if start + WINDOW_ROWS > limit {
            break;
        }
        let dense = (start..start + WINDOW_ROWS).filter(|row| is_table_like(grid.row(*row))).count();
        if dense >= MIN_DENSE_ROWS {
            tracing::debug!(start, dense, "dense window found");
            return start;
        }
    }
    0
}
