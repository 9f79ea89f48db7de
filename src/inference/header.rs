//! # Header discovery
//!
//! Scores rows around the table start for how much they look like column
//! titles, optionally fuses a second title row, and builds one header string
//! per column.
use crate::inference::normalize::cell_text;
use crate::inference::normalize::compact;
use crate::inference::normalize::detect_number;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::grid::Grid;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Rows above the table start that may hold the header.
const LOOKBEHIND_ROWS: usize = 5;

/// Rows below the table start that may hold the header.
const LOOKAHEAD_ROWS: usize = 2;

/// Score a candidate needs to count as a header at all.
pub const MIN_HEADER_SCORE: f64 = 20.0;

/// Score given to rows with fewer than three populated cells.
pub const SPARSE_ROW_SCORE: f64 = -100.0;

/// Column-title vocabulary across every role, plus identifiers often seen
/// next to them.
const HEADER_KEYWORDS: &[&str] = &[
    // instrument
    "instrument", "security", "company", "name", "scrip", "stock", "share", "particulars", "description",
    "description_of_security", "asset", "script",
    // symbol
    "symbol", "ticker", "trading_symbol", "code", "isin", "security_code",
    // quantity
    "qty", "quantity", "units", "shares", "nos", "number", "volume", "holding", "balance", "closing_balance",
    "available_qty",
    // price
    "price", "rate", "cost", "avg", "average", "value", "amount", "buy", "purchase", "entry", "acquisition",
    "purchase_price", "avg_cost",
    // market price
    "ltp", "market_price", "current_price", "last_price", "close_price", "market_rate", "cmp", "last_traded_price",
];

fn compact_keywords() -> &'static [String] {
    static KEYWORDS: OnceLock<Vec<String>> = OnceLock::new();
    KEYWORDS.get_or_init(|| HEADER_KEYWORDS.iter().map(|keyword| compact(keyword)).collect())
}

/// True when compacted cell text equals a keyword, contains one, or is a
/// fragment of at least four characters of one.
fn matches_keyword(text: &str) -> bool {
    let text = compact(text);
    if text.is_empty() {
        return false;
    }
    compact_keywords().iter().any(|keyword| {
        text == *keyword || text.contains(keyword.as_str()) || (text.len() >= 4 && keyword.contains(text.as_str()))
    })
}

/// Scoring outcome of one candidate row, kept in the audit trail.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderCandidate {
    pub row_index: usize,
    pub score: f64,
    pub reasons: Vec<String>,
    pub sample_cells: Vec<String>,
    #[serde(skip)]
    pub keyword_hits: usize,
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Mostly-text rows look like titles: above 0.8 earns 30, above 0.5 earns 10.
fn string_ratio_points(string_ratio: f64) -> f64 {
    if string_ratio > 0.8 {
        30.0
    } else if string_ratio > 0.5 {
        10.0
    } else {
        -30.0
    }
}

/// Scores how much `row` looks like a header, looking at `next_row` for a
/// numeric body underneath.
pub fn score_header_row(row_index: usize, row: &[CellValue], next_row: Option<&[CellValue]>) -> HeaderCandidate {
    let cells = row.iter().map(cell_text).collect::<Vec<_>>();
    let sample_cells = cells.iter().take(5).cloned().collect::<Vec<_>>();
    let populated = cells.iter().filter(|text| !text.is_empty()).collect::<Vec<_>>();
    if populated.len() < 3 {
        return HeaderCandidate {
            row_index,
            score: SPARSE_ROW_SCORE,
            reasons: vec![format!("too_sparse populated={}", populated.len())],
            sample_cells,
            keyword_hits: 0,
        };
    }

    let mut score = 0.0;
    let mut reasons = Vec::new();
    let total = populated.len();

    let strings = populated.iter().filter(|text| detect_number(text).is_none()).count();
    let string_ratio = ratio(strings, total);
    let string_points = string_ratio_points(string_ratio);
    score += string_points;
    reasons.push(format!("string_ratio={string_ratio:.2}:{string_points:+}"));

    let distinct = populated.iter().map(|text| text.to_lowercase()).collect::<HashSet<_>>();
    let unique_ratio = ratio(distinct.len(), total);
    score += unique_ratio * 20.0;
    reasons.push(format!("unique_ratio={unique_ratio:.2}:{:+.1}", unique_ratio * 20.0));

    let keyword_hits = populated.iter().filter(|text| matches_keyword(text)).count();
    if keyword_hits > 0 {
        score += keyword_hits as f64 * 20.0;
        reasons.push(format!("keyword_hits={keyword_hits}:{:+}", keyword_hits * 20));
    }

    let numbers = populated.iter().filter(|text| detect_number(text).is_some()).count();
    let numeric_ratio = ratio(numbers, total);
    if numeric_ratio > 0.3 {
        score -= 60.0;
        reasons.push(format!("numeric_ratio={numeric_ratio:.2}:-60"));
    }

    if let Some(next_row) = next_row {
        let next_cells = next_row.iter().map(cell_text).filter(|text| !text.is_empty()).collect::<Vec<_>>();
        if next_cells.len() >= 3 {
            let next_numbers = next_cells.iter().filter(|text| detect_number(text).is_some()).count();
            let next_ratio = ratio(next_numbers, next_cells.len());
            if next_ratio > 0.5 {
                score += 40.0;
                reasons.push(format!("next_row_numeric_ratio={next_ratio:.2}:+40"));
            }
        }
    }

    HeaderCandidate { row_index, score, reasons, sample_cells, keyword_hits }
}

fn score_grid_row(grid: &Grid, row_index: usize) -> HeaderCandidate {
    let next_row = (row_index + 1 < grid.height()).then(|| grid.row(row_index + 1));
    score_header_row(row_index, grid.row(row_index), next_row)
}

/// Formula or column-letter rows placed under a title row.
pub fn is_helper_row(row: &[CellValue]) -> bool {
    row.iter().any(|value| {
        let text = value.as_text();
        let text = text.trim();
        let length = text.chars().count();
        length == 1 || (text.contains('=') && length < 10)
    })
}

/// Header rows picked for a sheet, with every scored candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderSelection {
    /// One row, or two consecutive rows when a second title row was fused
    pub rows: Vec<usize>,
    /// Candidates ordered by descending score, earliest row first on ties
    pub candidates: Vec<HeaderCandidate>,
    /// False when no candidate reached [`MIN_HEADER_SCORE`]
    pub has_signal: bool,
}

impl HeaderSelection {
    pub fn best_score(&self) -> Option<f64> {
        self.candidates.first().map(|candidate| candidate.score)
    }
}

/// Picks the header row(s) among the rows around `table_start`.
pub fn find_header_rows(grid: &Grid, table_start: usize) -> HeaderSelection {
    let last = grid.height().saturating_sub(1).min(table_start + LOOKAHEAD_ROWS);
    let first = table_start.saturating_sub(LOOKBEHIND_ROWS).min(last);
    let mut candidates = if grid.is_empty() {
        Vec::new()
    } else {
        (first..=last).map(|row| score_grid_row(grid, row)).collect::<Vec<_>>()
    };
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    for candidate in candidates.iter() {
        tracing::trace!(row = candidate.row_index, score = candidate.score, reasons = ?candidate.reasons, "header candidate");
    }

    let best = match candidates.first() {
        Some(best) if best.score >= MIN_HEADER_SCORE => best,
        _ => {
            tracing::warn!(table_start, "no row scored as a header, using table start");
            return HeaderSelection { rows: vec![table_start], candidates, has_signal: false };
        }
    };

    let mut rows = vec![best.row_index];
    let fused = best.row_index + 1;
    if fused < grid.height() {
        let second = score_grid_row(grid, fused);
        if second.score > MIN_HEADER_SCORE && second.keyword_hits > 0 {
            if is_helper_row(grid.row(fused)) {
                tracing::debug!(row = fused, "second header row rejected as helper row");
            } else {
                tracing::debug!(row = fused, score = second.score, "fusing second header row");
                rows.push(fused);
            }
        }
    }
    HeaderSelection { rows, candidates, has_signal: true }
}

/// Builds one header per column by joining the non-empty header-row texts
/// with `" - "`; columns with no text become `col_N` (1-based).
pub fn extract_headers(grid: &Grid, header_rows: &[usize]) -> Vec<String> {
    let width = header_rows.first().map(|row| grid.row(*row).len()).unwrap_or(0);
    (0..width)
        .map(|col| {
            let parts = header_rows
                .iter()
                .filter_map(|row| grid.get(*row, col))
                .map(cell_text)
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>();
            if parts.is_empty() {
                format!("col_{}", col + 1)
            } else {
                parts.join(" - ")
            }
        })
        .collect()
}
