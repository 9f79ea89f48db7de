use crate::inference::normalize::parse_number;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::grid::Grid;
use serde::Serialize;
use std::collections::BTreeMap;

/// Header key fragments marking a column whose text should become numbers.
const NUMERIC_KEY_FRAGMENTS: [&str; 7] = ["price", "cost", "qty", "quantity", "value", "pnl", "rate"];

/// One data row keyed by normalized header.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedRow {
    /// Zero-based row in the source grid
    pub row_index: usize,
    pub fields: BTreeMap<String, CellValue>,
}

impl ParsedRow {
    pub fn get(&self, key: &str) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.fields.get(key).unwrap_or(&EMPTY)
    }
}

/// Rows read below the header, plus how many numeric-column cells kept their text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowExtraction {
    pub rows: Vec<ParsedRow>,
    /// `(column, count)` in header order, only columns with at least one fallback
    pub numeric_fallbacks: Vec<(String, usize)>,
}

pub fn is_numeric_key(key: &str) -> bool {
    NUMERIC_KEY_FRAGMENTS.iter().any(|fragment| key.contains(fragment))
}

/// Parses a price or quantity cell: `(1,234.50)` is negative, currency signs,
/// separators, percent signs and spaces are dropped.
pub fn parse_amount(text: &str) -> Option<f64> {
    let text = text.trim();
    let (negative, text) = match text.strip_prefix('(').and_then(|inner| inner.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, text),
    };
    let cleaned = text
        .chars()
        .filter(|character| !matches!(character, '₹' | '$' | '€' | '£' | '¥' | ',' | '%') && !character.is_whitespace())
        .collect::<String>();
    let number = parse_number(&cleaned)?;
    Some(if negative { -number } else { number })
}

fn is_blank_row(row: &[CellValue]) -> bool {
    row.iter().all(CellValue::is_blank)
}

/// Reads data rows from `data_start_row` until the row cap or a run of
/// `criteria.empty_row_limit` blank rows. Blank rows are skipped and every
/// row carries exactly the keys in `headers`.
pub fn extract_rows(grid: &Grid, data_start_row: usize, headers: &[String], criteria: &Criteria) -> RowExtraction {
    let limit = grid.height().min(criteria.max_rows);
    let numeric = headers.iter().map(|key| is_numeric_key(key)).collect::<Vec<_>>();
    let mut fallbacks = vec![0usize; headers.len()];
    let mut rows = Vec::new();
    let mut blank_run = 0usize;

    for row_index in data_start_row..limit {
        let row = grid.row(row_index);
        if is_blank_row(row) {
            blank_run += 1;
            if blank_run >= criteria.empty_row_limit {
                tracing::debug!(row_index, blank_run, "stopping at blank rows");
                break;
            }
            continue;
        }
        blank_run = 0;

        let mut fields = BTreeMap::new();
        for (col, key) in headers.iter().enumerate() {
            let mut value = row.get(col).cloned().unwrap_or_default();
            if numeric[col] {
                if let CellValue::Text(text) = &value {
                    match parse_amount(text) {
                        Some(number) => value = CellValue::Number(number),
                        None => fallbacks[col] += 1,
                    }
                }
            }
            fields.insert(key.to_owned(), value);
        }
        rows.push(ParsedRow { row_index, fields });
    }

    let numeric_fallbacks = headers
        .iter()
        .zip(fallbacks)
        .filter(|(_, count)| *count > 0)
        .map(|(key, count)| (key.to_owned(), count))
        .collect::<Vec<_>>();
    for (column, count) in numeric_fallbacks.iter() {
        tracing::debug!(column = %column, count, "numeric column kept unparseable text");
    }
    RowExtraction { rows, numeric_fallbacks }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|cell| CellValue::from(*cell)).collect()
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|key| key.to_string()).collect()
    }

    #[test]
    fn amounts() {
        assert_eq!(parse_amount("2,000.00"), Some(2000.0));
        assert_eq!(parse_amount("(123.45)"), Some(-123.45));
        assert_eq!(parse_amount("₹ 1,50,000"), Some(150000.0));
        assert_eq!(parse_amount("12.5%"), Some(12.5));
        assert_eq!(parse_amount("$ 7"), Some(7.0));
        assert_eq!(parse_amount("N/A"), None);
        assert_eq!(parse_amount("-"), None);
        assert_eq!(parse_amount("12abc"), None);
    }

    #[test]
    fn numeric_keys() {
        assert!(is_numeric_key("avg_cost"));
        assert!(is_numeric_key("qty_held"));
        assert!(is_numeric_key("market_value"));
        assert!(is_numeric_key("unrealized_pnl"));
        assert!(!is_numeric_key("ltp"));
        assert!(!is_numeric_key("stock_name"));
    }

    #[test]
    fn extracts_rows_with_header_keys() {
        let grid = Grid::from_rows(vec![
            row(&["Stock Name", "Qty", "Avg Cost", "LTP"]),
            row(&["Reliance", "10", "2,000.00", "2,500.00"]),
            row(&["", "", "", ""]),
            row(&["TCS", "N/A", "(5)", "3,200.00"]),
            vec![CellValue::from("INFY"), CellValue::from(7.0)],
        ]);
        let headers = keys(&["stock_name", "qty", "avg_cost", "ltp"]);
        let extraction = extract_rows(&grid, 1, &headers, &Criteria::default());

        assert_eq!(extraction.rows.len(), 3);
        assert_eq!(extraction.rows.iter().map(|row| row.row_index).collect::<Vec<_>>(), vec![1, 3, 4]);
        for parsed in extraction.rows.iter() {
            assert_eq!(parsed.fields.keys().collect::<Vec<_>>(), vec!["avg_cost", "ltp", "qty", "stock_name"]);
        }
        let first = &extraction.rows[0];
        assert_eq!(first.get("qty"), &CellValue::Number(10.0));
        assert_eq!(first.get("avg_cost"), &CellValue::Number(2000.0));
        assert_eq!(first.get("ltp"), &CellValue::from("2,500.00"));
        assert_eq!(extraction.rows[1].get("qty"), &CellValue::from("N/A"));
        assert_eq!(extraction.rows[1].get("avg_cost"), &CellValue::Number(-5.0));
        assert_eq!(extraction.rows[2].get("qty"), &CellValue::Number(7.0));
        assert_eq!(extraction.rows[2].get("ltp"), &CellValue::Empty);
        assert_eq!(extraction.numeric_fallbacks, vec![("qty".to_owned(), 1)]);
    }

    #[test]
    fn stops_after_blank_run() {
        let mut rows = vec![row(&["Name", "Qty"]), row(&["A", "1"])];
        rows.extend((0..3).map(|_| row(&["", ""])));
        rows.push(row(&["Total", "1"]));
        let grid = Grid::from_rows(rows);
        let criteria = Criteria { empty_row_limit: 3, ..Criteria::default() };
        let extraction = extract_rows(&grid, 1, &keys(&["name", "qty"]), &criteria);
        assert_eq!(extraction.rows.len(), 1);

        let criteria = Criteria { empty_row_limit: 4, ..Criteria::default() };
        let extraction = extract_rows(&grid, 1, &keys(&["name", "qty"]), &criteria);
        assert_eq!(extraction.rows.len(), 2);
    }

    #[test]
    fn respects_row_cap() {
        let rows = (0..20).map(|index| row(&[&format!("row {index}"), "1"])).collect::<Vec<_>>();
        let grid = Grid::from_rows(rows);
        let criteria = Criteria { max_rows: 10, ..Criteria::default() };
        let extraction = extract_rows(&grid, 1, &keys(&["name", "qty"]), &criteria);
        assert_eq!(extraction.rows.len(), 9);
    }
}
