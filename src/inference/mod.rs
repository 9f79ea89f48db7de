//! # Structure inference
//!
//! Runs the per-sheet pipeline over a loaded grid:
//!
//! 1. locate the table body ([`region`]),
//! 2. choose one or two header rows ([`header`]),
//! 3. build unique snake_case header keys ([`normalize`]),
//! 4. read the data rows under them ([`rows`]),
//! 5. classify instrument, quantity and price columns ([`roles`], [`instrument`]).
//!
//! Low-confidence outcomes never fail the sheet. They are reported as
//! [`IngestWarning`] values next to the full scoring trace in [`InferenceDebug`].
pub mod header;
pub mod instrument;
pub mod normalize;
pub mod region;
pub mod roles;
pub mod rows;

use crate::error::IngestError;
use crate::inference::header::HeaderCandidate;
use crate::inference::roles::ColumnRoles;
use crate::inference::roles::Role;
use crate::inference::roles::RoleCandidates;
use crate::inference::rows::ParsedRow;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::SheetData;
use serde::Serialize;
use thiserror::Error;

/// A sheet that decoded fine but holds no usable table
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Sheet '{0}' has no populated cells")]
    EmptySheet(String),

    #[error("Sheet '{sheet}' has no data rows below header row {header_row}")]
    NoDataRows { sheet: String, header_row: usize },
}

/// Soft degradation recorded alongside a sheet's result
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IngestWarning {
    /// No candidate reached the header threshold; the table start row was used
    NoHeaderSignal { best_score: Option<f64>, fallback_row: usize },
    /// No column scored above the role threshold
    RoleUnassigned { role: Role },
    /// Cells in a numeric column kept their raw text
    NumericParseFallback { column: String, count: usize },
}

/// Scoring trace kept for auditing the decisions.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceDebug {
    pub table_block_start: usize,
    /// Sorted by descending score, earliest row first on ties
    pub header_candidates: Vec<HeaderCandidate>,
    /// One entry per role in assignment order
    pub role_candidates: Vec<RoleCandidates>,
}

/// Inferred structure and rows of one sheet.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetInference {
    pub sheet_name: String,
    /// One or two zero-based rows
    pub header_rows_used: Vec<usize>,
    pub data_start_row: usize,
    pub original_headers: Vec<String>,
    /// Unique snake_case keys, one per column
    pub normalized_headers: Vec<String>,
    pub column_roles: ColumnRoles,
    pub instrument_key: String,
    pub rows: Vec<ParsedRow>,
    pub warnings: Vec<IngestWarning>,
    pub debug: InferenceDebug,
}

/// Infers header rows, keys, rows and column roles of a loaded sheet.
pub fn analyze_sheet(sheet: &SheetData, criteria: &Criteria) -> Result<SheetInference, IngestError> {
    let grid = &sheet.grid;
    if grid.rows().all(|row| row.iter().all(CellValue::is_blank)) {
        return Err(InferenceError::EmptySheet(sheet.name.to_owned()).into());
    }

    let table_start = region::find_table_start(grid, criteria.header_scan_rows);
    let selection = header::find_header_rows(grid, table_start);
    let mut warnings = Vec::new();
    if !selection.has_signal {
        tracing::warn!(sheet = %sheet.name, table_start, "no header signal, using table start row");
        warnings.push(IngestWarning::NoHeaderSignal { best_score: selection.best_score(), fallback_row: table_start });
    }

    let original_headers = header::extract_headers(grid, &selection.rows);
    let normalized_headers =
        normalize::ensure_unique(original_headers.iter().map(|text| normalize::normalize_key(text)).collect());
    let header_row = selection.rows.iter().copied().max().unwrap_or(table_start);
    let data_start_row = header_row + 1;
    tracing::info!(
        sheet = %sheet.name,
        table_start,
        header_rows = ?selection.rows,
        headers = ?normalized_headers,
        "header selected"
    );

    let extraction = rows::extract_rows(grid, data_start_row, &normalized_headers, criteria);
    if extraction.rows.is_empty() {
        return Err(InferenceError::NoDataRows { sheet: sheet.name.to_owned(), header_row }.into());
    }
    warnings.extend(
        extraction
            .numeric_fallbacks
            .iter()
            .map(|(column, count)| IngestWarning::NumericParseFallback { column: column.to_owned(), count: *count }),
    );

    let assignment = roles::identify_column_roles(&normalized_headers, &extraction.rows, criteria.role_sample_rows);
    for role in Role::ALL.into_iter().filter(|role| assignment.roles.get(*role).is_none()) {
        tracing::warn!(sheet = %sheet.name, role = %role, "role unassigned");
        warnings.push(IngestWarning::RoleUnassigned { role });
    }
    let instrument_key =
        instrument::determine_instrument_column(&normalized_headers, &extraction.rows, criteria.role_sample_rows);
    tracing::info!(
        sheet = %sheet.name,
        roles = ?assignment.roles,
        instrument_key = %instrument_key,
        rows = extraction.rows.len(),
        "columns classified"
    );

    Ok(SheetInference {
        sheet_name: sheet.name.to_owned(),
        header_rows_used: selection.rows,
        data_start_row,
        original_headers,
        normalized_headers,
        column_roles: assignment.roles,
        instrument_key,
        rows: extraction.rows,
        warnings,
        debug: InferenceDebug {
            table_block_start: table_start,
            header_candidates: selection.candidates,
            role_candidates: assignment.candidates,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::grid::Grid;
    use std::collections::HashSet;

    fn sheet(rows: Vec<Vec<CellValue>>) -> SheetData {
        SheetData { name: "Holdings".to_owned(), grid: Grid::from_rows(rows), merges: Vec::new() }
    }

    fn holdings() -> SheetData {
        sheet(vec![
            vec!["Stock Name".into(), "Qty".into(), "Avg Cost".into(), "LTP".into()],
            vec!["Reliance".into(), 10.0.into(), "2,000.00".into(), "2,500.00".into()],
            vec!["TCS".into(), 5.0.into(), "3,000.00".into(), "3,200.00".into()],
        ])
    }

    #[test]
    fn end_to_end_holdings() {
        let result = analyze_sheet(&holdings(), &Criteria::default()).unwrap();
        assert_eq!(result.debug.table_block_start, 0);
        assert_eq!(result.header_rows_used, vec![0]);
        assert_eq!(result.data_start_row, 1);
        assert_eq!(result.normalized_headers, vec!["stock_name", "qty", "avg_cost", "ltp"]);
        assert_eq!(result.column_roles.instrument.as_deref(), Some("stock_name"));
        assert_eq!(result.column_roles.quantity.as_deref(), Some("qty"));
        assert_eq!(result.column_roles.purchase_price.as_deref(), Some("avg_cost"));
        assert_eq!(result.column_roles.market_price.as_deref(), Some("ltp"));
        assert_eq!(result.instrument_key, "stock_name");
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].get("qty"), &CellValue::Number(10.0));
        assert_eq!(result.rows[0].get("avg_cost"), &CellValue::Number(2000.0));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn idempotent() {
        let sheet = holdings();
        let first = analyze_sheet(&sheet, &Criteria::default()).unwrap();
        let second = analyze_sheet(&sheet, &Criteria::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn skips_title_block_and_single_letter_row() {
        let result = analyze_sheet(
            &sheet(vec![
                vec!["Portfolio holdings".into()],
                vec!["As of 31-03-2024".into()],
                vec![],
                vec!["Stock Name".into(), "Qty".into(), "Avg Cost".into(), "LTP".into()],
                vec!["A".into(), "B".into(), "C".into(), "D".into()],
                vec!["Reliance".into(), 10.0.into(), 2000.0.into(), 2500.0.into()],
                vec!["TCS".into(), 5.0.into(), 3000.0.into(), 3200.0.into()],
                vec!["INFY".into(), 8.0.into(), 1400.0.into(), 1500.0.into()],
            ]),
            &Criteria::default(),
        )
        .unwrap();
        assert_eq!(result.header_rows_used, vec![3]);
        assert_eq!(result.original_headers, vec!["Stock Name", "Qty", "Avg Cost", "LTP"]);
        assert_eq!(result.data_start_row, 4);
        assert_eq!(result.column_roles.instrument.as_deref(), Some("stock_name"));
    }

    #[test]
    fn date_serial_column_never_priced() {
        let result = analyze_sheet(
            &sheet(vec![
                vec!["Stock Name".into(), "Qty".into(), "Purchase Date".into(), "Buy Value".into()],
                vec!["Reliance".into(), 10.0.into(), 45123.0.into(), 45200.0.into()],
                vec!["TCS".into(), 5.0.into(), 45124.0.into(), 45300.0.into()],
                vec!["INFY".into(), 8.0.into(), 45125.0.into(), 45400.0.into()],
            ]),
            &Criteria::default(),
        )
        .unwrap();
        for (role, header) in result.column_roles.assigned() {
            if role.is_numeric() {
                assert_ne!(header, "purchase_date");
                assert_ne!(header, "buy_value");
            }
        }
        assert!(result.warnings.contains(&IngestWarning::RoleUnassigned { role: Role::PurchasePrice }));
    }

    #[test]
    fn duplicate_and_blank_headers_are_unique() {
        let result = analyze_sheet(
            &sheet(vec![
                vec!["Name".into(), "Qty".into(), "Qty".into(), CellValue::Empty, "Price".into()],
                vec!["INFY".into(), 1.0.into(), 2.0.into(), "x".into(), 1400.0.into()],
                vec!["TCS".into(), 3.0.into(), 4.0.into(), "y".into(), 3000.0.into()],
            ]),
            &Criteria::default(),
        )
        .unwrap();
        assert_eq!(result.normalized_headers, vec!["name", "qty", "qty_2", "col_4", "price"]);
        let distinct = result.normalized_headers.iter().collect::<HashSet<_>>();
        assert_eq!(distinct.len(), result.normalized_headers.len());
        for row in result.rows.iter() {
            assert_eq!(row.fields.len(), result.normalized_headers.len());
        }
    }

    #[test]
    fn weak_header_degrades_with_warnings() {
        let result = analyze_sheet(
            &sheet(vec![
                vec!["1".into(), "2".into(), "3".into()],
                vec!["4".into(), "5".into(), "6".into()],
            ]),
            &Criteria::default(),
        )
        .unwrap();
        assert_eq!(result.header_rows_used, vec![0]);
        assert!(matches!(result.warnings[0], IngestWarning::NoHeaderSignal { fallback_row: 0, .. }));
        assert!(result.warnings.contains(&IngestWarning::RoleUnassigned { role: Role::Instrument }));
    }

    #[test]
    fn counts_numeric_fallbacks() {
        let result = analyze_sheet(
            &sheet(vec![
                vec!["Scrip".into(), "Quantity".into(), "Rate".into()],
                vec!["INFY".into(), "10".into(), "N/A".into()],
                vec!["TCS".into(), "5".into(), "-".into()],
                vec!["WIPRO".into(), "7".into(), "450.5".into()],
            ]),
            &Criteria::default(),
        )
        .unwrap();
        assert!(result.warnings.contains(&IngestWarning::NumericParseFallback { column: "rate".to_owned(), count: 2 }));
        assert_eq!(result.rows[2].get("rate"), &CellValue::Number(450.5));
    }

    #[test]
    fn empty_and_header_only_sheets_fail() {
        let error = analyze_sheet(&sheet(vec![vec![CellValue::Empty; 3]]), &Criteria::default()).unwrap_err();
        assert!(error.is_empty_sheet());
        assert!(matches!(error, IngestError::InferenceError(InferenceError::EmptySheet(_))));

        let error = analyze_sheet(&sheet(vec![vec!["Name".into(), "Qty".into(), "Price".into()]]), &Criteria::default())
            .unwrap_err();
        assert!(matches!(error, IngestError::InferenceError(InferenceError::NoDataRows { header_row: 0, .. })));
    }

    #[test]
    fn serializes_output_names() {
        let result = analyze_sheet(&holdings(), &Criteria::default()).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["sheetName"], "Holdings");
        assert_eq!(json["headerRowsUsed"], serde_json::json!([0]));
        assert_eq!(json["columnRoles"]["purchase_price"], "avg_cost");
        assert_eq!(json["rows"][0]["row_index"], 1);
        assert_eq!(json["rows"][0]["fields"]["qty"], 10.0);
        assert_eq!(json["rows"][0]["fields"]["ltp"], "2,500.00");
        assert_eq!(json["debug"]["tableBlockStart"], 0);
        assert_eq!(json["debug"]["headerCandidates"][0]["rowIndex"], 0);
        assert_eq!(json["debug"]["roleCandidates"][0]["role"], "instrument");

        let warning = serde_json::to_value(IngestWarning::NumericParseFallback { column: "rate".into(), count: 2 }).unwrap();
        assert_eq!(warning, serde_json::json!({ "kind": "numericParseFallback", "column": "rate", "count": 2 }));
    }
}
