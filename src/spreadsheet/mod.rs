//! # Sheet loading
//!
//! Turns an input buffer into one grid per sheet. Delimited text (.csv, .tsv,
//! .txt) yields a single synthetic sheet; Office Open XML workbooks (.xlsx,
//! .xlsm, .xltx, .xltm, .xlam) and OpenDocument (.ods) yield one grid per
//! worksheet with merged ranges filled inside the header scan window.
pub mod cell;
pub mod criteria;
pub(crate) mod csv;
pub(crate) mod excel;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod grid;
pub mod ods;
pub mod range;
pub(crate) mod reference;
pub mod sheet;
pub(crate) mod xlsx;

use crate::error::IngestError;
use crate::error::ResultMessage;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::csv::CsvSpreadsheet;
use crate::spreadsheet::ods::OdsSpreadsheet;
use crate::spreadsheet::sheet::SheetData;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Input that cannot be decoded as a table source at all
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Unsupported file extension '{0}'")]
    UnsupportedFormatError(String),

    #[error("'{0}' is a legacy or password-protected compound file")]
    OleContainerError(String),

    #[error("'{0}' is encrypted")]
    EncryptedWorkbookError(String),

    #[error("'{0}' contains no sheets")]
    SpreadsheetEmptyError(String),

    #[error("Missing workbook part '{0}'")]
    MissingPartError(String),

    #[error("Unsupported code page {0}")]
    UnsupportedCodepage(u16),
}

/// Source container kind, selected by file extension
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Csv,
    Xlsx,
    Ods,
}

impl Format {
    /// Maps a file name to its container kind by extension, case-insensitively
    pub fn detect(file_name: &str) -> Result<Self, SpreadsheetError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" | "tsv" | "txt" => Ok(Format::Csv),
            "xlsx" | "xlsm" | "xltx" | "xltm" | "xlam" => Ok(Format::Xlsx),
            "ods" => Ok(Format::Ods),
            _ => Err(SpreadsheetError::UnsupportedFormatError(extension)),
        }
    }
}

/// Common interface of the in-memory sheet readers
pub(crate) trait Spreadsheet {
    fn name(&self) -> String;

    fn format(&self) -> Format;

    /// Reads every sheet accepted by the criteria, in workbook order
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<SheetData>, IngestError>;
}

/// Opens the reader matching the file extension
pub(crate) fn open_spreadsheet<'a>(file_name: &str, bytes: &'a [u8]) -> Result<Box<dyn Spreadsheet + 'a>, IngestError> {
    let spreadsheet: Box<dyn Spreadsheet + 'a> = match Format::detect(file_name)? {
        Format::Csv => Box::new(CsvSpreadsheet::open(file_name, bytes)),
        Format::Xlsx => Box::new(XlsxSpreadsheet::open(file_name, bytes)?),
        Format::Ods => Box::new(OdsSpreadsheet::open(file_name, bytes)?),
    };
    Ok(spreadsheet)
}

/// Decodes every selected sheet and fills merged ranges that start inside
/// the header scan window
pub fn load_sheets(file_name: &str, bytes: &[u8], criteria: &Criteria) -> Result<(Format, Vec<SheetData>), IngestError> {
    let mut spreadsheet = open_spreadsheet(file_name, bytes).with_prefix(file_name)?;
    let format = spreadsheet.format();
    let mut sheets = spreadsheet.read_sheets(criteria).with_prefix(&spreadsheet.name())?;
    for sheet in sheets.iter_mut() {
        let filled = sheet.grid.apply_merged_fill(&sheet.merges, criteria.header_scan_rows);
        tracing::debug!(
            sheet = %sheet.name,
            rows = sheet.grid.height(),
            cols = sheet.grid.width(),
            merges = sheet.merges.len(),
            filled,
            "loaded sheet"
        );
    }
    Ok((format, sheets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellValue;

    #[test]
    fn detects_format_by_extension() {
        assert_eq!(Format::detect("export.CSV").unwrap(), Format::Csv);
        assert_eq!(Format::detect("dir/export.tsv").unwrap(), Format::Csv);
        assert_eq!(Format::detect("book.xlsm").unwrap(), Format::Xlsx);
        assert_eq!(Format::detect("book.ods").unwrap(), Format::Ods);
        assert!(Format::detect("book.xls").is_err());
        assert!(Format::detect("book.xlsb").is_err());
        assert!(Format::detect("README").is_err());
    }

    #[test]
    fn unsupported_input_is_a_format_error() {
        let error = load_sheets("legacy.xls", b"\xD0\xCF\x11\xE0", &Criteria::default()).unwrap_err();
        assert!(error.is_format_error());
        assert!(error.to_string().contains("legacy.xls"));

        let error = load_sheets("broken.xlsx", b"PK\x03\x04 truncated", &Criteria::default()).unwrap_err();
        assert!(error.is_format_error());
    }

    #[test]
    fn fills_merged_header_cells() {
        let sheet = [
            "<sheetData>".to_owned(),
            fixtures::xlsx_row(0, &["Quantity", "", "Price"]),
            fixtures::xlsx_row(1, &["Held", "Pledged", "Avg"]),
            fixtures::xlsx_row(200, &["Footer"]),
            "</sheetData>".to_owned(),
            r#"<mergeCells><mergeCell ref="A1:B1"/><mergeCell ref="A201:C201"/></mergeCells>"#.to_owned(),
        ]
        .concat();
        let bytes = fixtures::xlsx(&[("Sheet1", sheet)], &[]);
        let (format, sheets) = load_sheets("book.xlsx", &bytes, &Criteria::default()).unwrap();
        assert_eq!(format, Format::Xlsx);
        let grid = &sheets[0].grid;
        assert_eq!(grid.get(0, 1), Some(&CellValue::from("Quantity")));
        assert_eq!(grid.get(1, 1), Some(&CellValue::from("Pledged")));
        assert_eq!(grid.get(200, 1), Some(&CellValue::Empty));
    }
}
