//! # Holdings Sheet Inference
//!
//! Reads broker and custodian holdings exports and infers their structure
//! without any user configuration: where the table starts, which row(s) hold
//! the column titles, and which columns carry the instrument, quantity,
//! purchase price and market price.
//!
//! ## Features
//!
//! - **Multi-format input**: delimited text (`.csv`, `.tsv`, `.txt`), Office
//!   Open XML workbooks (`.xlsx`, `.xlsm`, `.xltx`, `.xltm`, `.xlam`) and
//!   OpenDocument spreadsheets (`.ods`), all decoded from an in-memory buffer
//! - **Messy layouts**: title blocks, merged or two-row headers, helper rows,
//!   duplicate and blank column titles
//! - **Explainable decisions**: every header and role decision ships with its
//!   scores and reasons
//! - **Bounded cost**: row, column and sampling caps from [`Criteria`]
//!
//! ## Entry points
//!
//! - [`ingest`] / [`ingest_with`]: every selected sheet of a file
//! - [`inference::analyze_sheet`]: one already-loaded sheet
pub mod error;
mod helpers;
pub mod inference;
pub mod spreadsheet;

pub use crate::error::IngestError;
pub use crate::inference::IngestWarning;
pub use crate::inference::SheetInference;
pub use crate::spreadsheet::criteria::Criteria;
pub use crate::spreadsheet::Format;

use crate::spreadsheet::SpreadsheetError;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

/// Sheet left out of the result because it holds no usable table.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSheet {
    pub sheet_name: String,
    pub reason: String,
}

/// Result of ingesting one file.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingestion {
    pub file_name: String,
    pub format: Format,
    /// Lowercase hex SHA-256 of the input bytes
    pub fingerprint: String,
    pub sheets: Vec<SheetInference>,
    pub skipped_sheets: Vec<SkippedSheet>,
}

/// Content hash callers can cache results by.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Ingests `bytes` with the default [`Criteria`].
pub fn ingest(file_name: &str, bytes: &[u8]) -> Result<Ingestion, IngestError> {
    ingest_with(file_name, bytes, &Criteria::default())
}

/// Loads every sheet selected by `criteria` and infers its structure.
///
/// Sheets without a usable table are listed in `skipped_sheets`. The call
/// fails with a format error when the file cannot be decoded, and with the
/// first sheet's error when no sheet is usable.
pub fn ingest_with(file_name: &str, bytes: &[u8], criteria: &Criteria) -> Result<Ingestion, IngestError> {
    let (format, loaded) = spreadsheet::load_sheets(file_name, bytes, criteria)?;
    if loaded.is_empty() {
        return Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()).into());
    }

    let mut sheets = Vec::with_capacity(loaded.len());
    let mut skipped_sheets = Vec::new();
    let mut first_error = None;
    for sheet in loaded.iter() {
        match inference::analyze_sheet(sheet, criteria) {
            Ok(inference) => sheets.push(inference),
            Err(error) if error.is_empty_sheet() => {
                tracing::warn!(sheet = %sheet.name, error = %error, "sheet skipped");
                skipped_sheets.push(SkippedSheet { sheet_name: sheet.name.to_owned(), reason: error.to_string() });
                first_error.get_or_insert(error);
            }
            Err(error) => return Err(error),
        }
    }
    if sheets.is_empty() {
        if let Some(error) = first_error {
            return Err(error);
        }
    }

    tracing::info!(file_name, sheets = sheets.len(), skipped = skipped_sheets.len(), "ingested");
    Ok(Ingestion { file_name: file_name.to_owned(), format, fingerprint: fingerprint(bytes), sheets, skipped_sheets })
}
