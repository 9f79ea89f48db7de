use crate::error::IngestError;
use glob::Pattern;

/// Caps, thresholds and sheet filters applied while loading and analyzing.
#[derive(Clone, Debug)]
pub struct Criteria {
    /// Sheet name patterns for filtering which sheets to process.
    pub sheet_name_patterns: Option<Vec<Pattern>>,

    /// Maximum number of sheets to read.
    pub sheet_limit: Option<usize>,

    /// Maximum number of grid rows kept per sheet, and rows scanned for data.
    pub max_rows: usize,

    /// Maximum number of grid columns kept per sheet.
    pub max_cols: usize,

    /// Rows scanned for the table region; merges starting below are not filled.
    pub header_scan_rows: usize,

    /// Leading lines inspected when sniffing a CSV delimiter.
    pub delimiter_sample_lines: usize,

    /// Consecutive empty rows that end the data table.
    pub empty_row_limit: usize,

    /// Data rows sampled per column when classifying roles.
    pub role_sample_rows: usize,

    /// Windows code page used for CSV bytes that are neither BOM-marked nor valid UTF-8.
    pub fallback_codepage: u16,
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria {
            sheet_name_patterns: None,
            sheet_limit: None,
            max_rows: 5000,
            max_cols: 200,
            header_scan_rows: 120,
            delimiter_sample_lines: 20,
            empty_row_limit: 30,
            role_sample_rows: 30,
            fallback_codepage: 1252,
        }
    }
}

impl Criteria {
    /// Restricts processing to sheets matching any of the glob patterns.
    pub fn with_sheet_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, IngestError> {
        let patterns = patterns
            .iter()
            .map(|pattern| Pattern::new(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.sheet_name_patterns = Some(patterns);
        Ok(self)
    }

    /// Checks if a sheet name matches the criteria patterns.
    /// Returns true if no patterns are specified or if name matches any pattern.
    pub fn accept(&self, sheet_name: &str) -> bool {
        self.sheet_name_patterns
            .as_ref()
            .map(|patterns| patterns.iter().any(|pattern| pattern.matches(sheet_name)))
            .unwrap_or(true)
    }

    /// Walks sheet names in workbook order, yielding the accepted ones up to the sheet limit.
    pub(crate) fn select<'a, T, F>(&self, sheets: &'a [T], name: F) -> Vec<&'a T>
    where
        F: Fn(&T) -> &str,
    {
        sheets
            .iter()
            .filter(|sheet| self.accept(name(sheet)))
            .take(self.sheet_limit.unwrap_or(usize::MAX))
            .collect()
    }
}
