//! Delimited text exports (.csv, .tsv, .txt)
use crate::error::IngestError;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::sheet::SheetData;
use crate::spreadsheet::Format;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use encoding_rs::Encoding;
use encoding_rs::UTF_8;
use std::borrow::Cow;

/// Name of the single synthetic sheet a delimited file produces
pub(crate) const CSV_SHEET_NAME: &str = "CSV";

/// Candidate delimiters, in tie-break order
const DELIMITERS: [char; 4] = [',', '\t', ';', '|'];

/// Delimited text file held in memory
pub(crate) struct CsvSpreadsheet<'a> {
    name: String,
    bytes: &'a [u8],
}

impl<'a> CsvSpreadsheet<'a> {
    pub(crate) fn open(file_name: &str, bytes: &'a [u8]) -> Self {
        CsvSpreadsheet {
            name: file_name.to_owned(),
            bytes,
        }
    }
}

impl Spreadsheet for CsvSpreadsheet<'_> {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn format(&self) -> Format {
        Format::Csv
    }

    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<SheetData>, IngestError> {
        let content = decode(self.bytes, criteria.fallback_codepage)?;
        let lines = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>();
        let delimiter = sniff_delimiter(&lines, criteria.delimiter_sample_lines);
        tracing::debug!(file = %self.name, lines = lines.len(), delimiter = ?delimiter, "parsed delimited text");

        let mut sheet = Sheet::new(CSV_SHEET_NAME, criteria);
        for line in lines {
            sheet.push_row(split_fields(line, delimiter));
        }
        Ok(vec![sheet.finish()])
    }
}

/// Decodes text by byte-order mark (UTF-8, UTF-16LE, UTF-16BE), then as UTF-8
/// when the bytes are valid, else with the fallback Windows code page.
pub(crate) fn decode(bytes: &[u8], fallback_codepage: u16) -> Result<Cow<'_, str>, IngestError> {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let (content, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return Ok(content);
    }
    if let Some(content) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        return Ok(content);
    }
    let encoding = codepage::to_encoding(fallback_codepage)
        .ok_or(SpreadsheetError::UnsupportedCodepage(fallback_codepage))?;
    let (content, _) = encoding.decode_without_bom_handling(bytes);
    Ok(content)
}

/// Picks the delimiter whose per-line field count has the highest median over
/// the sampled lines, breaking ties by the lowest variance around that median.
/// A median of one field means the delimiter is absent; comma is the default.
pub(crate) fn sniff_delimiter(lines: &[&str], sample_lines: usize) -> char {
    let sample = &lines[..lines.len().min(sample_lines)];
    if sample.is_empty() {
        return ',';
    }
    let mut candidates = DELIMITERS
        .iter()
        .map(|delimiter| {
            let counts = sample
                .iter()
                .map(|line| line.split(*delimiter).count())
                .collect::<Vec<_>>();
            let mut sorted = counts.clone();
            sorted.sort_unstable();
            let median = sorted[sorted.len() / 2];
            let variance = counts
                .iter()
                .map(|count| (*count as f64 - median as f64).powi(2))
                .sum::<f64>()
                / counts.len() as f64;
            (*delimiter, median, variance)
        })
        .filter(|(_, median, _)| *median > 1)
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.total_cmp(&b.2)));
    candidates.first().map(|(delimiter, _, _)| *delimiter).unwrap_or(',')
}

/// Splits a line on the delimiter, trimming fields and unquoting
/// `"..."` fields with doubled quotes collapsed.
pub(crate) fn split_fields(line: &str, delimiter: char) -> Vec<CellValue> {
    line.split(delimiter)
        .map(|field| {
            let field = field.trim();
            match field.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
                Some(quoted) => CellValue::from(quoted.replace("\"\"", "\"").as_str()),
                None => CellValue::from(field),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(bytes: &[u8]) -> SheetData {
        let mut csv = CsvSpreadsheet::open("holdings.csv", bytes);
        let mut sheets = csv.read_sheets(&Criteria::default()).unwrap();
        assert_eq!(sheets.len(), 1);
        sheets.remove(0)
    }

    #[test]
    fn semicolon_beats_inconsistent_commas() {
        let lines = [
            "Name;Qty;Price;Value;Note",
            "Tata, Ltd;10;1,200.50;12,005;ok",
            "Infosys;5;1500;7500;x",
            "HDFC Bank;7;1,600;11,200;y, z",
        ];
        assert_eq!(sniff_delimiter(&lines, 20), ';');
    }

    #[test]
    fn delimiter_defaults_and_ties() {
        assert_eq!(sniff_delimiter(&["single column", "another"], 20), ',');
        assert_eq!(sniff_delimiter(&[], 20), ',');
        assert_eq!(sniff_delimiter(&["a\tb\tc", "d\te\tf"], 20), '\t');
        assert_eq!(sniff_delimiter(&["a|b,c", "d|e,f"], 20), ',');
    }

    #[test]
    fn unquotes_fields() {
        let fields = split_fields(r#" "Reliance ""RIL""" , 10 ,"", plain "#, ',');
        assert_eq!(fields, vec![
            CellValue::from("Reliance \"RIL\""),
            CellValue::from("10"),
            CellValue::Empty,
            CellValue::from("plain"),
        ]);
    }

    #[test]
    fn reads_utf8_bom_and_skips_blank_lines() {
        let sheet = read(b"\xEF\xBB\xBFStock,Qty\r\n\r\nTCS,5\r\n   \r\n");
        assert_eq!(sheet.name, CSV_SHEET_NAME);
        assert_eq!(sheet.grid.height(), 2);
        assert_eq!(sheet.grid.get(0, 0), Some(&CellValue::from("Stock")));
        assert_eq!(sheet.grid.get(1, 1), Some(&CellValue::from("5")));
        assert!(sheet.merges.is_empty());
    }

    #[test]
    fn reads_utf16le() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Name\tQty\nITC\t3\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let sheet = read(&bytes);
        assert_eq!(sheet.grid.get(1, 0), Some(&CellValue::from("ITC")));
    }

    #[test]
    fn falls_back_to_codepage() {
        assert_eq!(decode(b"Soci\xe9t\xe9", 1252).unwrap(), "Société");
        assert_eq!(decode("₹ 100".as_bytes(), 1252).unwrap(), "₹ 100");
        assert!(decode(b"\xe9", 1).is_err());
    }
}
