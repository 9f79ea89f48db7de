use crate::error::IngestError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::range::MergeRange;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::sheet::SheetData;
use crate::spreadsheet::Format;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Cursor;
use std::io::Read;
use thiserror::Error;
use zip::ZipArchive;

/// ODS file MIME type identifier
const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
/// XML element name for spreadsheet root
const SPREADSHEET: QName = QName(b"office:spreadsheet");
/// XML element name for table (sheet)
const TABLE: QName = QName(b"table:table");
const TABLE_ROW: QName = QName(b"table:table-row");
const TABLE_CELL: QName = QName(b"table:table-cell");
/// XML element name for cells hidden under a spanned cell
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// XML element name for annotations (comments)
const ANNOTATION: QName = QName(b"office:annotation");
const PARAGRAPH: QName = QName(b"text:p");
/// XML element name for runs of spaces
const STRING: QName = QName(b"text:s");

/// Error types specific to ODS spreadsheet processing
#[derive(Error, Debug)]
pub enum OdsError {
    #[error("Invalid ODS MIME type")]
    MimeTypeError,

    #[error("Missing content.xml")]
    MissingContentError,
}

type OdsArchive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// OpenDocument spreadsheet held in memory
pub(crate) struct OdsSpreadsheet<'a> {
    pub(crate) name: String,
    zip: OdsArchive<'a>,
}

impl<'a> OdsSpreadsheet<'a> {
    /// Opens the package, validating its MIME type and rejecting encrypted content
    pub(crate) fn open(file_name: &str, bytes: &'a [u8]) -> Result<Self, IngestError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        check_mime(&mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::EncryptedWorkbookError(file_name.to_owned()))?;
        }
        Ok(OdsSpreadsheet {
            name: file_name.to_owned(),
            zip,
        })
    }
}

impl Spreadsheet for OdsSpreadsheet<'_> {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn format(&self) -> Format {
        Format::Ods
    }

    /// Reads the selected tables of `content.xml`. Repeated rows and columns
    /// are expanded only up to the grid caps, spanned cells become merges.
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<SheetData>, IngestError> {
        let mut sheets = Vec::<SheetData>::new();
        let mut reader = self.zip
            .xml_reader("content.xml")?
            .ok_or(OdsError::MissingContentError)?;

        let mut current = None::<Sheet>;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut row_count = 1usize;
        let mut col_count = 1usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut element_context = false; // reading paragraph text of the cell
        let mut comment_context = false; // inside an annotation
        match_xml_events!(reader => {
            Event::End(event) if event.name() == SPREADSHEET => break,
            Event::Start(event) if current.is_none() && event.name() == TABLE => {
                let sheet_name = event.get_attribute_value("table:name")?.unwrap_or_default().to_string();
                if criteria.sheet_limit.map(|limit| sheets.len() >= limit).unwrap_or(false) {
                    break;
                } else if criteria.accept(&sheet_name) {
                    current = Some(Sheet::new(&sheet_name, criteria));
                    row = 0;
                } else {
                    match_xml_events!(reader => {
                        Event::End(event) if event.name() == TABLE => break,
                    });
                }
            }
            Event::End(event) if event.name() == TABLE => {
                if let Some(sheet) = current.take() {
                    sheets.push(sheet.finish());
                }
            }
            Event::Start(event) if current.is_some() && event.name() == TABLE_ROW => {
                row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if event.name() == TABLE_ROW => {
                row = row.saturating_add(row_count);
                let past_cap = current.as_ref().map(|sheet| sheet.after_row_upper_bound(row)).unwrap_or(false);
                if past_cap {
                    match_xml_events!(reader => {
                        Event::End(event) if event.name() == TABLE => break,
                    });
                    if let Some(sheet) = current.take() {
                        sheets.push(sheet.finish());
                    }
                }
            }
            Event::Start(event) if current.is_some() && (event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL) => {
                value.clear();
                col_count = event.parse_attribute_value::<usize>("table:number-columns-repeated")?.unwrap_or(1);
                let rows_spanned = event.parse_attribute_value::<usize>("table:number-rows-spanned")?.unwrap_or(1);
                let cols_spanned = event.parse_attribute_value::<usize>("table:number-columns-spanned")?.unwrap_or(1);
                if let Some(sheet) = current.as_mut() {
                    if rows_spanned > 1 || cols_spanned > 1 {
                        sheet.push_merge(MergeRange::new(
                            row,
                            col,
                            row.saturating_add(rows_spanned - 1),
                            col.saturating_add(cols_spanned - 1),
                        ));
                    }
                }

                let is_error = event.get_attribute_value("calcext:value-type")?.map(|cow| cow == "error").unwrap_or(false);
                kind = CellType::Empty;
                if let Some(value_type) = event.get_attribute_value("office:value-type")? {
                    match value_type.as_ref() {
                        "string" => {
                            kind = if is_error { CellType::Error } else { CellType::InlineString };
                            element_context = true;
                        }
                        "boolean" => {
                            kind = CellType::Boolean;
                            let truthy = event.get_attribute_value("office:boolean-value")?
                                .map(|cow| cow != "false" && cow != "0")
                                .unwrap_or(false);
                            value.push_str(if truthy { "1" } else { "0" });
                        }
                        "date" => if let Some(data) = event.get_attribute_value("office:date-value")? {
                            kind = CellType::IsoDateTime;
                            value.push_str(&data);
                        }
                        "time" => if let Some(data) = event.get_attribute_value("office:time-value")? {
                            kind = CellType::IsoDuration;
                            value.push_str(&data);
                        }
                        _ => if let Some(data) = event.get_attribute_value("office:value")? {
                            kind = CellType::Number;
                            value.push_str(&data);
                        }
                    }
                }
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                if let Some(sheet) = current.as_mut() {
                    if kind != CellType::Empty && !value.is_empty() {
                        for row_offset in 0..row_count {
                            let row_number = row.saturating_add(row_offset);
                            if sheet.after_row_upper_bound(row_number) {
                                break;
                            }
                            for col_offset in 0..col_count {
                                let col_number = col.saturating_add(col_offset);
                                if sheet.after_col_upper_bound(col_number) {
                                    break;
                                }
                                sheet.push(Cell {
                                    row: row_number,
                                    col: col_number,
                                    kind,
                                    value: value.to_owned(),
                                });
                            }
                        }
                    }
                }
                col = col.saturating_add(col_count);
                kind = CellType::Empty;
                element_context = false;
                comment_context = false;
            }
            Event::Start(event) if element_context && event.name() == ANNOTATION => comment_context = true,
            Event::End(event) if element_context && comment_context && event.name() == ANNOTATION => comment_context = false,
            Event::Start(event) if element_context && !comment_context && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if element_context && !comment_context && event.name() == STRING => {
                let count = event.parse_attribute_value("text:c")?.unwrap_or(1usize);
                for _ in 0..count.min(1024) {
                    value.push(' ');
                }
            }
            Event::Text(event) if element_context && !comment_context => value.push_bytes_text(&event)?,
            Event::GeneralRef(event) if element_context && !comment_context => value.push_bytes_ref(&event)?,
        });
        if let Some(sheet) = current.take() {
            sheets.push(sheet.finish());
        }

        Ok(sheets)
    }
}

/// Validates the `mimetype` part when present
fn check_mime(zip: &mut OdsArchive<'_>) -> Result<(), IngestError> {
    if let Some(mut file) = zip.file("mimetype")? {
        let mut buffer = Vec::with_capacity(MIME_TYPE.len());
        file.by_ref().take(MIME_TYPE.len() as u64 + 1).read_to_end(&mut buffer)?;
        if buffer.as_slice() != MIME_TYPE {
            Err(OdsError::MimeTypeError)?;
        }
    }
    Ok(())
}

/// Checks the manifest for `manifest:encryption-data` entries
fn is_password_protected(zip: &mut OdsArchive<'_>) -> Result<bool, IngestError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = true,
        Event::End(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == QName(b"manifest:encryption-data") => {
            return Ok(true);
        }
    });
    Ok(false)
}
