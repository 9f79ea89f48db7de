//! Microsoft Office Open XML helpers
use crate::error::IngestError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Cursor;
use zip::ZipArchive;

/// XML tag name for relationship elements in Excel files
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Compound File Binary signature shared by legacy .xls files and
/// password-protected OOXML packages
const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

pub(crate) type ExcelArchive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Opens an in-memory OOXML package and loads its workbook metadata
///
/// # Returns
/// Tuple containing:
/// - Zip archive handle
/// - Number format mappings indexed by style id
/// - List of sheet names and their part paths
pub(super) fn open<'a, W, F>(file_name: &str, bytes: &'a [u8], load_workbook: W, load_number_formats: F) -> Result<(
    ExcelArchive<'a>,
    Vec<CellType>,
    Vec<(String, String)>
), IngestError>
where
    W: Fn(&mut ExcelArchive<'a>) -> Result<(Vec<(String, String)>, bool), IngestError>,
    F: Fn(&mut ExcelArchive<'a>, bool) -> Result<Vec<CellType>, IngestError>,
{
    if is_ole_container(bytes) {
        Err(SpreadsheetError::OleContainerError(file_name.to_owned()))?;
    }

    let mut zip = ZipArchive::new(Cursor::new(bytes))?;
    let (sheets, is_1904) = load_workbook(&mut zip)?;
    if sheets.is_empty() {
        Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?
    }

    let number_formats = load_number_formats(&mut zip, is_1904)?;
    Ok((zip, number_formats, sheets))
}

/// Loads the worksheet relationships of the workbook part, mapping
/// relationship ids to part paths
pub(super) fn load_relationships(zip: &mut ExcelArchive<'_>, path: &str) -> Result<HashMap<String, String>, IngestError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::MissingPartError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Maps each cell style's number format to a cell type, preferring
/// workbook-defined formats over the built-in ids
pub(super) fn load_number_formats(format_indexes: Vec<String>, custom_formats: HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Normalizes a relationship target to a path inside the package
pub(crate) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(absolute) = path.strip_prefix('/') {
        absolute.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Checks for the compound file signature
pub(crate) fn is_ole_container(bytes: &[u8]) -> bool {
    bytes.starts_with(&OLE_SIGNATURE)
}
