use thiserror::Error;

/// Main error type for the ingestion pipeline.
/// Aggregates errors from the standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    OdsError(#[from] crate::spreadsheet::ods::OdsError),

    #[error("{0}")]
    RangeError(#[from] crate::spreadsheet::range::RangeError),

    // Inference module errors
    #[error("{0}")]
    InferenceError(#[from] crate::inference::InferenceError),
}

impl IngestError {
    /// True when the input could not be decoded as a workbook or CSV at all.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::WithContextError(_)
                | Self::IoError(_)
                | Self::ParseIntError(_)
                | Self::ParseFloatError(_)
                | Self::StringEncodingError(_)
                | Self::ZipError(_)
                | Self::XmlError(_)
                | Self::XmlEncodingError(_)
                | Self::XmlAttributeError(_)
                | Self::XmlHelperError(_)
                | Self::SpreadsheetError(_)
                | Self::OdsError(_)
                | Self::RangeError(_)
        )
    }

    /// True when a sheet decoded fine but held no usable table.
    pub fn is_empty_sheet(&self) -> bool {
        matches!(self, Self::InferenceError(_))
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, IngestError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| match e {
            // Keep the taxonomy intact, context only wraps decode failures
            IngestError::InferenceError(_) => e,
            _ => IngestError::WithContextError(format!("{}: {}", message, e)),
        })
    }
}
