//! XML pull-parsing utilities shared by the XLSX and ODS workbook readers.

use crate::error::IngestError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while interpreting workbook XML content
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown XML entity '&{0};'")]
    ParseEntityError(String),

    #[error("Cannot parse attribute value '{0}'")]
    ParseAttributeValueError(String),
}

/// Streaming XML reader that reuses one event buffer for the whole document
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a reader configured for workbook parts: empty elements are
    /// expanded so `<c/>` produces a start and an end event, and text is kept
    /// verbatim because leading spaces in cells are significant.
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        XmlReader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Reads the next event, `None` at end of document
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, IngestError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(IngestError::XmlError(error)),
        }
    }
}

/// Value extraction for a single XML attribute
pub(crate) trait XmlAttributeHelper<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, IngestError>;

    fn parse_value<T: FromStr>(&self) -> Result<T, IngestError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, IngestError> {
        Ok(self.unescape_value()?)
    }

    fn parse_value<T: FromStr>(&self) -> Result<T, IngestError> {
        self.get_value()?
            .parse()
            .map_err(|_| match std::str::from_utf8(&self.value) {
                Ok(value) => IngestError::XmlHelperError(XmlError::ParseAttributeValueError(value.to_string())),
                Err(error) => IngestError::StringEncodingError(error),
            })
    }
}

/// Attribute lookup on element start tags
pub(crate) trait XmlNodeHelper<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, IngestError>;

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, IngestError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, IngestError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.get_value())
            .transpose()
    }

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, IngestError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.parse_value())
            .transpose()
    }
}

/// Accumulates cell text from text events and entity references
pub(crate) trait XmlTextContextHelper {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), IngestError>;

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), IngestError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), IngestError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    /// Resolves `&amp;`-style entities and `&#8377;`/`&#x20B9;` character references
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), IngestError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)?
            } else {
                number.parse::<u32>()?
            };
            if let Some(character) = char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }
        Ok(())
    }
}

/// Drives an [`XmlReader`] to the end of the document, dispatching each event
/// to the given match arms; unmatched events are ignored.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_text_and_references() {
        let mut reader = XmlReader::new("<t>Tata &amp; Sons &#8377;&#x20;</t>".as_bytes());
        let mut text = String::new();
        let result: Result<(), IngestError> = (|| {
            match_xml_events!(reader => {
                Event::Text(event) => text.push_bytes_text(&event)?,
                Event::GeneralRef(event) => text.push_bytes_ref(&event)?,
            });
            Ok(())
        })();
        assert!(result.is_ok());
        assert_eq!(text, "Tata & Sons ₹ ");
    }

    #[test]
    fn parses_attributes() {
        let mut reader = XmlReader::new(r#"<c r="B3" n="12"/>"#.as_bytes());
        let mut reference = None;
        let mut number = None;
        let result: Result<(), IngestError> = (|| {
            match_xml_events!(reader => {
                Event::Start(event) => {
                    reference = event.get_attribute_value("r")?.map(|value| value.to_string());
                    number = event.parse_attribute_value::<usize>("n")?;
                }
            });
            Ok(())
        })();
        assert!(result.is_ok());
        assert_eq!(reference.as_deref(), Some("B3"));
        assert_eq!(number, Some(12));
    }
}
