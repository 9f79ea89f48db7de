use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use iso8601_duration::Duration as IsoDuration;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt::Display;

/// Raw typing of a workbook cell, before it is turned into a [`CellValue`].
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values stored as `1`/`0` or `true`/`false`
    Boolean,
    /// Plain numeric values
    Number,
    /// Date or date/time serials counted from the 1900 epoch
    NumberDate1900,
    /// Time-of-day fractions from a 1900 workbook
    NumberTime1900,
    /// Date or date/time serials counted from the 1904 epoch
    NumberDate1904,
    /// Time-of-day fractions from a 1904 workbook
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// ISO 8601 duration strings (ODS time cells)
    IsoDuration,
    /// Literal text
    InlineString,
    /// Index into the workbook shared string table
    SharedString,
    /// Workbook error literal such as `#N/A`
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "14" | "15" | "16" | "17" | "22" => Some(Self::date(is_1904)),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::time(is_1904)),
            _ => None,
        }
    }

    /// Parses custom number format codes, looking for date/time tokens
    /// outside of literals, escapes and bracketed sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        if is_date {
            Self::date(is_1904)
        } else if is_time {
            Self::time(is_1904)
        } else {
            Self::Number
        }
    }

    fn date(is_1904: bool) -> Self {
        if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }
    }

    fn time(is_1904: bool) -> Self {
        if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }
    }
}

/// A raw cell as decoded from a workbook part.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    pub(crate) value: String,
}

impl Cell {
    /// Resolves the raw text into a typed value. Anything that fails to
    /// decode under its declared type is kept as text.
    pub(crate) fn to_value(&self) -> CellValue {
        let text = || CellValue::Text(self.value.to_owned());
        match self.kind {
            CellType::Empty => CellValue::Empty,
            CellType::Boolean => CellValue::Boolean(self.value == "1" || self.value.eq_ignore_ascii_case("true")),
            CellType::Number => self.value.trim().parse::<f64>().ok()
                .filter(|number| number.is_finite())
                .map(CellValue::Number)
                .unwrap_or_else(text),
            CellType::NumberDate1900 | CellType::NumberDate1904 => self.value.trim().parse::<f64>().ok()
                .and_then(|serial| serial_to_datetime(serial, self.kind == CellType::NumberDate1904))
                .map(CellValue::Date)
                .unwrap_or_else(text),
            CellType::NumberTime1900 | CellType::NumberTime1904 => self.value.trim().parse::<f64>().ok()
                .and_then(serial_to_time_string)
                .map(CellValue::Text)
                .unwrap_or_else(text),
            CellType::IsoDateTime => parse_iso_datetime(&self.value)
                .map(CellValue::Date)
                .unwrap_or_else(text),
            CellType::IsoDuration => duration_to_time_string(&self.value)
                .map(CellValue::Text)
                .unwrap_or_else(text),
            CellType::InlineString | CellType::SharedString | CellType::Error => text(),
        }
    }
}

/// A single grid cell: text, number, boolean, date or absent.
///
/// Serializes untagged, so an absent cell becomes `null` and a date becomes
/// an ISO-8601 string.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDateTime),
}

impl CellValue {
    /// True for absent cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Number(_) | CellValue::Boolean(_) | CellValue::Date(_) => false,
        }
    }

    /// Textual form used by the scoring heuristics; absent cells are empty.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::Text(text) => Cow::Borrowed(text.as_str()),
            CellValue::Empty => Cow::Borrowed(""),
            _ => Cow::Owned(self.to_string()),
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) => write!(f, "{text}"),
            CellValue::Number(number) => write!(f, "{number}"),
            CellValue::Boolean(boolean) => write!(f, "{boolean}"),
            CellValue::Date(datetime) if datetime.time() == chrono::NaiveTime::MIN => {
                write!(f, "{}", datetime.format("%Y-%m-%d"))
            }
            CellValue::Date(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_owned())
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// Converts a spreadsheet serial number to a date/time.
///
/// The 1900 system counts the phantom 1900-02-29, so serials below 60 are
/// shifted by one day.
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_465.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let milliseconds = (serial.fract() * 86_400_000f64).round() as i64;
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    epoch.checked_add_signed(Duration::days(days + offset))?
        .checked_add_signed(Duration::milliseconds(milliseconds))
}

/// Formats the fractional part of a serial as `HH:MM:SS`.
pub(crate) fn serial_to_time_string(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let total = (serial.fract() * 86_400f64).round() as i64;
    let (hours, rest) = (total / 3600, total % 3600);
    Some(format!("{:02}:{:02}:{:02}", hours, rest / 60, rest % 60))
}

fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn duration_to_time_string(value: &str) -> Option<String> {
    let duration = value.trim().parse::<IsoDuration>().ok()?;
    let seconds = (duration.hour as i64) * 3600 + (duration.minute as i64) * 60 + duration.second.round() as i64;
    Some(format!("{:02}:{:02}:{:02}", seconds / 3600, seconds % 3600 / 60, seconds % 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell { row: 0, col: 0, kind, value: value.to_owned() }
    }

    #[test]
    fn number_formats() {
        assert_eq!(CellType::parse_builtin_number_format_id("14", false), Some(CellType::NumberDate1900));
        assert_eq!(CellType::parse_builtin_number_format_id("20", true), Some(CellType::NumberTime1904));
        assert_eq!(CellType::parse_builtin_number_format_id("4", false), None);
        assert_eq!(CellType::parse_custom_number_format("dd/mm/yyyy", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("hh:mm", false), CellType::NumberTime1900);
        assert_eq!(CellType::parse_custom_number_format("[Red]#,##0.00", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("\"Qty\" 0", false), CellType::Number);
    }

    #[test]
    fn serial_dates() {
        let date = serial_to_datetime(45123.0, false).unwrap();
        assert_eq!(date.format("%Y-%m-%d").to_string(), "2023-07-16");
        let date = serial_to_datetime(0.0, true).unwrap();
        assert_eq!(date.format("%Y-%m-%d").to_string(), "1904-01-01");
        assert_eq!(serial_to_time_string(0.75).as_deref(), Some("18:00:00"));
        assert!(serial_to_datetime(f64::NAN, false).is_none());
    }

    #[test]
    fn typed_values() {
        assert_eq!(cell(CellType::Number, "10").to_value(), CellValue::Number(10.0));
        assert_eq!(cell(CellType::Number, "n/a").to_value(), CellValue::Text("n/a".to_owned()));
        assert_eq!(cell(CellType::Boolean, "1").to_value(), CellValue::Boolean(true));
        assert_eq!(cell(CellType::Error, "#N/A").to_value(), CellValue::Text("#N/A".to_owned()));
        assert_eq!(cell(CellType::IsoDuration, "PT09H30M00S").to_value(), CellValue::Text("09:30:00".to_owned()));
        assert_eq!(cell(CellType::IsoDateTime, "2024-03-31").to_value().to_string(), "2024-03-31");
    }

    #[test]
    fn blank_and_text() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::from("  ").is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
        assert_eq!(CellValue::Number(2000.0).as_text(), "2000");
        assert_eq!(CellValue::Number(12.5).as_text(), "12.5");
        assert_eq!(serde_json::to_string(&CellValue::Empty).unwrap(), "null");
        assert_eq!(serde_json::to_string(&CellValue::Number(10.0)).unwrap(), "10.0");
    }
}
