use crate::inference::roles::score_column;
use crate::inference::roles::ColumnProfile;
use crate::inference::roles::Role;
use crate::inference::rows::ParsedRow;

/// Header words that never name the instrument column.
const IGNORED_WORDS: [&str; 11] = ["date", "time", "remarks", "comment", "sr", "no", "serial", "index", "id", "type", "status"];

const IGNORED_PENALTY: f64 = -50.0;

/// Columns inspected by the string-density fallback.
const FALLBACK_COLUMNS: usize = 5;

const FALLBACK_STRING_RATIO: f64 = 0.7;

/// True when `key` is an ignored word or carries one as a `_`-separated part.
fn is_ignored(key: &str) -> bool {
    let key = key.to_lowercase();
    IGNORED_WORDS
        .iter()
        .any(|word| key == *word || key.contains(&format!("_{word}")) || key.contains(&format!("{word}_")))
}

/// Picks the header holding instrument names when nothing else is needed.
///
/// Uses the instrument role score with ignored words as a veto, accepting a
/// positive best score. Otherwise falls back to the first of the leading five
/// non-ignored columns whose sample is mostly text, then to the first header.
pub fn determine_instrument_column(headers: &[String], rows: &[ParsedRow], sample_rows: usize) -> String {
    let profiles = headers
        .iter()
        .map(|header| ColumnProfile::sample(header, rows, sample_rows))
        .collect::<Vec<_>>();

    let mut best: Option<(usize, f64)> = None;
    for (index, header) in headers.iter().enumerate() {
        let mut score = score_column(header, index, Role::Instrument, &profiles[index]).score;
        if is_ignored(header) {
            score += IGNORED_PENALTY;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }
    if let Some((index, score)) = best.filter(|(_, score)| *score > 0.0) {
        tracing::debug!(header = %headers[index], score, "instrument column scored");
        return headers[index].to_owned();
    }

    let fallback = headers
        .iter()
        .zip(profiles.iter())
        .take(FALLBACK_COLUMNS)
        .find(|(header, profile)| {
            !is_ignored(header) && profile.non_blank > 0 && profile.string_ratio() > FALLBACK_STRING_RATIO
        })
        .map(|(header, _)| header.to_owned());
    match fallback {
        Some(header) => {
            tracing::debug!(header = %header, "instrument column from text density");
            header
        }
        None => headers.first().cloned().unwrap_or_else(|| "col_1".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellValue;
    use std::collections::BTreeMap;

    fn rows(headers: &[&str], data: &[Vec<CellValue>]) -> Vec<ParsedRow> {
        data.iter()
            .enumerate()
            .map(|(row_index, values)| ParsedRow {
                row_index,
                fields: headers.iter().map(|header| header.to_string()).zip(values.iter().cloned()).collect::<BTreeMap<_, _>>(),
            })
            .collect()
    }

    fn keys(headers: &[&str]) -> Vec<String> {
        headers.iter().map(|header| header.to_string()).collect()
    }

    #[test]
    fn ignored_words() {
        assert!(is_ignored("sr_no"));
        assert!(is_ignored("status"));
        assert!(is_ignored("trade_date"));
        assert!(is_ignored("isin_id"));
        assert!(!is_ignored("stock_name"));
        assert!(!is_ignored("notes"));
    }

    #[test]
    fn prefers_named_column() {
        let headers = ["sr_no", "scrip", "qty"];
        let data = rows(
            &headers,
            &[vec![1.0.into(), "INFY".into(), 10.0.into()], vec![2.0.into(), "TCS".into(), 5.0.into()]],
        );
        assert_eq!(determine_instrument_column(&keys(&headers), &data, 30), "scrip");
    }

    #[test]
    fn ignored_text_column_loses_to_plain_text() {
        let headers = ["status", "col_2", "col_3"];
        let data = rows(
            &headers,
            &[
                vec!["Active".into(), 1.0.into(), "Infosys".into()],
                vec!["Active".into(), 2.0.into(), "TCS".into()],
            ],
        );
        assert_eq!(determine_instrument_column(&keys(&headers), &data, 30), "col_3");
    }

    #[test]
    fn falls_back_to_first_header() {
        let headers = ["status", "amount"];
        let data = rows(&headers, &[vec![1.0.into(), 2.0.into()]]);
        assert_eq!(determine_instrument_column(&keys(&headers), &data, 30), "status");
        assert_eq!(determine_instrument_column(&[], &[], 30), "col_1");
    }
}
