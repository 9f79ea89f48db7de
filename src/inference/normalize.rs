//! Text cleanup shared by the heuristics, and header key normalization.
use crate::spreadsheet::cell::CellValue;
use std::collections::HashMap;
use std::collections::HashSet;

/// Space-like characters, including zero-width ones, that exports leak into cells
fn is_space_variant(character: char) -> bool {
    matches!(
        character,
        '\u{00A0}' | '\u{1680}' | '\u{180E}' | '\u{2000}'..='\u{200B}' | '\u{202F}' | '\u{205F}' | '\u{3000}' | '\u{FEFF}'
    )
}

/// Replaces space variants with plain spaces, trims and collapses whitespace runs.
pub fn clean_text(text: &str) -> String {
    let replaced = text
        .chars()
        .map(|character| if is_space_variant(character) { ' ' } else { character })
        .collect::<String>();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`clean_text`] of a cell's textual form; absent cells are empty.
pub fn cell_text(value: &CellValue) -> String {
    clean_text(&value.as_text())
}

/// Lowercase ASCII alphanumerics only, the form keyword lists are compared in.
pub(crate) fn compact(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|character| character.is_ascii_lowercase() || character.is_ascii_digit())
        .collect()
}

/// Converts header text into a snake_case key: `"Buy / Sell"` becomes `buy_sell`.
pub fn normalize_key(text: &str) -> String {
    let lowered = clean_text(text).to_lowercase();
    let mut key = String::with_capacity(lowered.len());
    for character in lowered.chars() {
        let character = if character == ' ' || character == '/' { '_' } else { character };
        if !(character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_') {
            continue;
        }
        if character == '_' && key.ends_with('_') {
            continue;
        }
        key.push(character);
    }
    key.trim_matches('_').to_owned()
}

/// Makes keys unique left to right. Blank keys become `col_N` (1-based) and
/// repeats get `_2`, `_3`, ... skipping any suffix that is already taken.
pub fn ensure_unique(keys: Vec<String>) -> Vec<String> {
    let mut taken = HashSet::<String>::with_capacity(keys.len());
    let mut counters = HashMap::<String, usize>::new();
    keys.into_iter()
        .enumerate()
        .map(|(index, key)| {
            let base = if key.is_empty() { format!("col_{}", index + 1) } else { key };
            let mut unique = base.to_owned();
            while taken.contains(&unique) {
                let counter = counters.entry(base.to_owned()).or_insert(1);
                *counter += 1;
                unique = format!("{base}_{counter}");
            }
            taken.insert(unique.to_owned());
            unique
        })
        .collect()
}

/// Parses a plain decimal number. Requires a digit and a finite result, so
/// `inf`, `NaN` and empty strings are rejected.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if !text.bytes().any(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse::<f64>().ok().filter(|number| number.is_finite())
}

/// Number a detection heuristic sees in a cell once `%`, `$` and `,` are stripped.
pub(crate) fn detect_number(text: &str) -> Option<f64> {
    let stripped = text
        .chars()
        .filter(|character| !matches!(character, '%' | '$' | ','))
        .collect::<String>();
    parse_number(&stripped)
}
