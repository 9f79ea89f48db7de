//! # Column roles
//!
//! Scores every normalized header against each semantic role from keyword
//! matches, column position and a sample of the parsed data, then assigns
//! roles greedily in priority order so no header serves two roles.
use crate::inference::normalize::compact;
use crate::inference::normalize::detect_number;
use crate::inference::normalize::parse_number;
use crate::inference::rows::ParsedRow;
use crate::spreadsheet::cell::CellValue;
use serde::Serialize;
use std::fmt::Display;

/// Score a column must exceed to be assigned a role.
pub const MIN_ROLE_SCORE: f64 = 20.0;

/// Spreadsheet serials in this range are treated as dates.
const DATE_SERIAL_RANGE: std::ops::RangeInclusive<f64> = 30000.0..=60000.0;

/// Share of date-like samples that rules a column out of the numeric roles.
const DATE_VETO_RATIO: f64 = 0.5;

/// Semantic meaning of a holdings column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Instrument,
    Quantity,
    PurchasePrice,
    MarketPrice,
}

impl Role {
    /// Assignment priority.
    pub const ALL: [Role; 4] = [Role::Instrument, Role::Quantity, Role::PurchasePrice, Role::MarketPrice];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Instrument => "instrument",
            Role::Quantity => "quantity",
            Role::PurchasePrice => "purchase_price",
            Role::MarketPrice => "market_price",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Role::Instrument)
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Role::Instrument => &[
                "instrument", "security", "company", "name", "scrip", "stock", "particulars", "description", "asset",
                "equity", "share_name", "stock_name", "company_name", "identifier", "description_of_security",
                "script", "trading_symbol", "symbol", "ticker",
            ],
            Role::Quantity => &[
                "qty", "quantity", "units", "shares", "nos", "number", "volume", "holding", "balance",
                "available_qty", "total_qty", "current_qty", "position", "size", "lot_size", "closing_balance",
            ],
            Role::PurchasePrice => &[
                "price", "rate", "cost", "avg", "average", "buy", "purchase", "entry", "acquisition", "buy_price",
                "purchase_rate", "avg_cost", "average_price", "book_value", "cost_price", "unit_cost",
                "investment_price", "avg_rate", "acq_price",
            ],
            Role::MarketPrice => &[
                "ltp", "market_price", "current_price", "last_price", "close_price", "market_rate", "cmp",
                "last_traded_price", "live_price", "valuation_price", "market_val", "closing_price", "price_as_on",
            ],
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header assigned to each role; unassigned roles are omitted when serialized.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ColumnRoles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_price: Option<String>,
}

impl ColumnRoles {
    pub fn get(&self, role: Role) -> Option<&str> {
        match role {
            Role::Instrument => self.instrument.as_deref(),
            Role::Quantity => self.quantity.as_deref(),
            Role::PurchasePrice => self.purchase_price.as_deref(),
            Role::MarketPrice => self.market_price.as_deref(),
        }
    }

    fn slot(&mut self, role: Role) -> &mut Option<String> {
        match role {
            Role::Instrument => &mut self.instrument,
            Role::Quantity => &mut self.quantity,
            Role::PurchasePrice => &mut self.purchase_price,
            Role::MarketPrice => &mut self.market_price,
        }
    }

    /// Assigned `(role, header)` pairs in priority order.
    pub fn assigned(&self) -> impl Iterator<Item = (Role, &str)> {
        Role::ALL.into_iter().filter_map(|role| self.get(role).map(|header| (role, header)))
    }
}

/// Value shape counts over the first sampled rows of one column.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ColumnProfile {
    pub non_blank: usize,
    pub numeric: usize,
    pub strings: usize,
    pub currency: usize,
    pub date_like: usize,
}

impl ColumnProfile {
    pub fn sample(header: &str, rows: &[ParsedRow], sample_rows: usize) -> Self {
        let mut profile = ColumnProfile::default();
        for value in rows.iter().take(sample_rows).map(|row| row.get(header)) {
            if value.is_blank() {
                continue;
            }
            profile.non_blank += 1;
            let text = value.as_text();
            let text = text.trim();
            if text.contains('₹') || text.contains('$') || (text.contains(',') && parse_number(&text.replace(',', "")).is_some()) {
                profile.currency += 1;
            }
            match number_of(value, text) {
                Some(number) => {
                    profile.numeric += 1;
                    if DATE_SERIAL_RANGE.contains(&number) {
                        profile.date_like += 1;
                    }
                }
                None => profile.strings += 1,
            }
        }
        profile
    }

    fn ratio(&self, count: usize) -> f64 {
        if self.non_blank == 0 {
            0.0
        } else {
            count as f64 / self.non_blank as f64
        }
    }

    pub fn numeric_ratio(&self) -> f64 {
        self.ratio(self.numeric)
    }

    pub fn string_ratio(&self) -> f64 {
        self.ratio(self.strings)
    }

    pub fn currency_ratio(&self) -> f64 {
        self.ratio(self.currency)
    }

    pub fn date_ratio(&self) -> f64 {
        self.ratio(self.date_like)
    }

    /// Mostly spreadsheet date serials
    pub fn is_date_column(&self) -> bool {
        self.non_blank > 0 && self.date_ratio() >= DATE_VETO_RATIO
    }
}

fn number_of(value: &CellValue, text: &str) -> Option<f64> {
    match value {
        CellValue::Number(number) => Some(*number),
        _ => detect_number(text),
    }
}

/// Score of one header for one role, with the reasons behind it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleScore {
    pub header: String,
    pub score: f64,
    pub reasons: Vec<String>,
    /// Excluded from assignment whatever the score
    pub vetoed: bool,
}

/// Every header scored for one role and the header that won it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCandidates {
    pub role: Role,
    pub assigned: Option<String>,
    pub candidates: Vec<RoleScore>,
}

/// Keyword and position part of the score.
fn score_keywords(header: &str, index: usize, role: Role, score: &mut f64, reasons: &mut Vec<String>) {
    let norm = compact(header);
    if role.is_numeric() && ["date", "time", "folio"].iter().any(|word| norm.contains(word)) {
        *score -= 80.0;
        reasons.push("date_time_folio_penalty:-80".to_owned());
    }
    if !norm.is_empty() {
        for keyword in role.keywords() {
            let keyword_norm = compact(keyword);
            if norm == keyword_norm {
                *score += 60.0;
                reasons.push(format!("exact_keyword={keyword}:+60"));
            } else if norm.contains(keyword_norm.as_str()) {
                let bonus = 20.0 + keyword_norm.len() as f64 / norm.len() as f64 * 20.0;
                *score += bonus;
                reasons.push(format!("partial_keyword={keyword}:+{bonus:.1}"));
            } else if norm.len() > 2 && keyword_norm.contains(norm.as_str()) {
                *score += 15.0;
                reasons.push(format!("reverse_keyword={keyword}:+15"));
            }
        }
    }
    if role == Role::Instrument {
        if index < 2 {
            *score += 15.0;
            reasons.push(format!("position={index}:+15"));
        }
        if index < 5 {
            *score += 5.0;
            reasons.push(format!("position_top5={index}:+5"));
        }
    }
}

/// Data part of the score; returns true when the column is vetoed.
fn score_profile(role: Role, profile: &ColumnProfile, score: &mut f64, reasons: &mut Vec<String>) -> bool {
    if profile.non_blank == 0 {
        return false;
    }
    reasons.push(format!(
        "data numeric={:.2} string={:.2} date={:.2} currency={:.2}",
        profile.numeric_ratio(),
        profile.string_ratio(),
        profile.date_ratio(),
        profile.currency_ratio()
    ));

    if !role.is_numeric() {
        let string_ratio = profile.string_ratio();
        let points = if string_ratio > 0.8 {
            40.0
        } else if string_ratio > 0.5 {
            10.0
        } else {
            -50.0
        };
        *score += points;
        reasons.push(format!("string_ratio:{points:+}"));
        return false;
    }

    let numeric_ratio = profile.numeric_ratio();
    let points = if numeric_ratio > 0.8 {
        30.0
    } else if numeric_ratio > 0.4 {
        10.0
    } else {
        -40.0
    };
    *score += points;
    reasons.push(format!("numeric_ratio:{points:+}"));
    if profile.currency_ratio() > 0.2 {
        *score += 15.0;
        reasons.push("currency:+15".to_owned());
    }
    if profile.is_date_column() {
        *score -= 100.0;
        reasons.push("date_column_veto:-100".to_owned());
        return true;
    }
    false
}

/// Scores `header`, at column `index`, for `role`.
pub fn score_column(header: &str, index: usize, role: Role, profile: &ColumnProfile) -> RoleScore {
    let mut score = 0.0;
    let mut reasons = Vec::new();
    score_keywords(header, index, role, &mut score, &mut reasons);
    let vetoed = score_profile(role, profile, &mut score, &mut reasons);
    RoleScore { header: header.to_owned(), score, reasons, vetoed }
}

/// Roles chosen for a sheet and the full scoring trace behind them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoleAssignment {
    pub roles: ColumnRoles,
    pub candidates: Vec<RoleCandidates>,
}

/// Assigns roles in priority order. For each role the highest score above
/// [`MIN_ROLE_SCORE`] wins, the leftmost column on ties, and headers taken by
/// an earlier role are not considered again.
pub fn identify_column_roles(headers: &[String], rows: &[ParsedRow], sample_rows: usize) -> RoleAssignment {
    let profiles = headers
        .iter()
        .map(|header| ColumnProfile::sample(header, rows, sample_rows))
        .collect::<Vec<_>>();
    let mut assignment = RoleAssignment::default();

    for role in Role::ALL {
        let candidates = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !assignment.roles.assigned().any(|(_, taken)| taken == header.as_str()))
            .map(|(index, header)| score_column(header, index, role, &profiles[index]))
            .collect::<Vec<_>>();

        let mut best: Option<&RoleScore> = None;
        for candidate in candidates.iter().filter(|candidate| !candidate.vetoed && candidate.score > MIN_ROLE_SCORE) {
            match best {
                Some(best) if candidate.score <= best.score => {}
                _ => best = Some(candidate),
            }
        }
        let assigned = best.map(|best| best.header.to_owned());
        match &assigned {
            Some(header) => tracing::debug!(role = %role, header = %header, "role assigned"),
            None => tracing::debug!(role = %role, "role left unassigned"),
        }
        *assignment.roles.slot(role) = assigned.clone();
        assignment.candidates.push(RoleCandidates { role, assigned, candidates });
    }
    assignment
}
