use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountingMethod {
    #[default]
    Fifo,
    Lifo,
    Average,
}

impl AccountingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountingMethod::Fifo => "fifo",
            AccountingMethod::Lifo => "lifo",
            AccountingMethod::Average => "average",
        }
    }
}

impl fmt::Display for AccountingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountingMethod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" => Ok(AccountingMethod::Fifo),
            "lifo" => Ok(AccountingMethod::Lifo),
            "average" | "avg" => Ok(AccountingMethod::Average),
            _ => Err(LedgerError::InvalidMethod(s.to_string())),
        }
    }
}

/// One recorded transaction. Positive `qty` is a buy, negative a sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub date: String,
    pub qty: f64,
    pub price_per_unit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Lot {
    pub fn new(date: impl Into<String>, qty: f64, price_per_unit: f64) -> Self {
        Self {
            date: date.into(),
            qty,
            price_per_unit,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Copy of this lot holding a different quantity. Used for transient
    /// fragments inside the calculators; stored lots are never split.
    pub fn with_qty(&self, qty: f64) -> Self {
        Self {
            qty,
            ..self.clone()
        }
    }

    pub fn is_buy(&self) -> bool {
        self.qty > 0.0
    }

    pub fn is_sell(&self) -> bool {
        self.qty < 0.0
    }

    pub fn cost(&self) -> f64 {
        self.qty.abs() * self.price_per_unit
    }
}

/// Every lot recorded for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBasisEntry {
    pub token_id: String,
    pub symbol: String,
    pub accounting_method: AccountingMethod,
    pub lots: Vec<Lot>,
}

impl CostBasisEntry {
    pub fn new(token_id: impl Into<String>, symbol: impl Into<String>, method: AccountingMethod) -> Self {
        Self {
            token_id: token_id.into(),
            symbol: symbol.into(),
            accounting_method: method,
            lots: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnLResult {
    pub token_id: String,
    pub symbol: String,
    pub total_qty: f64,
    pub current_price: f64,
    pub current_value: f64,
    pub total_cost_basis: f64,
    pub avg_cost_per_unit: f64,
    pub unrealized_pnl: f64,
    /// Zero when `total_cost_basis` is zero, which means "undefined" rather than breakeven.
    pub unrealized_pnl_percent: f64,
    pub realized_pnl: f64,
    pub method: AccountingMethod,
}

impl PnLResult {
    pub fn total_pnl(&self) -> f64 {
        self.realized_pnl + self.unrealized_pnl
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellAllocation {
    /// Position of the source lot in the method's sort order; `None` (wire value `-1`)
    /// under average cost, where no single lot is the source.
    #[serde(serialize_with = "serialize_lot_index", deserialize_with = "deserialize_lot_index")]
    pub lot_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_date: Option<String>,
    pub qty: f64,
    pub cost_basis: f64,
    pub proceeds: f64,
    pub realized_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellSimulation {
    pub allocations: Vec<SellAllocation>,
    pub total_realized_pnl: f64,
    pub remaining_lots: Vec<Lot>,
    /// Requested quantity that no buy lot could cover.
    pub unfilled_qty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    NoCostBasis,
    Balanced,
    Under,
    Over,
}

impl fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconcileStatus::NoCostBasis => "no_cost_basis",
            ReconcileStatus::Balanced => "balanced",
            ReconcileStatus::Under => "under",
            ReconcileStatus::Over => "over",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    pub symbol: String,
    pub wallet_balance: f64,
    pub ledger_qty: f64,
    /// `wallet_balance - ledger_qty`
    pub difference: f64,
    pub difference_pct: f64,
    pub price: Option<f64>,
    pub difference_usd: Option<f64>,
    pub status: ReconcileStatus,
}

impl ReconciliationItem {
    /// The lot a caller could append to close the gap, dated `date`: a buy when the
    /// wallet holds more than recorded, a sell when it holds less. Needs a price.
    pub fn suggested_lot(&self, date: &str) -> Option<Lot> {
        if self.status == ReconcileStatus::Balanced || self.difference == 0.0 {
            return None;
        }
        let price = self.price.filter(|p| *p > 0.0)?;
        Some(Lot::new(date, self.difference, price).with_notes("reconciliation adjustment"))
    }
}

pub fn serialize_lot_index<S>(index: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match index {
        Some(i) => serializer.serialize_i64(*i as i64),
        None => serializer.serialize_i64(-1),
    }
}

pub fn deserialize_lot_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    if raw < 0 {
        return Ok(None);
    }
    usize::try_from(raw).map(Some).map_err(de::Error::custom)
}

/// Parses a numeric cell that may carry currency symbols or thousands separators
/// (`$42,000.00`, ` 1,234.5 `, `-0.25`).
pub fn parse_amount(s: &str) -> Result<f64, String> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' ' | '"'))
        .collect();
    if cleaned.is_empty() {
        return Err(format!("Invalid number format: '{}'", s));
    }

    match Decimal::from_str_exact(&cleaned) {
        Ok(value) => value
            .to_f64()
            .ok_or_else(|| format!("Number out of range: '{}'", s)),
        Err(_) => cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("Invalid number format: '{}'", s)),
    }
}

/// Normalizes a date cell to `YYYY-MM-DD`, falling back to truncating the raw
/// text at the first space or `T` when no known format matches.
pub fn normalize_date(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(date) = parse_date_str(trimmed) {
        return date.format("%Y-%m-%d").to_string();
    }
    match trimmed.find(|c: char| c == ' ' || c == 'T') {
        Some(pos) => trimmed[..pos].to_string(),
        None => trimmed.to_string(),
    }
}

pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    let without_zone = s
        .strip_suffix(" UTC")
        .or_else(|| s.strip_suffix('Z'))
        .unwrap_or(s);
    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for format in &datetime_formats {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(without_zone, format) {
            return Some(parsed.date());
        }
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(without_zone, "%Y-%m-%d") {
        return Some(parsed);
    }

    let date_part = without_zone.split_whitespace().next().unwrap_or("");
    let fallback_formats = ["%m/%d/%Y", "%Y/%m/%d"];
    for format in &fallback_formats {
        if let Ok(parsed) = NaiveDate::parse_from_str(date_part, format) {
            return Some(parsed);
        }
    }

    None
}
