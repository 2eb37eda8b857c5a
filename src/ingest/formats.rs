use csv::StringRecord;
use serde::Serialize;

use crate::models::{normalize_date, parse_amount, Lot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Coinbase,
    Binance,
    Generic,
}

/// Detects the exchange that produced an export from its header row.
/// Matching is case-insensitive and ignores column order.
pub fn detect_format<S: AsRef<str>>(headers: &[S]) -> ExportFormat {
    let headers: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();
    let has = |name: &str| headers.iter().any(|h| h == name);

    if has("transaction type") && has("quantity transacted") {
        ExportFormat::Coinbase
    } else if has("pair") && has("side") && has("executed") {
        ExportFormat::Binance
    } else {
        ExportFormat::Generic
    }
}

pub fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

// Quote currencies stripped from concatenated Binance pairs, longest-match first.
const QUOTE_CURRENCIES: [&str; 14] = [
    "FDUSD", "USDT", "BUSD", "USDC", "TUSD", "USDP", "DAI", "USD", "EUR", "GBP", "TRY", "BTC", "ETH",
    "BNB",
];

/// Base asset of a trading pair: `BTCUSDT` -> `BTC`, `ETH/BTC` -> `ETH`.
pub fn base_asset(pair: &str) -> Option<String> {
    let pair = pair.trim().to_uppercase();
    if let Some(pos) = pair.find(|c| matches!(c, '/' | '-' | '_')) {
        let base = &pair[..pos];
        return (!base.is_empty()).then(|| base.to_string());
    }
    QUOTE_CURRENCIES
        .iter()
        .find_map(|quote| pair.strip_suffix(quote).filter(|base| !base.is_empty()))
        .map(str::to_string)
}

const DATE_ALIASES: &[&str] = &["date", "timestamp", "time", "datetime", "date(utc)", "trade date", "created at"];
const QTY_ALIASES: &[&str] = &["quantity", "qty", "amount", "units", "size", "volume", "executed"];
const PRICE_ALIASES: &[&str] = &[
    "price",
    "price per unit",
    "price_per_unit",
    "unit price",
    "price (usd)",
    "price usd",
    "rate",
    "cost basis per unit",
];
const SIDE_ALIASES: &[&str] = &["type", "side", "action", "transaction type", "direction", "buy/sell"];
const SYMBOL_ALIASES: &[&str] = &["symbol", "asset", "coin", "token", "ticker", "currency"];
const NOTES_ALIASES: &[&str] = &["notes", "note", "memo", "description", "comment"];

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| headers.iter().position(|h| h == alias))
}

#[derive(Debug, Clone)]
pub struct CoinbaseColumns {
    timestamp: Option<usize>,
    kind: Option<usize>,
    asset: Option<usize>,
    quantity: Option<usize>,
    price: Option<usize>,
    notes: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct BinanceColumns {
    date: Option<usize>,
    pair: Option<usize>,
    side: Option<usize>,
    price: Option<usize>,
    executed: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct GenericColumns {
    date: Option<usize>,
    qty: Option<usize>,
    price: Option<usize>,
    side: Option<usize>,
    symbol: Option<usize>,
    notes: Option<usize>,
}

/// Column positions for a detected format, resolved once from the header row.
#[derive(Debug, Clone)]
pub enum Layout {
    Coinbase(CoinbaseColumns),
    Binance(BinanceColumns),
    Generic(GenericColumns),
}

impl Layout {
    pub fn resolve(format: ExportFormat, headers: &[String]) -> Self {
        match format {
            ExportFormat::Coinbase => Layout::Coinbase(CoinbaseColumns {
                timestamp: find_column(headers, &["timestamp", "date", "time"]),
                kind: find_column(headers, &["transaction type"]),
                asset: find_column(headers, &["asset"]),
                quantity: find_column(headers, &["quantity transacted"]),
                price: find_column(headers, &["spot price at transaction", "price at transaction", "spot price"]),
                notes: find_column(headers, &["notes"]),
            }),
            ExportFormat::Binance => Layout::Binance(BinanceColumns {
                date: find_column(headers, &["date(utc)", "date", "time"]),
                pair: find_column(headers, &["pair"]),
                side: find_column(headers, &["side"]),
                price: find_column(headers, &["price"]),
                executed: find_column(headers, &["executed"]),
            }),
            ExportFormat::Generic => Layout::Generic(GenericColumns {
                date: find_column(headers, DATE_ALIASES),
                qty: find_column(headers, QTY_ALIASES),
                price: find_column(headers, PRICE_ALIASES),
                side: find_column(headers, SIDE_ALIASES),
                symbol: find_column(headers, SYMBOL_ALIASES),
                notes: find_column(headers, NOTES_ALIASES),
            }),
        }
    }

    /// Names of required columns the header row does not provide.
    pub fn missing_columns(&self) -> Vec<&'static str> {
        let required: Vec<(&'static str, Option<usize>)> = match self {
            Layout::Coinbase(c) => vec![
                ("timestamp", c.timestamp),
                ("quantity transacted", c.quantity),
                ("spot price at transaction", c.price),
            ],
            Layout::Binance(c) => vec![("date(utc)", c.date), ("price", c.price)],
            Layout::Generic(c) => vec![("date", c.date), ("quantity", c.qty), ("price", c.price)],
        };
        required
            .into_iter()
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| name)
            .collect()
    }

    pub fn extract(&self, record: &StringRecord) -> ExportRow {
        let cell = |idx: Option<usize>| -> String {
            idx.and_then(|i| record.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };
        match self {
            Layout::Coinbase(c) => ExportRow::Coinbase(CoinbaseRow {
                timestamp: cell(c.timestamp),
                kind: cell(c.kind),
                asset: cell(c.asset),
                quantity: cell(c.quantity),
                price: cell(c.price),
                notes: cell(c.notes),
            }),
            Layout::Binance(c) => ExportRow::Binance(BinanceRow {
                date: cell(c.date),
                pair: cell(c.pair),
                side: cell(c.side),
                price: cell(c.price),
                executed: cell(c.executed),
            }),
            Layout::Generic(c) => ExportRow::Generic(GenericRow {
                date: cell(c.date),
                qty: cell(c.qty),
                price: cell(c.price),
                side: c.side.map(|i| cell(Some(i))),
                symbol: cell(c.symbol),
                notes: cell(c.notes),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoinbaseRow {
    pub timestamp: String,
    pub kind: String,
    pub asset: String,
    pub quantity: String,
    pub price: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinanceRow {
    pub date: String,
    pub pair: String,
    pub side: String,
    pub price: String,
    pub executed: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericRow {
    pub date: String,
    pub qty: String,
    pub price: String,
    /// `None` when the export has no buy/sell column at all.
    pub side: Option<String>,
    pub symbol: String,
    pub notes: String,
}

/// One data row in the shape of its exchange export.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportRow {
    Coinbase(CoinbaseRow),
    Binance(BinanceRow),
    Generic(GenericRow),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Lot { symbol: Option<String>, lot: Lot },
    /// Skipped, reported as a warning.
    Skipped(String),
    /// Unparseable content, reported as an error.
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Buy,
    Sell,
}

fn parse_side(value: &str) -> Option<Side> {
    match value.trim().to_lowercase().as_str() {
        "buy" | "b" | "bought" | "purchase" | "acquire" | "advanced trade buy" => Some(Side::Buy),
        "sell" | "s" | "sold" | "sale" | "dispose" | "advanced trade sell" => Some(Side::Sell),
        _ => None,
    }
}

/// Leading numeric part of a cell such as `0.5BTC`.
fn numeric_prefix(value: &str) -> &str {
    let end = value
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+' | '$')))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    &value[..end]
}

fn signed(qty: f64, side: Side) -> f64 {
    match side {
        Side::Buy => qty.abs(),
        Side::Sell => -qty.abs(),
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn build_lot(
    date: &str,
    qty: f64,
    price: &str,
    notes: &str,
    symbol: Option<String>,
) -> RowOutcome {
    let price = match parse_amount(price) {
        Ok(p) => p,
        Err(e) => return RowOutcome::Invalid(format!("price: {}", e)),
    };
    if price <= 0.0 {
        return RowOutcome::Invalid(format!("price must be positive, got {}", price));
    }
    if qty == 0.0 {
        return RowOutcome::Skipped("zero quantity".to_string());
    }
    let mut lot = Lot::new(normalize_date(date), qty, price);
    lot.notes = non_empty(notes);
    RowOutcome::Lot { symbol, lot }
}

fn missing(fields: &[(&str, &str)]) -> Option<RowOutcome> {
    let absent: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect();
    (!absent.is_empty()).then(|| RowOutcome::Skipped(format!("missing {}", absent.join(", "))))
}

impl ExportRow {
    /// Upper-case asset the row is about, read without validating anything else.
    pub fn symbol(&self) -> Option<String> {
        match self {
            ExportRow::Coinbase(row) => non_empty(&row.asset.to_uppercase()),
            ExportRow::Binance(row) => base_asset(&row.pair),
            ExportRow::Generic(row) => non_empty(&row.symbol.to_uppercase()),
        }
    }

    pub fn into_outcome(self) -> RowOutcome {
        match self {
            ExportRow::Coinbase(row) => row.into_outcome(),
            ExportRow::Binance(row) => row.into_outcome(),
            ExportRow::Generic(row) => row.into_outcome(),
        }
    }
}

impl CoinbaseRow {
    fn into_outcome(self) -> RowOutcome {
        let side = match parse_side(&self.kind) {
            Some(side) => side,
            None => {
                let kind = if self.kind.is_empty() { "untyped" } else { self.kind.as_str() };
                return RowOutcome::Skipped(format!("ignored {} transaction", kind));
            }
        };
        if let Some(skip) = missing(&[
            ("timestamp", self.timestamp.as_str()),
            ("quantity", self.quantity.as_str()),
            ("price", self.price.as_str()),
        ]) {
            return skip;
        }
        let qty = match parse_amount(&self.quantity) {
            Ok(q) => signed(q, side),
            Err(e) => return RowOutcome::Invalid(format!("quantity: {}", e)),
        };
        build_lot(
            &self.timestamp,
            qty,
            &self.price,
            &self.notes,
            non_empty(&self.asset.to_uppercase()),
        )
    }
}

impl BinanceRow {
    fn into_outcome(self) -> RowOutcome {
        let side = match parse_side(&self.side) {
            Some(side) => side,
            None => return RowOutcome::Skipped(format!("unknown side '{}'", self.side)),
        };
        if let Some(skip) = missing(&[
            ("date", self.date.as_str()),
            ("executed", self.executed.as_str()),
            ("price", self.price.as_str()),
        ]) {
            return skip;
        }
        let symbol = match base_asset(&self.pair) {
            Some(symbol) => symbol,
            None => return RowOutcome::Invalid(format!("unrecognised pair '{}'", self.pair)),
        };
        let qty = match parse_amount(numeric_prefix(&self.executed)) {
            Ok(q) => signed(q, side),
            Err(e) => return RowOutcome::Invalid(format!("executed: {}", e)),
        };
        build_lot(&self.date, qty, &self.price, "", Some(symbol))
    }
}

impl GenericRow {
    fn into_outcome(self) -> RowOutcome {
        if let Some(skip) = missing(&[
            ("date", self.date.as_str()),
            ("quantity", self.qty.as_str()),
            ("price", self.price.as_str()),
        ]) {
            return skip;
        }
        let raw_qty = match parse_amount(&self.qty) {
            Ok(q) => q,
            Err(e) => return RowOutcome::Invalid(format!("quantity: {}", e)),
        };
        let qty = match self.side.as_deref() {
            Some(side) if !side.is_empty() => match parse_side(side) {
                Some(side) => signed(raw_qty, side),
                None => return RowOutcome::Skipped(format!("unknown transaction type '{}'", side)),
            },
            _ => raw_qty,
        };
        build_lot(
            &self.date,
            qty,
            &self.price,
            &self.notes,
            non_empty(&self.symbol.to_uppercase()),
        )
    }
}
