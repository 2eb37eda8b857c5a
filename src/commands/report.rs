use anyhow::{Context, Error};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ledger::Ledger;
use crate::models::{parse_amount, AccountingMethod, PnLResult};
use crate::{round_money, round_qty};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PriceRecord {
    symbol: String,
    price: String,
}

/// Reads a `Symbol,Price` CSV into a map keyed by upper-case symbol.
pub fn load_prices(file: &Path) -> Result<HashMap<String, f64>, Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file)
        .with_context(|| format!("Error reading file {:?}", file))?;

    let mut prices = HashMap::new();
    for result in rdr.deserialize::<PriceRecord>() {
        let record = result.context("Error parsing price CSV")?;
        let price = parse_amount(&record.price)
            .map_err(|e| anyhow::anyhow!("Invalid price for {}: {}", record.symbol, e))?;
        prices.insert(record.symbol.to_uppercase(), price);
    }
    Ok(prices)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PnlRow {
    pub token_id: String,
    pub symbol: String,
    pub method: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub avg_cost: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pct: Decimal,
    pub realized_pnl: Decimal,
}

impl From<&PnLResult> for PnlRow {
    fn from(result: &PnLResult) -> Self {
        Self {
            token_id: result.token_id.clone(),
            symbol: result.symbol.clone(),
            method: result.method.to_string(),
            quantity: round_qty(result.total_qty),
            price: round_money(result.current_price),
            market_value: round_money(result.current_value),
            cost_basis: round_money(result.total_cost_basis),
            avg_cost: round_money(result.avg_cost_per_unit),
            unrealized_pnl: round_money(result.unrealized_pnl),
            unrealized_pct: round_money(result.unrealized_pnl_percent),
            realized_pnl: round_money(result.realized_pnl),
        }
    }
}

/// Writes `pnl_<method>.csv` under `reports_dir` with a totals row and returns
/// the per-asset results. `method` overrides each entry's own method.
pub fn pnl_report(
    ledger: &Ledger,
    prices: &HashMap<String, f64>,
    method: Option<AccountingMethod>,
    reports_dir: &Path,
) -> Result<(PathBuf, Vec<PnLResult>), Error> {
    let results = ledger.portfolio_pnl(prices, method);

    fs::create_dir_all(reports_dir)
        .with_context(|| format!("Error creating reports directory {:?}", reports_dir))?;
    let label = method.map(|m| m.as_str()).unwrap_or("entry");
    let file_path = reports_dir.join(format!("pnl_{}.csv", label));
    let mut wtr = csv::Writer::from_path(&file_path)?;

    let mut total_value = dec!(0);
    let mut total_basis = dec!(0);
    let mut total_unrealized = dec!(0);
    let mut total_realized = dec!(0);

    for result in &results {
        let row = PnlRow::from(result);
        total_value += row.market_value;
        total_basis += row.cost_basis;
        total_unrealized += row.unrealized_pnl;
        total_realized += row.realized_pnl;
        wtr.serialize(row)?;
    }

    wtr.write_record(&[
        String::from(""),
        String::from("TOTAL"),
        String::from(""),
        String::from(""),
        String::from(""),
        total_value.to_string(),
        total_basis.to_string(),
        String::from(""),
        total_unrealized.to_string(),
        String::from(""),
        total_realized.to_string(),
    ])?;
    wtr.flush()?;

    Ok((file_path, results))
}
