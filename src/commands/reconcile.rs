use anyhow::{Context, Error};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ledger::Ledger;
use crate::models::{parse_amount, ReconciliationItem};
use crate::reconcile::{reconcile, WalletHolding};
use crate::{round_money, round_qty};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BalanceRecord {
    symbol: String,
    balance: String,
    #[serde(default)]
    token_id: Option<String>,
}

/// Reads a `Symbol,Balance[,TokenId]` CSV, attaching prices by upper-case symbol.
pub fn load_balances(file: &Path, prices: &HashMap<String, f64>) -> Result<Vec<WalletHolding>, Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file)
        .with_context(|| format!("Error reading file {:?}", file))?;

    let mut holdings = Vec::new();
    for result in rdr.deserialize::<BalanceRecord>() {
        let record = result.context("Error parsing balance CSV")?;
        let balance = parse_amount(&record.balance)
            .map_err(|e| anyhow::anyhow!("Invalid balance for {}: {}", record.symbol, e))?;
        holdings.push(WalletHolding {
            price: prices.get(&record.symbol.to_uppercase()).copied(),
            token_id: record.token_id.filter(|t| !t.is_empty()),
            symbol: record.symbol,
            balance,
        });
    }
    Ok(holdings)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReconciliationRow {
    pub symbol: String,
    pub status: String,
    pub wallet_balance: Decimal,
    pub ledger_quantity: Decimal,
    pub difference: Decimal,
    pub difference_pct: Decimal,
    pub price: Option<Decimal>,
    pub difference_usd: Option<Decimal>,
}

impl From<&ReconciliationItem> for ReconciliationRow {
    fn from(item: &ReconciliationItem) -> Self {
        Self {
            symbol: item.symbol.clone(),
            status: item.status.to_string(),
            wallet_balance: round_qty(item.wallet_balance),
            ledger_quantity: round_qty(item.ledger_qty),
            difference: round_qty(item.difference),
            difference_pct: round_money(item.difference_pct),
            price: item.price.map(round_money),
            difference_usd: item.difference_usd.map(round_money),
        }
    }
}

/// Reconciles `holdings` against the ledger and writes `reconciliation.csv`.
pub fn reconciliation_report(
    ledger: &Ledger,
    holdings: &[WalletHolding],
    reports_dir: &Path,
) -> Result<(PathBuf, Vec<ReconciliationItem>), Error> {
    let items = reconcile(holdings, ledger);

    fs::create_dir_all(reports_dir)
        .with_context(|| format!("Error creating reports directory {:?}", reports_dir))?;
    let file_path = reports_dir.join("reconciliation.csv");
    let mut wtr = csv::Writer::from_path(&file_path)?;
    for item in &items {
        wtr.serialize(ReconciliationRow::from(item))?;
    }
    wtr.flush()?;

    log::info!(
        "Reconciled {} of {} wallet holdings",
        items.len(),
        holdings.len()
    );
    Ok((file_path, items))
}
