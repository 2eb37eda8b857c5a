use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::accounting::{open_lots, simulate_sell, token_pnl, total_qty};
use crate::error::{LedgerError, Result};
use crate::models::{AccountingMethod, CostBasisEntry, Lot, PnLResult, SellSimulation};
use crate::validate::{validate_lot, validate_lots, ValidationError};
use crate::QTY_EPSILON;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Append the imported lots after the existing ones.
    Merge,
    /// Discard the existing lots first.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub token_id: String,
    pub imported: usize,
    pub total: usize,
}

/// Cost-basis entries keyed by token id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    entries: BTreeMap<String, CostBasisEntry>,
    /// Method given to entries created from now on.
    #[serde(skip)]
    default_method: AccountingMethod,
}

fn with_lot_replaced(lots: &[Lot], index: usize, lot: Lot) -> Vec<Lot> {
    lots.iter()
        .enumerate()
        .map(|(i, existing)| if i == index { lot.clone() } else { existing.clone() })
        .collect()
}

fn without_lot(lots: &[Lot], index: usize) -> Vec<Lot> {
    lots.iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, lot)| lot.clone())
        .collect()
}

fn check_lot(index: usize, lot: &Lot) -> Result<()> {
    let errors = validate_lot(index, lot);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::Validation(errors))
    }
}

impl Ledger {
    pub fn new(default_method: AccountingMethod) -> Self {
        Self {
            entries: BTreeMap::new(),
            default_method,
        }
    }

    /// Reads a ledger file; a missing file is an empty ledger.
    pub fn load(path: &Path, default_method: AccountingMethod) -> Result<Self> {
        if !path.exists() {
            debug!("No ledger at {:?}, starting empty", path);
            return Ok(Self::new(default_method));
        }
        let contents = fs::read_to_string(path)?;
        let mut ledger: Ledger = serde_json::from_str(&contents)?;
        ledger.default_method = default_method;
        Ok(ledger)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn default_method(&self) -> AccountingMethod {
        self.default_method
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CostBasisEntry> {
        self.entries.values()
    }

    pub fn get(&self, token_id: &str) -> Option<&CostBasisEntry> {
        self.entries.get(token_id)
    }

    /// Looks up an entry by token id, then by symbol, ignoring case.
    pub fn find(&self, key: &str) -> Option<&CostBasisEntry> {
        self.entries.get(key).or_else(|| {
            self.entries.values().find(|entry| {
                entry.token_id.eq_ignore_ascii_case(key) || entry.symbol.eq_ignore_ascii_case(key)
            })
        })
    }

    fn entry(&self, token_id: &str) -> Result<&CostBasisEntry> {
        self.entries
            .get(token_id)
            .ok_or_else(|| LedgerError::UnknownToken(token_id.to_string()))
    }

    fn entry_mut(&mut self, token_id: &str) -> Result<&mut CostBasisEntry> {
        self.entries
            .get_mut(token_id)
            .ok_or_else(|| LedgerError::UnknownToken(token_id.to_string()))
    }

    /// Appends a validated lot, creating the entry on its first lot.
    pub fn add_lot(&mut self, token_id: &str, symbol: &str, lot: Lot) -> Result<&CostBasisEntry> {
        let position = self.get(token_id).map_or(0, |e| e.lots.len()) + 1;
        check_lot(position, &lot)?;

        let default_method = self.default_method;
        let entry = self
            .entries
            .entry(token_id.to_string())
            .or_insert_with(|| CostBasisEntry::new(token_id, symbol, default_method));
        debug!("Adding lot {:?} to {}", lot, token_id);
        entry.lots.push(lot);
        Ok(entry)
    }

    pub fn replace_lot(&mut self, token_id: &str, index: usize, lot: Lot) -> Result<()> {
        let entry = self.entry_mut(token_id)?;
        if index >= entry.lots.len() {
            return Err(LedgerError::LotIndexOutOfRange {
                token_id: token_id.to_string(),
                index,
                len: entry.lots.len(),
            });
        }
        check_lot(index + 1, &lot)?;
        entry.lots = with_lot_replaced(&entry.lots, index, lot);
        Ok(())
    }

    /// Removes a lot, deleting the entry once it has none left.
    pub fn remove_lot(&mut self, token_id: &str, index: usize) -> Result<Lot> {
        let entry = self.entry_mut(token_id)?;
        let removed = entry
            .lots
            .get(index)
            .cloned()
            .ok_or(LedgerError::LotIndexOutOfRange {
                token_id: token_id.to_string(),
                index,
                len: entry.lots.len(),
            })?;
        entry.lots = without_lot(&entry.lots, index);

        if entry.lots.is_empty() {
            info!("Removed last lot of {}, deleting entry", token_id);
            self.entries.remove(token_id);
        }
        Ok(removed)
    }

    pub fn set_method(&mut self, token_id: &str, method: AccountingMethod) -> Result<()> {
        self.entry_mut(token_id)?.accounting_method = method;
        Ok(())
    }

    /// Adds a batch of lots. Every lot is validated first; if any is invalid
    /// nothing is changed and all problems are returned together.
    pub fn import_lots(
        &mut self,
        token_id: &str,
        symbol: &str,
        lots: Vec<Lot>,
        mode: ImportMode,
    ) -> Result<ImportSummary> {
        let errors = validate_lots(&lots);
        if !errors.is_empty() {
            return Err(LedgerError::Validation(errors));
        }
        if lots.is_empty() {
            return Ok(ImportSummary {
                token_id: token_id.to_string(),
                imported: 0,
                total: self.get(token_id).map_or(0, |e| e.lots.len()),
            });
        }

        let imported = lots.len();
        let default_method = self.default_method;
        let entry = self
            .entries
            .entry(token_id.to_string())
            .or_insert_with(|| CostBasisEntry::new(token_id, symbol, default_method));
        match mode {
            ImportMode::Merge => entry.lots.extend(lots),
            ImportMode::Replace => entry.lots = lots,
        }

        info!("Imported {} lots into {} ({} total)", imported, token_id, entry.lots.len());
        Ok(ImportSummary {
            token_id: token_id.to_string(),
            imported,
            total: entry.lots.len(),
        })
    }

    pub fn pnl(
        &self,
        token_id: &str,
        current_price: f64,
        method: Option<AccountingMethod>,
    ) -> Result<PnLResult> {
        let entry = self.entry(token_id)?;
        Ok(entry_pnl(entry, current_price, method))
    }

    /// P&L for every entry, computed in parallel. Prices are looked up by token
    /// id, then by upper-case symbol or token id; an asset without a price is
    /// valued at 0.
    pub fn portfolio_pnl(
        &self,
        prices: &HashMap<String, f64>,
        method: Option<AccountingMethod>,
    ) -> Vec<PnLResult> {
        let mut results: Vec<PnLResult> = self
            .entries
            .par_iter()
            .map(|(token_id, entry)| {
                let price = prices
                    .get(token_id)
                    .or_else(|| prices.get(&entry.symbol.to_uppercase()))
                    .or_else(|| prices.get(&token_id.to_uppercase()))
                    .copied()
                    .unwrap_or(0.0);
                entry_pnl(entry, price, method)
            })
            .collect();
        results.sort_by(|a, b| a.token_id.cmp(&b.token_id));
        results
    }

    /// What selling `qty` at `price` would realize, against the position still
    /// open after every recorded sell.
    pub fn preview_sell(
        &self,
        token_id: &str,
        qty: f64,
        price: f64,
        method: Option<AccountingMethod>,
    ) -> Result<SellSimulation> {
        let entry = self.entry(token_id)?;
        let method = method.unwrap_or(entry.accounting_method);
        Ok(simulate_sell(&open_lots(&entry.lots, method), qty, price, method))
    }

    /// Records a sale as a negative lot once the preview shows it can be filled.
    pub fn commit_sell(
        &mut self,
        token_id: &str,
        date: &str,
        qty: f64,
        price: f64,
        notes: Option<String>,
        method: Option<AccountingMethod>,
    ) -> Result<SellSimulation> {
        let entry = self.entry(token_id)?;
        let sell_lot = Lot {
            date: date.to_string(),
            qty: -qty,
            price_per_unit: price,
            notes,
        };
        if qty < 0.0 {
            return Err(LedgerError::Validation(vec![ValidationError {
                index: entry.lots.len() + 1,
                field: "qty",
                message: "sell quantity must be positive".to_string(),
            }]));
        }
        check_lot(entry.lots.len() + 1, &sell_lot)?;

        let simulation = self.preview_sell(token_id, qty, price, method)?;
        if simulation.unfilled_qty > QTY_EPSILON {
            return Err(LedgerError::Oversell {
                token_id: token_id.to_string(),
                requested: qty,
                available: total_qty(&entry.lots).max(0.0),
            });
        }

        let symbol = entry.symbol.clone();
        self.add_lot(token_id, &symbol, sell_lot)?;
        info!(
            "Recorded sale of {} {} at {}: realized {:.2}",
            qty, symbol, price, simulation.total_realized_pnl
        );
        Ok(simulation)
    }
}

pub fn entry_pnl(
    entry: &CostBasisEntry,
    current_price: f64,
    method: Option<AccountingMethod>,
) -> PnLResult {
    token_pnl(
        &entry.token_id,
        &entry.symbol,
        &entry.lots,
        current_price,
        method.unwrap_or(entry.accounting_method),
    )
}
