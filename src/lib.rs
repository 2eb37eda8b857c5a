pub mod accounting;
pub mod commands;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod models;
pub mod reconcile;
pub mod validate;

use dotenvy::dotenv;
use rust_decimal::{prelude::FromPrimitive, Decimal, RoundingStrategy};
use std::env;
use std::path::PathBuf;

use crate::error::{LedgerError, Result};
use crate::models::AccountingMethod;

/// Quantities closer to zero than this are treated as zero.
pub const QTY_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub ledger_path: PathBuf,
    pub default_method: AccountingMethod,
    pub reports_dir: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("./ledger.json"),
            default_method: AccountingMethod::Fifo,
            reports_dir: PathBuf::from("./reports"),
        }
    }
}

pub fn load_config() -> Result<LedgerConfig> {
    dotenv().ok();
    let defaults = LedgerConfig::default();

    let default_method = match env::var("ACCOUNTING_METHOD") {
        Ok(raw) => raw.parse::<AccountingMethod>().map_err(|_| {
            LedgerError::Config(format!(
                "Unsupported ACCOUNTING_METHOD '{}'. Must be 'fifo', 'lifo', or 'average'.",
                raw
            ))
        })?,
        Err(_) => defaults.default_method,
    };

    let ledger_path = env::var("LEDGER_PATH")
        .map(PathBuf::from)
        .unwrap_or(defaults.ledger_path);
    if ledger_path.as_os_str().is_empty() {
        return Err(LedgerError::Config("LEDGER_PATH must not be empty".to_string()));
    }

    let reports_dir = env::var("REPORTS_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.reports_dir);

    Ok(LedgerConfig {
        ledger_path,
        default_method,
        reports_dir,
    })
}

/// Rounds a float amount to cents for report output.
pub fn round_money(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds a quantity to 8 decimal places for report output.
pub fn round_qty(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero)
}
