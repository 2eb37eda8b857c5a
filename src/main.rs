use clap::{Parser, Subcommand};
use lot_ledger::commands::import::{import_transactions, ImportOptions};
use lot_ledger::commands::reconcile::{load_balances, reconciliation_report};
use lot_ledger::commands::report::{load_prices, pnl_report};
use lot_ledger::commands::sell::{format_simulation, sell, simulate};
use lot_ledger::ledger::{ImportMode, Ledger};
use lot_ledger::models::{AccountingMethod, Lot};
use lot_ledger::{load_config, round_money, LedgerConfig};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    let command = Cli::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut ledger = match Ledger::load(&config.ledger_path, config.default_method) {
        Ok(ledger) => ledger,
        Err(e) => {
            eprintln!("Error loading ledger {:?}: {}", config.ledger_path, e);
            return ExitCode::FAILURE;
        }
    };

    match run(command.subcommand, &config, &mut ledger) {
        Ok(true) => match ledger.save(&config.ledger_path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error saving ledger {:?}: {}", config.ledger_path, e);
                ExitCode::FAILURE
            }
        },
        Ok(false) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs one subcommand; `Ok(true)` means the ledger changed and must be saved.
fn run(command: Command, config: &LedgerConfig, ledger: &mut Ledger) -> anyhow::Result<bool> {
    match command {
        Command::Import { file, token_id, symbol, filter, replace } => {
            let options = ImportOptions {
                token_id,
                symbol,
                filter,
                mode: if replace { ImportMode::Replace } else { ImportMode::Merge },
            };
            let report = import_transactions(&file, ledger, &options)?;
            println!(
                "Imported {} lots ({:?} format) into {}; {} lots total",
                report.summary.imported,
                report.format,
                report.summary.token_id,
                report.summary.total
            );
            for warning in &report.warnings {
                println!("  skipped: {}", warning);
            }
            Ok(true)
        }
        Command::Add { token_id, symbol, date, qty, price, notes } => {
            let symbol = symbol.unwrap_or_else(|| token_id.to_uppercase());
            let lot = Lot { date, qty, price_per_unit: price, notes };
            let entry = ledger.add_lot(&token_id, &symbol, lot)?;
            println!("Added lot to {} ({} lots)", entry.token_id, entry.lots.len());
            Ok(true)
        }
        Command::Remove { token_id, index } => {
            let removed = ledger.remove_lot(&token_id, index)?;
            println!("Removed lot {:?} from {}", removed, token_id);
            Ok(true)
        }
        Command::Method { token_id, method } => {
            ledger.set_method(&token_id, method)?;
            println!("{} now uses {}", token_id, method);
            Ok(true)
        }
        Command::Pnl { prices, method } => {
            let prices = match prices {
                Some(file) => load_prices(&file)?,
                None => HashMap::new(),
            };
            let (path, results) = pnl_report(ledger, &prices, method, &config.reports_dir)?;
            for result in &results {
                println!(
                    "{:<10} {:>7}  qty {:>16.8}  basis {:>14}  unrealized {:>14}  realized {:>14}",
                    result.symbol,
                    result.method,
                    result.total_qty,
                    round_money(result.total_cost_basis),
                    round_money(result.unrealized_pnl),
                    round_money(result.realized_pnl),
                );
            }
            println!("P&L report saved to {:?}", path);
            Ok(false)
        }
        Command::Simulate { token_id, qty, price, method } => {
            let simulation = simulate(ledger, &token_id, qty, price, method)?;
            for line in format_simulation(&simulation) {
                println!("{}", line);
            }
            Ok(false)
        }
        Command::Sell { token_id, date, qty, price, notes, method } => {
            let simulation = sell(ledger, &token_id, &date, qty, price, notes, method)?;
            for line in format_simulation(&simulation) {
                println!("{}", line);
            }
            println!("Recorded sale of {} {} on {}", qty, token_id, date);
            Ok(true)
        }
        Command::Reconcile { balances, prices } => {
            let prices = match prices {
                Some(file) => load_prices(&file)?,
                None => HashMap::new(),
            };
            let holdings = load_balances(&balances, &prices)?;
            let (path, items) = reconciliation_report(ledger, &holdings, &config.reports_dir)?;
            for item in &items {
                println!(
                    "{:<10} {:<14} wallet {:>16.8}  ledger {:>16.8}  diff {:>16.8}",
                    item.symbol,
                    item.status.to_string(),
                    item.wallet_balance,
                    item.ledger_qty,
                    item.difference,
                );
            }
            println!("Reconciliation report saved to {:?}", path);
            Ok(false)
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Import an exchange CSV export (Coinbase, Binance, or a generic Date/Quantity/Price file)
    Import {
        #[clap(long)]
        file: PathBuf,
        /// Ledger key for the asset; defaults to the lowercased symbol
        #[clap(long)]
        token_id: Option<String>,
        /// Asset symbol; detected from the file when omitted. Also filters rows unless --filter is given
        #[clap(long)]
        symbol: Option<String>,
        /// Only import rows for this symbol
        #[clap(long)]
        filter: Option<String>,
        /// Replace the asset's existing lots instead of merging
        #[clap(long)]
        replace: bool,
    },
    /// Record a single buy (positive qty) or sell (negative qty) lot
    Add {
        #[clap(long)]
        token_id: String,
        #[clap(long)]
        symbol: Option<String>,
        /// Date as YYYY-MM-DD
        #[clap(long)]
        date: String,
        #[clap(long, allow_hyphen_values = true)]
        qty: f64,
        /// USD price per unit
        #[clap(long)]
        price: f64,
        #[clap(long)]
        notes: Option<String>,
    },
    /// Remove the lot at a 0-based index
    Remove {
        #[clap(long)]
        token_id: String,
        #[clap(long)]
        index: usize,
    },
    /// Change an asset's accounting method
    Method {
        #[clap(long)]
        token_id: String,
        /// fifo, lifo, or average
        #[clap(long)]
        method: AccountingMethod,
    },
    /// Export a CSV report of cost basis and profit/loss for every asset
    Pnl {
        /// CSV with Symbol,Price columns; assets without a price are valued at 0
        #[clap(long)]
        prices: Option<PathBuf>,
        /// Override each asset's accounting method
        #[clap(long)]
        method: Option<AccountingMethod>,
    },
    /// Preview which lots a sale would consume and what it would realize
    Simulate {
        #[clap(long)]
        token_id: String,
        #[clap(long)]
        qty: f64,
        #[clap(long)]
        price: f64,
        #[clap(long)]
        method: Option<AccountingMethod>,
    },
    /// Record a sale after previewing it
    Sell {
        #[clap(long)]
        token_id: String,
        /// Date as YYYY-MM-DD
        #[clap(long)]
        date: String,
        #[clap(long)]
        qty: f64,
        #[clap(long)]
        price: f64,
        #[clap(long)]
        notes: Option<String>,
        #[clap(long)]
        method: Option<AccountingMethod>,
    },
    /// Compare ledger quantities with wallet balances
    Reconcile {
        /// CSV with Symbol,Balance columns (optional TokenId)
        #[clap(long)]
        balances: PathBuf,
        /// CSV with Symbol,Price columns
        #[clap(long)]
        prices: Option<PathBuf>,
    },
}

#[derive(Parser)]
struct Cli {
    #[clap(subcommand)]
    subcommand: Command,
}
