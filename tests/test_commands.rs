mod common;

use common::{create_balance_csv, create_price_csv, create_test_csv, ledger_with, lot, parse_report_csv, scenario_lots};
use lot_ledger::commands::import::{import_csv, import_transactions, ImportOptions};
use lot_ledger::commands::reconcile::{load_balances, reconciliation_report};
use lot_ledger::commands::report::{load_prices, pnl_report};
use lot_ledger::commands::sell::{format_simulation, simulate};
use lot_ledger::ingest::ExportFormat;
use lot_ledger::ledger::{ImportMode, Ledger};
use lot_ledger::models::AccountingMethod;
use std::collections::HashMap;
use std::fs;

const BINANCE_CSV: &str = "\
Date(UTC),Pair,Side,Price,Executed,Amount,Fee
2024-01-10 09:15:00,ETHUSDT,BUY,2500,2ETH,5000USDT,0.002ETH
2024-02-10 09:15:00,ETHUSDT,SELL,3000,0.5ETH,1500USDT,1.5USDT
";

#[test]
fn test_import_transactions_from_file() {
    let file = create_test_csv(BINANCE_CSV);
    let mut ledger = Ledger::new(AccountingMethod::Fifo);

    let report = import_transactions(&file.path().to_path_buf(), &mut ledger, &ImportOptions::default()).unwrap();
    assert_eq!(report.format, ExportFormat::Binance);
    assert_eq!(report.summary.token_id, "eth");
    assert_eq!(report.summary.imported, 2);
    assert!(report.warnings.is_empty());

    let entry = ledger.get("eth").unwrap();
    assert_eq!(entry.symbol, "ETH");
    assert_eq!(entry.lots[1].qty, -0.5);
}

#[test]
fn test_import_reuses_existing_entry_for_symbol() {
    let mut ledger = ledger_with("ethereum", "ETH", vec![lot("2023-12-01", 1.0, 2000.0)]);
    let report = import_csv(BINANCE_CSV, &mut ledger, &ImportOptions::default()).unwrap();
    assert_eq!(report.summary.token_id, "ethereum");
    assert_eq!(report.summary.total, 3);
    assert!(ledger.get("eth").is_none());

    let options = ImportOptions {
        mode: ImportMode::Replace,
        ..ImportOptions::default()
    };
    let report = import_csv(BINANCE_CSV, &mut ledger, &options).unwrap();
    assert_eq!(report.summary.total, 2);
}

#[test]
fn test_import_with_explicit_token_and_symbol() {
    let csv = "date,quantity,price\n2024-01-01,3,1.25\n";
    let mut ledger = Ledger::new(AccountingMethod::Average);
    let options = ImportOptions {
        token_id: Some("usd-coin".to_string()),
        symbol: Some("usdc".to_string()),
        ..ImportOptions::default()
    };
    let report = import_csv(csv, &mut ledger, &options).unwrap();
    assert_eq!(report.summary.token_id, "usd-coin");
    let entry = ledger.get("usd-coin").unwrap();
    assert_eq!(entry.symbol, "USDC");
    assert_eq!(entry.accounting_method, AccountingMethod::Average);
}

#[test]
fn test_import_fails_when_nothing_importable() {
    let csv = "\
Timestamp,Transaction Type,Asset,Quantity Transacted,Spot Price at Transaction
2024-02-01T08:00:00Z,Send,BTC,0.1,43000
2024-02-02T08:00:00Z,Receive,BTC,0.1,43000
";
    let mut ledger = Ledger::new(AccountingMethod::Fifo);
    let err = import_csv(csv, &mut ledger, &ImportOptions::default()).unwrap_err();
    assert!(err.to_string().contains("No importable rows found (2 skipped)"));
    assert!(ledger.is_empty());
}

#[test]
fn test_symbol_acts_as_filter_when_no_filter_given() {
    let mut ledger = Ledger::new(AccountingMethod::Fifo);
    let options = ImportOptions {
        symbol: Some("xbt".to_string()),
        ..ImportOptions::default()
    };
    let err = import_csv(BINANCE_CSV, &mut ledger, &options).unwrap_err();
    assert!(err.to_string().contains("No importable rows found for symbol XBT"));
    assert!(ledger.is_empty());

    let options = ImportOptions {
        symbol: Some("eth".to_string()),
        ..ImportOptions::default()
    };
    let report = import_csv(BINANCE_CSV, &mut ledger, &options).unwrap();
    assert_eq!(report.summary.imported, 2);
}

#[test]
fn test_filtered_import_ignores_broken_rows_of_other_assets() {
    let csv = "date,symbol,quantity,price\n2024-01-01,BTC,1,100\n2024-01-02,ETH,abc,10\n2024-01-03,ETH,,10\n";
    let mut ledger = Ledger::new(AccountingMethod::Fifo);
    let options = ImportOptions {
        filter: Some("BTC".to_string()),
        ..ImportOptions::default()
    };
    let report = import_csv(csv, &mut ledger, &options).unwrap();
    assert_eq!(report.summary.token_id, "btc");
    assert_eq!(report.summary.imported, 1);
    assert!(report.warnings.is_empty());
}

#[test]
fn test_import_fails_on_row_errors() {
    let csv = "date,symbol,quantity,price\n2024-01-01,BTC,1,100\n2024-01-02,BTC,1,oops\n";
    let mut ledger = Ledger::new(AccountingMethod::Fifo);
    let err = import_csv(csv, &mut ledger, &ImportOptions::default()).unwrap_err();
    assert!(err.to_string().contains("Line 3"));
    assert!(ledger.is_empty());
}

#[test]
fn test_import_without_symbol_needs_one() {
    let csv = "date,quantity,price\n2024-01-01,1,100\n";
    let mut ledger = Ledger::new(AccountingMethod::Fifo);
    assert!(import_csv(csv, &mut ledger, &ImportOptions::default()).is_err());
}

#[test]
fn test_import_rejects_dates_that_do_not_normalize() {
    let csv = "date,symbol,quantity,price\nyesterday,BTC,1,100\n";
    let mut ledger = Ledger::new(AccountingMethod::Fifo);
    let err = import_csv(csv, &mut ledger, &ImportOptions::default()).unwrap_err();
    assert!(err.to_string().contains("date"));
}

#[test]
fn test_load_prices() {
    let file = create_price_csv(&[("btc", "$70,000.00"), ("ETH", "3000")]);
    let prices = load_prices(file.path()).unwrap();
    assert_eq!(prices.get("BTC"), Some(&70_000.0));
    assert_eq!(prices.get("ETH"), Some(&3000.0));

    let bad = create_price_csv(&[("BTC", "n/a")]);
    assert!(load_prices(bad.path()).is_err());
}

#[test]
fn test_pnl_report_written_with_totals() {
    let mut ledger = ledger_with("bitcoin", "BTC", scenario_lots());
    ledger.add_lot("ethereum", "ETH", lot("2024-01-01", 2.0, 2000.0)).unwrap();
    let mut prices = HashMap::new();
    prices.insert("BTC".to_string(), 70_000.0);
    prices.insert("ETH".to_string(), 3000.0);

    let dir = tempfile::tempdir().unwrap();
    let (path, results) = pnl_report(&ledger, &prices, Some(AccountingMethod::Lifo), dir.path()).unwrap();
    assert_eq!(path, dir.path().join("pnl_lifo.csv"));
    assert_eq!(results.len(), 2);

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("TokenId,Symbol,Method,Quantity,Price,MarketValue,CostBasis"));
    let rows = parse_report_csv(&content);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], "bitcoin");
    assert_eq!(rows[0][2], "lifo");
    assert_eq!(rows[0][6].parse::<f64>().unwrap(), 40_000.0);
    assert_eq!(rows[0][10].parse::<f64>().unwrap(), 5_000.0);

    let totals = &rows[2];
    assert_eq!(totals[1], "TOTAL");
    assert_eq!(totals[5].parse::<f64>().unwrap(), 76_000.0);
    assert_eq!(totals[6].parse::<f64>().unwrap(), 44_000.0);
    assert_eq!(totals[8].parse::<f64>().unwrap(), 32_000.0);
}

#[test]
fn test_pnl_report_uses_entry_methods_by_default() {
    let ledger = ledger_with("bitcoin", "BTC", scenario_lots());
    let dir = tempfile::tempdir().unwrap();
    let (path, results) = pnl_report(&ledger, &HashMap::new(), None, dir.path()).unwrap();
    assert_eq!(path.file_name().unwrap(), "pnl_entry.csv");
    assert_eq!(results[0].method, AccountingMethod::Fifo);
    assert_eq!(results[0].current_value, 0.0);
}

#[test]
fn test_reconciliation_report() {
    let ledger = ledger_with("bitcoin", "BTC", scenario_lots());
    let prices_file = create_price_csv(&[("BTC", "60000"), ("SHIB", "0.00001")]);
    let balances_file = create_balance_csv(&[
        ("BTC", "1.25"),
        ("DOGE", "100"),
        ("SHIB", "1000"),
        ("claim-rewards.xyz", "5000"),
    ]);

    let prices = load_prices(prices_file.path()).unwrap();
    let holdings = load_balances(balances_file.path(), &prices).unwrap();
    assert_eq!(holdings.len(), 4);
    assert_eq!(holdings[0].price, Some(60_000.0));
    assert_eq!(holdings[1].price, None);

    let dir = tempfile::tempdir().unwrap();
    let (path, items) = reconciliation_report(&ledger, &holdings, dir.path()).unwrap();
    assert_eq!(path, dir.path().join("reconciliation.csv"));

    let symbols: Vec<&str> = items.iter().map(|i| i.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["DOGE", "BTC"]);

    let rows = parse_report_csv(&fs::read_to_string(&path).unwrap());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][1], "no_cost_basis");
    assert_eq!(rows[0][6], "");
    assert_eq!(rows[1][1], "under");
    assert_eq!(rows[1][4].parse::<f64>().unwrap(), 0.25);
    assert_eq!(rows[1][7].parse::<f64>().unwrap(), 15_000.0);
}

#[test]
fn test_simulate_command_leaves_ledger_alone() {
    let ledger = ledger_with("bitcoin", "BTC", scenario_lots());
    let before = ledger.clone();
    let simulation = simulate(&ledger, "bitcoin", 2.0, 70_000.0, Some(AccountingMethod::Average)).unwrap();
    assert!(simulation.unfilled_qty > 0.0);
    assert_eq!(ledger, before);

    let lines = format_simulation(&simulation);
    assert!(lines[1].trim_start().starts_with("avg"));
    assert!(lines.last().unwrap().starts_with("Unfilled quantity"));
}
