#![allow(dead_code)]

use lot_ledger::ledger::Ledger;
use lot_ledger::models::{AccountingMethod, Lot};
use std::io::Write;
use tempfile::NamedTempFile;

pub fn lot(date: &str, qty: f64, price: f64) -> Lot {
    Lot::new(date, qty, price)
}

/// Two buys at different prices followed by a partial sell.
pub fn scenario_lots() -> Vec<Lot> {
    vec![
        lot("2024-01-01", 1.0, 40_000.0),
        lot("2024-02-01", 0.5, 50_000.0),
        lot("2024-03-01", -0.5, 60_000.0),
    ]
}

pub fn buys_only() -> Vec<Lot> {
    vec![
        lot("2024-03-01", 2.0, 30.0),
        lot("2024-01-01", 1.0, 10.0),
        lot("2024-02-01", 4.0, 20.0),
    ]
}

pub fn ledger_with(token_id: &str, symbol: &str, lots: Vec<Lot>) -> Ledger {
    let mut ledger = Ledger::new(AccountingMethod::Fifo);
    for lot in lots {
        ledger.add_lot(token_id, symbol, lot).unwrap();
    }
    ledger
}

pub fn create_test_csv(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("Failed to create temp CSV file");
    write!(file, "{}", contents).unwrap();
    file.flush().unwrap();
    file
}

pub fn create_price_csv(records: &[(&str, &str)]) -> NamedTempFile {
    let mut contents = String::from("Symbol,Price\n");
    for (symbol, price) in records {
        contents.push_str(&format!("{},\"{}\"\n", symbol, price));
    }
    create_test_csv(&contents)
}

pub fn create_balance_csv(records: &[(&str, &str)]) -> NamedTempFile {
    let mut contents = String::from("Symbol,Balance\n");
    for (symbol, balance) in records {
        contents.push_str(&format!("{},{}\n", symbol, balance));
    }
    create_test_csv(&contents)
}

pub fn parse_report_csv(content: &str) -> Vec<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(content.as_bytes());
    rdr.records()
        .filter_map(|r| r.ok())
        .map(|r| r.iter().map(|s| s.to_string()).collect())
        .collect()
}
