//! Compares ledger holdings with observed wallet balances.
//!
//! Read-only: remediation is left to the caller (see
//! [`ReconciliationItem::suggested_lot`]).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::OnceLock;

use crate::accounting::total_qty;
use crate::ledger::Ledger;
use crate::models::{ReconcileStatus, ReconciliationItem};
use crate::QTY_EPSILON;

/// Relative gap under which wallet and ledger count as equal (0.1%).
pub const BALANCED_TOLERANCE: f64 = 0.001;
/// Balances below this many units are dust.
pub const DUST_QTY: f64 = 1e-5;
/// Dust is kept only when worth more than this.
pub const DUST_MIN_USD: f64 = 0.01;
/// Priced assets without a cost-basis entry are kept only when worth at least this.
pub const UNTRACKED_MIN_USD: f64 = 10.0;

/// A balance reported by the wallet side, with its latest price when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletHolding {
    pub symbol: String,
    #[serde(default)]
    pub token_id: Option<String>,
    pub balance: f64,
    #[serde(default)]
    pub price: Option<f64>,
}

impl WalletHolding {
    pub fn new(symbol: impl Into<String>, balance: f64, price: Option<f64>) -> Self {
        Self {
            symbol: symbol.into(),
            token_id: None,
            balance,
            price,
        }
    }
}

pub fn classify(wallet_balance: f64, ledger_qty: f64) -> ReconcileStatus {
    if ledger_qty.abs() < QTY_EPSILON {
        return ReconcileStatus::NoCostBasis;
    }
    if wallet_balance > 0.0
        && (wallet_balance - ledger_qty).abs() / wallet_balance < BALANCED_TOLERANCE
    {
        return ReconcileStatus::Balanced;
    }
    if wallet_balance > ledger_qty {
        ReconcileStatus::Under
    } else {
        ReconcileStatus::Over
    }
}

pub fn reconcile_item(
    symbol: &str,
    token_id: Option<&str>,
    wallet_balance: f64,
    ledger_qty: f64,
    price: Option<f64>,
) -> ReconciliationItem {
    let price = usable_price(price);
    let difference = wallet_balance - ledger_qty;
    ReconciliationItem {
        token_id: token_id.map(str::to_string),
        symbol: symbol.to_string(),
        wallet_balance,
        ledger_qty,
        difference,
        difference_pct: if wallet_balance != 0.0 {
            difference / wallet_balance * 100.0
        } else {
            0.0
        },
        price,
        difference_usd: price.map(|p| difference * p),
        status: classify(wallet_balance, ledger_qty),
    }
}

fn usable_price(price: Option<f64>) -> Option<f64> {
    price.filter(|p| p.is_finite() && *p > 0.0)
}

fn spam_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(https?://|www\.|\.(com|io|xyz|org|net|app|finance|site|gift|top|link|click|vip|cc)\b|claim|reward|airdrop|voucher|visit|^0x[0-9a-f]{6,}$|^[0-9a-f]{32,}$)",
        )
        .expect("valid spam pattern")
    })
}

/// Whether a token symbol looks like an airdropped scam token.
pub fn is_spam_symbol(symbol: &str) -> bool {
    spam_pattern().is_match(symbol.trim())
}

/// Reconciles every wallet holding against the ledger, dropping zero balances,
/// dust, spam and low-value untracked assets. Results come back with
/// `no_cost_basis` items first, then by descending absolute USD gap.
pub fn reconcile(holdings: &[WalletHolding], ledger: &Ledger) -> Vec<ReconciliationItem> {
    let mut items: Vec<ReconciliationItem> = holdings
        .iter()
        .filter_map(|holding| reconcile_holding(holding, ledger))
        .collect();
    sort_items(&mut items);
    items
}

fn reconcile_holding(holding: &WalletHolding, ledger: &Ledger) -> Option<ReconciliationItem> {
    let balance = holding.balance;
    if !balance.is_finite() || balance <= 0.0 {
        return None;
    }
    let price = usable_price(holding.price);

    if balance < DUST_QTY && !price.map_or(false, |p| balance * p > DUST_MIN_USD) {
        return None;
    }

    let entry = match &holding.token_id {
        Some(token_id) => ledger.get(token_id),
        None => ledger.find(&holding.symbol),
    };

    if entry.is_none() {
        if is_spam_symbol(&holding.symbol) {
            return None;
        }
        if let Some(p) = price {
            if balance * p < UNTRACKED_MIN_USD {
                return None;
            }
        }
    }

    let ledger_qty = entry.map(|e| total_qty(&e.lots)).unwrap_or(0.0);
    let token_id = entry
        .map(|e| e.token_id.as_str())
        .or(holding.token_id.as_deref());
    Some(reconcile_item(&holding.symbol, token_id, balance, ledger_qty, price))
}

pub fn sort_items(items: &mut [ReconciliationItem]) {
    items.sort_by(|a, b| {
        let untracked_first = |item: &ReconciliationItem| item.status != ReconcileStatus::NoCostBasis;
        untracked_first(a)
            .cmp(&untracked_first(b))
            .then_with(|| match (a.difference_usd, b.difference_usd) {
                (Some(x), Some(y)) => y.abs().partial_cmp(&x.abs()).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}
