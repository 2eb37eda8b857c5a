//! Cost basis and profit/loss over one asset's lot history.
//!
//! Every function here is pure: lots are borrowed, never modified, and the
//! result depends only on the arguments. Under FIFO/LIFO the buy lots are
//! consumed in the method's date order and sells are applied in their
//! original list order; changing either order changes the numbers.
//!
//! A history that sells more than it ever bought is clamped: consumption
//! stops once the buy lots run out and the excess realizes nothing.

use crate::models::{AccountingMethod, Lot, PnLResult};
use crate::QTY_EPSILON;

/// Signed sum of every lot quantity.
pub fn total_qty(lots: &[Lot]) -> f64 {
    lots.iter().map(|lot| lot.qty).sum()
}

/// Sum of the absolute quantities of all sell lots.
pub fn total_sold_qty(lots: &[Lot]) -> f64 {
    lots.iter().filter(|lot| lot.is_sell()).map(|lot| -lot.qty).sum()
}

pub fn total_bought_qty(lots: &[Lot]) -> f64 {
    lots.iter().filter(|lot| lot.is_buy()).map(|lot| lot.qty).sum()
}

/// Quantity-weighted mean price of the buy lots, `0` when there are none.
pub fn average_cost(lots: &[Lot]) -> f64 {
    let (cost, qty) = lots
        .iter()
        .filter(|lot| lot.is_buy())
        .fold((0.0, 0.0), |(cost, qty), lot| {
            (cost + lot.cost(), qty + lot.qty)
        });
    if qty > 0.0 {
        cost / qty
    } else {
        0.0
    }
}

/// Buy lots in the order `method` consumes them. The sort is stable, so lots
/// sharing a date keep their recorded order under both FIFO and LIFO.
pub fn sorted_buy_lots(lots: &[Lot], method: AccountingMethod) -> Vec<Lot> {
    let mut buys: Vec<Lot> = lots.iter().filter(|lot| lot.is_buy()).cloned().collect();
    match method {
        AccountingMethod::Fifo => buys.sort_by(|a, b| a.date.cmp(&b.date)),
        AccountingMethod::Lifo => buys.sort_by(|a, b| b.date.cmp(&a.date)),
        AccountingMethod::Average => {}
    }
    buys
}

/// Result of taking a quantity off the front of an ordered list of buy lots.
#[derive(Debug, Clone, PartialEq)]
pub struct Consumption {
    /// `(position in the ordered list, quantity taken)` per lot touched.
    pub slices: Vec<(usize, f64)>,
    /// Lots left afterwards; fragments at or below epsilon are dropped.
    pub remaining: Vec<Lot>,
    /// Quantity the lots could not cover.
    pub unfilled: f64,
}

pub fn consume(ordered_buys: &[Lot], qty: f64) -> Consumption {
    let mut to_consume = qty.max(0.0);
    let mut slices = Vec::new();
    let mut remaining = Vec::with_capacity(ordered_buys.len());

    for (position, lot) in ordered_buys.iter().enumerate() {
        if to_consume <= QTY_EPSILON {
            remaining.push(lot.clone());
            continue;
        }
        let taken = lot.qty.min(to_consume);
        slices.push((position, taken));
        to_consume -= taken;

        let left = lot.qty - taken;
        if left > QTY_EPSILON {
            remaining.push(lot.with_qty(left));
        }
    }

    Consumption {
        slices,
        remaining,
        unfilled: if to_consume > QTY_EPSILON { to_consume } else { 0.0 },
    }
}

/// The buy lots still held after every historical sell, under `method`.
///
/// Average cost has no lot identity, so each buy lot is shrunk by the same
/// fraction (`sold / bought`) instead.
pub fn open_lots(lots: &[Lot], method: AccountingMethod) -> Vec<Lot> {
    let sold = total_sold_qty(lots);
    match method {
        AccountingMethod::Fifo | AccountingMethod::Lifo => {
            consume(&sorted_buy_lots(lots, method), sold).remaining
        }
        AccountingMethod::Average => {
            let bought = total_bought_qty(lots);
            if bought <= 0.0 {
                return Vec::new();
            }
            let keep = 1.0 - (sold / bought).min(1.0);
            lots.iter()
                .filter(|lot| lot.is_buy())
                .map(|lot| lot.with_qty(lot.qty * keep))
                .filter(|lot| lot.qty > QTY_EPSILON)
                .collect()
        }
    }
}

/// Cost of the position still held.
pub fn cost_basis(lots: &[Lot], method: AccountingMethod) -> f64 {
    match method {
        AccountingMethod::Average => average_cost(lots) * total_qty(lots).max(0.0),
        AccountingMethod::Fifo | AccountingMethod::Lifo => open_lots(lots, method)
            .iter()
            .map(Lot::cost)
            .sum(),
    }
}

/// Gain or loss locked in by the sells recorded so far.
pub fn realized_pnl(lots: &[Lot], method: AccountingMethod) -> f64 {
    match method {
        AccountingMethod::Average => {
            // One average over the whole history, not recomputed between sells.
            let avg = average_cost(lots);
            lots.iter()
                .filter(|lot| lot.is_sell())
                .map(|lot| -lot.qty * (lot.price_per_unit - avg))
                .sum()
        }
        AccountingMethod::Fifo | AccountingMethod::Lifo => {
            let pool = sorted_buy_lots(lots, method);
            let mut pool_left: Vec<f64> = pool.iter().map(|lot| lot.qty).collect();
            let mut cursor = 0;
            let mut realized = 0.0;

            for sell in lots.iter().filter(|lot| lot.is_sell()) {
                let mut to_match = -sell.qty;
                while to_match > QTY_EPSILON && cursor < pool.len() {
                    let taken = pool_left[cursor].min(to_match);
                    realized += taken * (sell.price_per_unit - pool[cursor].price_per_unit);
                    pool_left[cursor] -= taken;
                    to_match -= taken;
                    if pool_left[cursor] <= QTY_EPSILON {
                        cursor += 1;
                    }
                }
            }
            realized
        }
    }
}

/// Full P&L snapshot for one asset at `current_price`.
///
/// A missing price should be passed as `0`; non-finite or negative prices are
/// treated the same way.
pub fn token_pnl(
    token_id: &str,
    symbol: &str,
    lots: &[Lot],
    current_price: f64,
    method: AccountingMethod,
) -> PnLResult {
    let current_price = if current_price.is_finite() && current_price > 0.0 {
        current_price
    } else {
        0.0
    };
    let total_qty = total_qty(lots);
    let total_cost_basis = cost_basis(lots, method);
    let current_value = total_qty * current_price;
    let unrealized_pnl = current_value - total_cost_basis;

    PnLResult {
        token_id: token_id.to_string(),
        symbol: symbol.to_string(),
        total_qty,
        current_price,
        current_value,
        total_cost_basis,
        avg_cost_per_unit: if total_qty > QTY_EPSILON {
            total_cost_basis / total_qty
        } else {
            0.0
        },
        unrealized_pnl,
        unrealized_pnl_percent: if total_cost_basis != 0.0 {
            unrealized_pnl / total_cost_basis * 100.0
        } else {
            0.0
        },
        realized_pnl: realized_pnl(lots, method),
        method,
    }
}
