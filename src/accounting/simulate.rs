use crate::accounting::cost_basis::{average_cost, consume, sorted_buy_lots, total_bought_qty};
use crate::models::{AccountingMethod, Lot, SellAllocation, SellSimulation};
use crate::QTY_EPSILON;

/// Previews selling `sell_qty` units at `sell_price` out of the buy lots in `lots`.
///
/// Sell lots in the input are ignored; pass the open position (see
/// [`open_lots`](crate::accounting::open_lots)) to account for earlier sales.
/// The input is never modified.
pub fn simulate_sell(
    lots: &[Lot],
    sell_qty: f64,
    sell_price: f64,
    method: AccountingMethod,
) -> SellSimulation {
    let sell_qty = if sell_qty.is_finite() { sell_qty.max(0.0) } else { 0.0 };

    match method {
        AccountingMethod::Average => simulate_average(lots, sell_qty, sell_price),
        AccountingMethod::Fifo | AccountingMethod::Lifo => {
            simulate_ordered(lots, sell_qty, sell_price, method)
        }
    }
}

fn simulate_ordered(
    lots: &[Lot],
    sell_qty: f64,
    sell_price: f64,
    method: AccountingMethod,
) -> SellSimulation {
    let ordered = sorted_buy_lots(lots, method);
    let consumption = consume(&ordered, sell_qty);

    let allocations: Vec<SellAllocation> = consumption
        .slices
        .iter()
        .map(|&(position, qty)| {
            let lot = &ordered[position];
            let cost_basis = qty * lot.price_per_unit;
            let proceeds = qty * sell_price;
            SellAllocation {
                lot_index: Some(position),
                lot_date: Some(lot.date.clone()),
                qty,
                cost_basis,
                proceeds,
                realized_pnl: proceeds - cost_basis,
            }
        })
        .collect();

    SellSimulation {
        total_realized_pnl: allocations.iter().map(|a| a.realized_pnl).sum(),
        allocations,
        remaining_lots: consumption.remaining,
        unfilled_qty: consumption.unfilled,
    }
}

// Average cost has no source lot: exactly one blended allocation, possibly for
// zero units, and every buy lot shrunk by the same fraction.
fn simulate_average(lots: &[Lot], sell_qty: f64, sell_price: f64) -> SellSimulation {
    let bought = total_bought_qty(lots);
    let filled = sell_qty.min(bought.max(0.0));
    let avg = average_cost(lots);

    let cost_basis = filled * avg;
    let proceeds = filled * sell_price;
    let allocation = SellAllocation {
        lot_index: None,
        lot_date: None,
        qty: filled,
        cost_basis,
        proceeds,
        realized_pnl: proceeds - cost_basis,
    };

    let keep = if bought > 0.0 { 1.0 - filled / bought } else { 0.0 };
    let remaining_lots = lots
        .iter()
        .filter(|lot| lot.is_buy())
        .map(|lot| lot.with_qty(lot.qty * keep))
        .filter(|lot| lot.qty > QTY_EPSILON)
        .collect();

    let unfilled = sell_qty - filled;
    SellSimulation {
        total_realized_pnl: allocation.realized_pnl,
        allocations: vec![allocation],
        remaining_lots,
        unfilled_qty: if unfilled > QTY_EPSILON { unfilled } else { 0.0 },
    }
}
