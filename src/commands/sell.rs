use anyhow::Error;

use crate::ledger::Ledger;
use crate::models::{AccountingMethod, SellSimulation};
use crate::round_money;

/// Previews a sale without touching the ledger.
pub fn simulate(
    ledger: &Ledger,
    token_id: &str,
    qty: f64,
    price: f64,
    method: Option<AccountingMethod>,
) -> Result<SellSimulation, Error> {
    let simulation = ledger.preview_sell(token_id, qty, price, method)?;
    if simulation.unfilled_qty > 0.0 {
        log::warn!(
            "Only {} of {} {} can be covered by open lots",
            qty - simulation.unfilled_qty,
            qty,
            token_id
        );
    }
    Ok(simulation)
}

/// Records a sale as a negative lot and returns the allocation it realized.
pub fn sell(
    ledger: &mut Ledger,
    token_id: &str,
    date: &str,
    qty: f64,
    price: f64,
    notes: Option<String>,
    method: Option<AccountingMethod>,
) -> Result<SellSimulation, Error> {
    Ok(ledger.commit_sell(token_id, date, qty, price, notes, method)?)
}

/// Renders a simulation as aligned text lines.
pub fn format_simulation(simulation: &SellSimulation) -> Vec<String> {
    let mut lines = vec![format!(
        "{:>5}  {:<10}  {:>16}  {:>14}  {:>14}  {:>14}",
        "Lot", "Date", "Qty", "Cost Basis", "Proceeds", "Realized"
    )];
    for allocation in &simulation.allocations {
        let index = allocation
            .lot_index
            .map(|i| i.to_string())
            .unwrap_or_else(|| "avg".to_string());
        lines.push(format!(
            "{:>5}  {:<10}  {:>16.8}  {:>14}  {:>14}  {:>14}",
            index,
            allocation.lot_date.as_deref().unwrap_or("-"),
            allocation.qty,
            round_money(allocation.cost_basis),
            round_money(allocation.proceeds),
            round_money(allocation.realized_pnl),
        ));
    }
    lines.push(format!(
        "Total realized: {}  ({} lot(s) remain open)",
        round_money(simulation.total_realized_pnl),
        simulation.remaining_lots.len()
    ));
    if simulation.unfilled_qty > 0.0 {
        lines.push(format!("Unfilled quantity: {:.8}", simulation.unfilled_qty));
    }
    lines
}
