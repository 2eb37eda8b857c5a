mod common;

use approx::assert_abs_diff_eq;
use common::{buys_only, lot};
use lot_ledger::accounting::simulate_sell;
use lot_ledger::models::AccountingMethod::{Average, Fifo, Lifo};

#[test]
fn test_average_returns_single_unattributed_allocation() {
    let lots = buys_only();
    let simulation = simulate_sell(&lots, 3.5, 40.0, Average);

    assert_eq!(simulation.allocations.len(), 1);
    let allocation = &simulation.allocations[0];
    assert_eq!(allocation.lot_index, None);
    assert_abs_diff_eq!(allocation.qty, 3.5, epsilon = 1e-12);

    let avg = 150.0 / 7.0;
    assert_abs_diff_eq!(allocation.cost_basis, 3.5 * avg, epsilon = 1e-9);
    assert_abs_diff_eq!(allocation.proceeds, 140.0, epsilon = 1e-9);
    assert_abs_diff_eq!(simulation.total_realized_pnl, 140.0 - 3.5 * avg, epsilon = 1e-9);

    let json = serde_json::to_value(&simulation).unwrap();
    assert_eq!(json["allocations"][0]["lot_index"], -1);
}

#[test]
fn test_average_shrinks_every_lot_proportionally() {
    let lots = buys_only();
    let simulation = simulate_sell(&lots, 3.5, 40.0, Average);

    assert_eq!(simulation.remaining_lots.len(), 3);
    for (remaining, original) in simulation.remaining_lots.iter().zip(&lots) {
        assert_eq!(remaining.date, original.date);
        assert_abs_diff_eq!(remaining.qty, original.qty * 0.5, epsilon = 1e-12);
    }
}

#[test]
fn test_fifo_allocates_oldest_lots_first() {
    let lots = buys_only();
    let simulation = simulate_sell(&lots, 3.0, 40.0, Fifo);

    // Oldest is 1.0 @ 10 (Jan), then 4.0 @ 20 (Feb)
    assert_eq!(simulation.allocations.len(), 2);
    assert_eq!(simulation.allocations[0].lot_index, Some(0));
    assert_eq!(simulation.allocations[0].lot_date.as_deref(), Some("2024-01-01"));
    assert_abs_diff_eq!(simulation.allocations[0].qty, 1.0, epsilon = 1e-12);
    assert_eq!(simulation.allocations[1].lot_index, Some(1));
    assert_abs_diff_eq!(simulation.allocations[1].qty, 2.0, epsilon = 1e-12);

    assert_abs_diff_eq!(simulation.total_realized_pnl, (40.0 - 10.0) + 2.0 * (40.0 - 20.0), epsilon = 1e-9);

    assert_eq!(simulation.remaining_lots.len(), 2);
    assert_eq!(simulation.remaining_lots[0].date, "2024-02-01");
    assert_abs_diff_eq!(simulation.remaining_lots[0].qty, 2.0, epsilon = 1e-12);
    assert_eq!(simulation.remaining_lots[1].date, "2024-03-01");
    assert_eq!(simulation.unfilled_qty, 0.0);
}

#[test]
fn test_lifo_allocates_newest_lots_first() {
    let lots = buys_only();
    let simulation = simulate_sell(&lots, 2.5, 40.0, Lifo);

    assert_eq!(simulation.allocations.len(), 2);
    assert_eq!(simulation.allocations[0].lot_date.as_deref(), Some("2024-03-01"));
    assert_abs_diff_eq!(simulation.allocations[0].qty, 2.0, epsilon = 1e-12);
    assert_eq!(simulation.allocations[1].lot_date.as_deref(), Some("2024-02-01"));
    assert_abs_diff_eq!(simulation.allocations[1].qty, 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(simulation.total_realized_pnl, 2.0 * 10.0 + 0.5 * 20.0, epsilon = 1e-9);
}

#[test]
fn test_exact_lot_consumption_drops_lot() {
    let lots = vec![lot("2024-01-01", 0.3, 10.0), lot("2024-01-02", 0.7, 20.0)];
    let simulation = simulate_sell(&lots, 0.1 + 0.2, 15.0, Fifo);
    assert_eq!(simulation.allocations.len(), 1);
    assert_eq!(simulation.remaining_lots.len(), 1);
    assert_eq!(simulation.remaining_lots[0].date, "2024-01-02");
}

#[test]
fn test_simulation_does_not_mutate_input() {
    let lots = buys_only();
    let before = lots.clone();
    let _ = simulate_sell(&lots, 5.0, 40.0, Fifo);
    let _ = simulate_sell(&lots, 5.0, 40.0, Average);
    assert_eq!(lots, before);
}

#[test]
fn test_sell_lots_in_input_are_ignored() {
    let lots = vec![lot("2024-01-01", 1.0, 10.0), lot("2024-01-02", -0.5, 20.0)];
    let simulation = simulate_sell(&lots, 0.5, 30.0, Fifo);
    assert_eq!(simulation.allocations.len(), 1);
    assert_abs_diff_eq!(simulation.remaining_lots[0].qty, 0.5, epsilon = 1e-12);
}

#[test]
fn test_oversized_sale_reports_unfilled() {
    let lots = vec![lot("2024-01-01", 1.0, 10.0)];
    let fifo = simulate_sell(&lots, 1.5, 20.0, Fifo);
    assert_abs_diff_eq!(fifo.unfilled_qty, 0.5, epsilon = 1e-12);
    assert!(fifo.remaining_lots.is_empty());
    assert_abs_diff_eq!(fifo.total_realized_pnl, 10.0, epsilon = 1e-9);

    let average = simulate_sell(&lots, 1.5, 20.0, Average);
    assert_abs_diff_eq!(average.unfilled_qty, 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(average.allocations[0].qty, 1.0, epsilon = 1e-12);
    assert!(average.remaining_lots.is_empty());
}

#[test]
fn test_average_always_returns_one_allocation() {
    let lots = vec![lot("2024-01-01", 1.0, 10.0)];
    let nothing_sold = simulate_sell(&lots, 0.0, 20.0, Average);
    assert_eq!(nothing_sold.allocations.len(), 1);
    assert_eq!(nothing_sold.allocations[0].lot_index, None);
    assert_eq!(nothing_sold.allocations[0].qty, 0.0);
    assert_eq!(nothing_sold.total_realized_pnl, 0.0);
    assert_eq!(nothing_sold.remaining_lots, lots);

    let no_lots = simulate_sell(&[], 1.0, 20.0, Average);
    assert_eq!(no_lots.allocations.len(), 1);
    assert_eq!(no_lots.allocations[0].qty, 0.0);
    assert_abs_diff_eq!(no_lots.unfilled_qty, 1.0, epsilon = 1e-12);
}
