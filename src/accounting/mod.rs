pub mod cost_basis;
pub mod simulate;

pub use cost_basis::{
    average_cost, cost_basis, open_lots, realized_pnl, sorted_buy_lots, token_pnl, total_qty,
};
pub use simulate::simulate_sell;
