pub mod import;
pub mod reconcile;
pub mod report;
pub mod sell;
