//! Ledger, order assembly and shared arithmetic of zap building.
pub mod balances;
pub mod math;
pub mod order;

pub use balances::Balances;
