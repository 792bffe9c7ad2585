use rust_decimal::Decimal;
use thiserror::Error;

use crate::{models::zap::ZapAction, simulation::errors::SimulationError};

/// Bad caller input. Raised before any external call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Input amount must be greater than zero for {token}")]
    ZeroAmount { token: String },
    #[error("Expected {expected} input token(s), got {actual}")]
    WrongInputCount { expected: usize, actual: usize },
    #[error("Token mismatch: expected {expected}, got {actual}")]
    TokenMismatch { expected: String, actual: String },
    #[error("Slippage must be at least 0 and below 1, got {slippage}")]
    InvalidSlippage { slippage: Decimal },
}

/// Domain failures meant to be rendered to the user; fields are structured so they can be
/// localized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZapUiError {
    #[error("Pool price is outside the calm zone, {action} is paused")]
    PriceOutsideCalmZone { action: ZapAction },
    #[error("Position accepts no single sided deposit of {token} at the current price")]
    NoSingleSidedDeposit { token: String },
}

/// Ledger invariant violation: a strategy consumed more than it had.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("Balance of {token} would become negative: {balance}")]
    Negative { token: String, balance: Decimal },
}

/// Failures of external collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Aggregator error: {0}")]
    Aggregator(String),
    #[error("Bridge error: {0}")]
    Bridge(String),
    #[error("Vault error: {0}")]
    Vault(String),
    #[error("State error: {0}")]
    State(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ZapError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InputError),
    #[error("No route found: {0}")]
    RouteNotFound(String),
    #[error("Quote changed for {token}: expected at least {expected}, got {actual}")]
    QuoteChanged { token: String, expected: Decimal, actual: Decimal },
    #[error(transparent)]
    Ui(#[from] ZapUiError),
    #[error(transparent)]
    Balance(#[from] BalanceError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl ZapError {
    pub fn route_not_found(msg: impl Into<String>) -> Self {
        ZapError::RouteNotFound(msg.into())
    }

    /// Errors the caller can fix by requesting a new quote.
    pub fn is_stale_quote(&self) -> bool {
        matches!(self, ZapError::QuoteChanged { .. })
    }
}
