//! Error handling - one hierarchy for every public operation

use thiserror::Error;

use super::types::OrderId;

pub type Result<T> = std::result::Result<T, Error>;

/// simbroker error hierarchy
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-bounds order fields, rejected before insertion
    #[error("Validation error: {0}")]
    Validation(String),

    /// Pre-trade risk limit violation, order never created
    #[error("Risk rejected: {0}")]
    RiskRejected(String),

    /// Unknown order id on get/cancel
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// Operation not permitted in the order's current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Venue unreachable or refused the order
    #[error("Routing failure: {0}")]
    Routing(String),

    /// Execution report referencing an id the ledger has never seen
    #[error("Unknown order for execution: {0}")]
    UnknownOrder(OrderId),

    /// Network/IO errors talking to the venue or notification sink
    #[error("Venue transport error: {0}")]
    Venue(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything unexpected caught at an operation boundary
    #[error("Internal error: {0}")]
    Internal(String),
}
