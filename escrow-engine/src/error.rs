//! Error types for the resale escrow system
//!
//! The taxonomy mirrors how failures are surfaced to callers: validation
//! and signature failures are terminal for the request, transition
//! failures are safe to report as "already processed", and gateway/storage
//! failures carry enough detail for the caller to decide about retrying.

use thiserror::Error;

use crate::models::TransactionStatus;
use crate::store::StoreError;

/// Main error type for escrow operations
#[derive(Error, Debug)]
pub enum EscrowError {
    /// Missing or malformed input, user-correctable
    #[error("validation error: {0}")]
    Validation(String),

    /// Payment callback failed message authentication
    #[error("invalid payment signature")]
    InvalidSignature,

    /// State machine precondition violated, including replayed callbacks
    #[error("invalid state transition: {from} -> {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Referenced transaction or listing does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// External payment gateway failure, retryable by the caller
    #[error("payment gateway error: {0}")]
    UpstreamPayment(String),

    /// Persistence layer failure, retryable by the caller
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// General internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl EscrowError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a state transition error
    pub fn invalid_transition<S: Into<String>>(
        from: TransactionStatus,
        to: TransactionStatus,
        reason: S,
    ) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an upstream gateway error
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        Self::UpstreamPayment(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<StoreError> for EscrowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TransactionNotFound(id) => Self::NotFound(format!("transaction {id}")),
            StoreError::ListingNotFound(id) => Self::NotFound(format!("listing {id}")),
            StoreError::Conflict {
                expected, actual, ..
            } => Self::InvalidTransition {
                from: actual.to_string(),
                to: expected.to_string(),
                reason: "transaction status changed concurrently".to_string(),
            },
            StoreError::ListingTaken(listing_id) => Self::InvalidTransition {
                from: TransactionStatus::Pending.to_string(),
                to: TransactionStatus::Escrow.to_string(),
                reason: format!("listing {listing_id} already has an active escrow"),
            },
            StoreError::OrderAlreadyBound(id) => Self::InvalidTransition {
                from: TransactionStatus::Pending.to_string(),
                to: TransactionStatus::Pending.to_string(),
                reason: format!("transaction {id} is already bound to a gateway order"),
            },
            StoreError::Unavailable(msg) => Self::StorageUnavailable(msg),
        }
    }
}
