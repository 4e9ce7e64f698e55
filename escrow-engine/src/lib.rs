//! Escrow backend core for peer-to-peer resale marketplaces
//!
//! This crate implements the correctness-critical part of the resale
//! workflow:
//! - The escrow transaction state machine and its audit trail
//! - HMAC-SHA256 verification of payment gateway callbacks
//! - A compare-and-swap transaction store that serializes concurrent
//!   status transitions
//! - The Razorpay order-creation client

pub mod error;
pub mod models;
pub mod payment_gateway;
pub mod store;
pub mod transaction_manager;
pub mod verification_service;

use error::EscrowError;

/// Result type alias for escrow operations
pub type EscrowResult<T> = Result<T, EscrowError>;
