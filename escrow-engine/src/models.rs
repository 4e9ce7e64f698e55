//! Core data models for the resale escrow system
//!
//! This module contains the listing, transaction, audit-event, and
//! seller-statistics models together with the transaction state machine
//! definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EscrowError;
use crate::EscrowResult;

/// Transaction state machine enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Order created (or about to be), awaiting payment
    Pending,
    /// Payment captured and held, awaiting delivery confirmation
    Escrow,
    /// Delivery confirmed, funds released to the seller
    Completed,
    /// Funds returned to the buyer
    Refunded,
    /// Under arbitration
    Disputed,
}

impl TransactionStatus {
    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Refunded | Self::Disputed)
    }

    /// Check if this state allows payment confirmation
    pub fn can_confirm_payment(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Check if this state allows delivery confirmation
    pub fn can_confirm_delivery(&self) -> bool {
        matches!(self, Self::Escrow)
    }

    /// Check if this state still holds or awaits buyer funds
    pub fn can_abandon(&self) -> bool {
        matches!(self, Self::Pending | Self::Escrow)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Escrow => "escrow",
            Self::Completed => "completed",
            Self::Refunded => "refunded",
            Self::Disputed => "disputed",
        };
        f.write_str(s)
    }
}

/// Listing status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Offered for sale
    Active,
    /// Sold through a completed transaction
    Sold,
    /// Withdrawn by the seller
    Removed,
}

/// An item offered for resale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub seller_id: String,
    pub status: ListingStatus,
}

impl Listing {
    pub fn new(id: impl Into<String>, seller_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            seller_id: seller_id.into(),
            status: ListingStatus::Active,
        }
    }
}

/// One escrow-mediated sale attempt
///
/// Identifiers are opaque strings supplied by the caller; the gateway
/// identifiers stay `None` until the order is created and paid. The amount
/// is in the minor currency unit and immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub listing_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub amount: i64,
    pub status: TransactionStatus,

    // Gateway references
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Create a new pending transaction
    pub fn new(
        id: impl Into<String>,
        listing_id: impl Into<String>,
        buyer_id: impl Into<String>,
        seller_id: impl Into<String>,
        amount: i64,
    ) -> Self {
        Self {
            id: id.into(),
            listing_id: listing_id.into(),
            buyer_id: buyer_id.into(),
            seller_id: seller_id.into(),
            amount,
            status: TransactionStatus::Pending,
            gateway_order_id: None,
            gateway_payment_id: None,
            created_at: Utc::now(),
            paid_at: None,
            completed_at: None,
        }
    }

    /// Validate a state transition
    ///
    /// The state graph is `pending -> escrow -> completed`, with
    /// `refunded`/`disputed` reachable from either non-terminal state.
    /// No transition skips a state.
    pub fn validate_transition(&self, to: TransactionStatus) -> EscrowResult<()> {
        use TransactionStatus::*;

        let valid = matches!(
            (self.status, to),
            (Pending, Escrow)
                | (Pending, Refunded)
                | (Pending, Disputed)
                | (Escrow, Completed)
                | (Escrow, Refunded)
                | (Escrow, Disputed)
        );

        if valid {
            Ok(())
        } else {
            Err(EscrowError::invalid_transition(
                self.status,
                to,
                "transition not allowed by the escrow state graph",
            ))
        }
    }
}

/// Immutable audit record tied to a transaction
///
/// Appended once per successful transition; ordering by `created_at`
/// reconstructs the transaction's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub id: String,
    pub transaction_id: String,
    pub event_type: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl TransactionEvent {
    pub fn new(
        transaction_id: impl Into<String>,
        event_type: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id.into(),
            event_type: event_type.into(),
            note: note.into(),
            created_at: Utc::now(),
        }
    }
}

/// Seller-statistics slice of a profile
///
/// `total_sales` is incremented exactly once per completed transaction, as
/// a best-effort side effect of delivery confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerProfile {
    pub seller_id: String,
    pub total_sales: u64,
    pub last_sale_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SellerProfile {
    pub fn new(seller_id: impl Into<String>) -> Self {
        Self {
            seller_id: seller_id.into(),
            total_sales: 0,
            last_sale_at: None,
            updated_at: Utc::now(),
        }
    }
}

/// A payment order as echoed back by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}
