//! Transaction Store - durable record of transactions and their event log
//!
//! The store is the single source of truth for transaction state. All
//! status changes go through [`TransactionStore::compare_and_swap_status`],
//! a conditional update that succeeds only if the stored status matches the
//! expected prior status. That primitive is what serializes concurrent
//! transitions for the same transaction; the state machine never mutates
//! status any other way.
//!
//! Services receive the store as an explicit `Arc<dyn TransactionStore>`
//! dependency, so tests can substitute an in-memory fake with no
//! process-wide state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{
    Listing, ListingStatus, SellerProfile, Transaction, TransactionEvent, TransactionStatus,
};

/// Error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transaction {0} not found")]
    TransactionNotFound(String),

    #[error("listing {0} not found")]
    ListingNotFound(String),

    /// The conditional update lost: stored status differed from `expected`
    #[error("transaction {id}: expected status {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: TransactionStatus,
        actual: TransactionStatus,
    },

    /// Another transaction already holds the listing in escrow or sold it
    #[error("listing {0} already has an escrowed or completed transaction")]
    ListingTaken(String),

    /// The transaction is already bound to a different gateway order
    #[error("transaction {0} is already bound to a gateway order")]
    OrderAlreadyBound(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Fields applied by a successful compare-and-swap
///
/// `status` is always written; the remaining fields are written only when
/// set. Amount and party identifiers are immutable and deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub status: Option<TransactionStatus>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransactionUpdate {
    /// Update that moves the transaction to a new status
    pub fn to_status(status: TransactionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Durable record of transactions, listings, events, and seller stats
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new transaction; fails if the id is already taken
    async fn insert_transaction(&self, tx: Transaction) -> Result<(), StoreError>;

    /// Load a transaction by id
    async fn transaction(&self, id: &str) -> Result<Transaction, StoreError>;

    /// Conditionally update a transaction
    ///
    /// Succeeds only if the stored status equals `expected`; a losing
    /// concurrent attempt observes [`StoreError::Conflict`]. When the
    /// update moves the transaction into `Escrow`, the store additionally
    /// rejects the swap if another transaction for the same listing is
    /// already escrowed or completed.
    async fn compare_and_swap_status(
        &self,
        id: &str,
        expected: TransactionStatus,
        update: TransactionUpdate,
    ) -> Result<Transaction, StoreError>;

    /// Append an audit event; append-only, never mutated or deleted
    async fn append_event(&self, event: TransactionEvent) -> Result<(), StoreError>;

    /// Events for a transaction, ordered by creation time
    async fn events(&self, transaction_id: &str) -> Result<Vec<TransactionEvent>, StoreError>;

    /// Create the listing record if it does not exist yet
    async fn ensure_listing(&self, listing_id: &str, seller_id: &str) -> Result<(), StoreError>;

    /// Load a listing by id
    async fn listing(&self, id: &str) -> Result<Listing, StoreError>;

    /// Flip a listing to `Sold`
    async fn mark_listing_sold(&self, id: &str) -> Result<(), StoreError>;

    /// Seller statistics, zeroed for sellers never seen before
    async fn seller_profile(&self, seller_id: &str) -> Result<SellerProfile, StoreError>;

    /// Increment the seller's total-sales counter, returning the new value
    async fn increment_seller_sales(&self, seller_id: &str) -> Result<u64, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    transactions: HashMap<String, Transaction>,
    listings: HashMap<String, Listing>,
    events: Vec<TransactionEvent>,
    sellers: HashMap<String, SellerProfile>,
}

/// In-memory store
///
/// A single `RwLock` guards the whole state, so the conditional update in
/// `compare_and_swap_status` (status check, listing-exclusivity check, and
/// write) happens under one write lock and is atomic with respect to
/// concurrent callers.
#[derive(Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_transaction(&self, tx: Transaction) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.transactions.contains_key(&tx.id) {
            return Err(StoreError::Conflict {
                id: tx.id.clone(),
                expected: TransactionStatus::Pending,
                actual: state.transactions[&tx.id].status,
            });
        }
        state.transactions.insert(tx.id.clone(), tx);
        Ok(())
    }

    async fn transaction(&self, id: &str) -> Result<Transaction, StoreError> {
        self.state
            .read()
            .await
            .transactions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::TransactionNotFound(id.to_string()))
    }

    async fn compare_and_swap_status(
        &self,
        id: &str,
        expected: TransactionStatus,
        update: TransactionUpdate,
    ) -> Result<Transaction, StoreError> {
        let mut state = self.state.write().await;

        let current = state
            .transactions
            .get(id)
            .ok_or_else(|| StoreError::TransactionNotFound(id.to_string()))?;

        if current.status != expected {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected,
                actual: current.status,
            });
        }

        // A transaction may carry at most one gateway order.
        if let (Some(new_order), Some(existing)) =
            (update.gateway_order_id.as_deref(), current.gateway_order_id.as_deref())
        {
            if new_order != existing {
                return Err(StoreError::OrderAlreadyBound(id.to_string()));
            }
        }

        // At most one escrowed or completed transaction per listing.
        if update.status == Some(TransactionStatus::Escrow) {
            let listing_id = current.listing_id.clone();
            let taken = state.transactions.values().any(|other| {
                other.id != id
                    && other.listing_id == listing_id
                    && matches!(
                        other.status,
                        TransactionStatus::Escrow | TransactionStatus::Completed
                    )
            });
            if taken {
                return Err(StoreError::ListingTaken(listing_id));
            }
        }

        let tx = state
            .transactions
            .get_mut(id)
            .ok_or_else(|| StoreError::TransactionNotFound(id.to_string()))?;

        if let Some(status) = update.status {
            tx.status = status;
        }
        if let Some(order_id) = update.gateway_order_id {
            tx.gateway_order_id = Some(order_id);
        }
        if let Some(payment_id) = update.gateway_payment_id {
            tx.gateway_payment_id = Some(payment_id);
        }
        if let Some(paid_at) = update.paid_at {
            tx.paid_at = Some(paid_at);
        }
        if let Some(completed_at) = update.completed_at {
            tx.completed_at = Some(completed_at);
        }

        Ok(tx.clone())
    }

    async fn append_event(&self, event: TransactionEvent) -> Result<(), StoreError> {
        self.state.write().await.events.push(event);
        Ok(())
    }

    async fn events(&self, transaction_id: &str) -> Result<Vec<TransactionEvent>, StoreError> {
        let state = self.state.read().await;
        let mut events: Vec<TransactionEvent> = state
            .events
            .iter()
            .filter(|event| event.transaction_id == transaction_id)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.created_at);
        Ok(events)
    }

    async fn ensure_listing(&self, listing_id: &str, seller_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .listings
            .entry(listing_id.to_string())
            .or_insert_with(|| Listing::new(listing_id, seller_id));
        Ok(())
    }

    async fn listing(&self, id: &str) -> Result<Listing, StoreError> {
        self.state
            .read()
            .await
            .listings
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ListingNotFound(id.to_string()))
    }

    async fn mark_listing_sold(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let listing = state
            .listings
            .get_mut(id)
            .ok_or_else(|| StoreError::ListingNotFound(id.to_string()))?;
        listing.status = ListingStatus::Sold;
        Ok(())
    }

    async fn seller_profile(&self, seller_id: &str) -> Result<SellerProfile, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .sellers
            .get(seller_id)
            .cloned()
            .unwrap_or_else(|| SellerProfile::new(seller_id)))
    }

    async fn increment_seller_sales(&self, seller_id: &str) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let profile = state
            .sellers
            .entry(seller_id.to_string())
            .or_insert_with(|| SellerProfile::new(seller_id));
        profile.total_sales += 1;
        profile.last_sale_at = Some(Utc::now());
        profile.updated_at = Utc::now();
        Ok(profile.total_sales)
    }
}
