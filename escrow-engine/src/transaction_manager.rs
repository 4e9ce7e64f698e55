//! Transaction Manager - the escrow state machine
//!
//! Coordinates the transaction lifecycle from order initiation through
//! payment confirmation and delivery confirmation. Every status change
//! goes through the store's compare-and-swap, so concurrent requests for
//! the same transaction are serialized at the status level; a losing
//! attempt observes a conflict and fails with `InvalidTransition` rather
//! than retrying, because its precondition no longer holds.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::EscrowError;
use crate::models::{GatewayOrder, Transaction, TransactionEvent, TransactionStatus};
use crate::payment_gateway::{GatewayOrderRequest, PaymentGateway};
use crate::store::{StoreError, TransactionStore, TransactionUpdate};
use crate::verification_service::SignatureVerifier;
use crate::EscrowResult;

/// Configuration for the transaction manager
#[derive(Debug, Clone)]
pub struct TransactionManagerConfig {
    /// Order currency (ISO 4217)
    pub currency: String,
    /// Maximum transaction amount in the minor currency unit
    pub max_amount: i64,
}

impl Default for TransactionManagerConfig {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            max_amount: 10_000_000,
        }
    }
}

/// Order initiation request
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub transaction_id: String,
    pub listing_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub amount: i64,
}

/// Payment confirmation request, built from a gateway callback
#[derive(Debug, Clone)]
pub struct ConfirmPaymentRequest {
    pub transaction_id: String,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

/// Main manager that drives escrow transactions through their lifecycle
///
/// All collaborators are constructor-injected so tests can substitute
/// in-memory fakes.
pub struct TransactionManager {
    config: TransactionManagerConfig,
    store: Arc<dyn TransactionStore>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
}

impl TransactionManager {
    pub fn new(
        config: TransactionManagerConfig,
        store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: SignatureVerifier,
    ) -> Self {
        Self {
            config,
            store,
            gateway,
            verifier,
        }
    }

    /// Create a gateway payment order for a transaction
    ///
    /// Creates the pending transaction record on first invocation.
    /// Re-invocation for a transaction that already carries a gateway
    /// order returns that order instead of creating a duplicate. The
    /// gateway is called before any store write, so a gateway failure or
    /// timeout leaves the store untouched and the operation retryable.
    pub async fn create_order(&self, request: CreateOrderRequest) -> EscrowResult<GatewayOrder> {
        self.validate_create_order_request(&request)?;

        let existing = match self.store.transaction(&request.transaction_id).await {
            Ok(tx) => Some(tx),
            Err(StoreError::TransactionNotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(tx) = &existing {
            if !tx.status.can_confirm_payment() {
                return Err(EscrowError::invalid_transition(
                    tx.status,
                    TransactionStatus::Pending,
                    "order can only be created for a pending transaction",
                ));
            }
            if tx.amount != request.amount {
                return Err(EscrowError::validation(
                    "amount differs from the recorded transaction",
                ));
            }
            if let Some(order_id) = &tx.gateway_order_id {
                info!(
                    "Reusing existing gateway order {} for transaction {}",
                    order_id, tx.id
                );
                return Ok(self.order_echo(order_id, tx.amount));
            }
        }

        let order = self
            .gateway
            .create_order(GatewayOrderRequest {
                transaction_id: request.transaction_id.clone(),
                listing_id: request.listing_id.clone(),
                buyer_id: request.buyer_id.clone(),
                seller_id: request.seller_id.clone(),
                amount: request.amount,
                currency: self.config.currency.clone(),
            })
            .await?;

        self.store
            .ensure_listing(&request.listing_id, &request.seller_id)
            .await?;

        if existing.is_none() {
            let tx = Transaction::new(
                &request.transaction_id,
                &request.listing_id,
                &request.buyer_id,
                &request.seller_id,
                request.amount,
            );
            match self.store.insert_transaction(tx).await {
                // A concurrent invocation created the record first; fall
                // through and race on binding the order id.
                Ok(()) | Err(StoreError::Conflict { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let update = TransactionUpdate {
            status: Some(TransactionStatus::Pending),
            gateway_order_id: Some(order.id.clone()),
            ..TransactionUpdate::default()
        };
        match self
            .store
            .compare_and_swap_status(&request.transaction_id, TransactionStatus::Pending, update)
            .await
        {
            Ok(_) => {
                info!(
                    "Created order {} for transaction {} ({} {})",
                    order.id, request.transaction_id, order.amount, order.currency
                );
                Ok(order)
            }
            Err(StoreError::OrderAlreadyBound(_)) => {
                // Lost a concurrent create; hand back the order that won.
                let tx = self.store.transaction(&request.transaction_id).await?;
                let order_id = tx.gateway_order_id.ok_or_else(|| {
                    EscrowError::internal("transaction bound to an order that vanished")
                })?;
                Ok(self.order_echo(&order_id, tx.amount))
            }
            Err(e) => Err(Self::cas_error(e, TransactionStatus::Pending)),
        }
    }

    /// Confirm a buyer payment reported by a gateway callback
    ///
    /// The signature is verified before the store is touched; an
    /// unverified callback never mutates anything. A replayed callback
    /// for an already-escrowed transaction fails with `InvalidTransition`
    /// and appends no second event.
    pub async fn confirm_payment(
        &self,
        request: ConfirmPaymentRequest,
    ) -> EscrowResult<Transaction> {
        self.verifier.verify(
            &request.gateway_order_id,
            &request.gateway_payment_id,
            &request.signature,
        )?;

        let tx = self.store.transaction(&request.transaction_id).await?;
        tx.validate_transition(TransactionStatus::Escrow)?;

        if let Some(known) = &tx.gateway_order_id {
            if known != &request.gateway_order_id {
                return Err(EscrowError::validation(
                    "callback order id does not match the transaction",
                ));
            }
        }

        let update = TransactionUpdate {
            status: Some(TransactionStatus::Escrow),
            gateway_order_id: Some(request.gateway_order_id.clone()),
            gateway_payment_id: Some(request.gateway_payment_id.clone()),
            paid_at: Some(Utc::now()),
            ..TransactionUpdate::default()
        };
        let tx = self
            .store
            .compare_and_swap_status(&request.transaction_id, TransactionStatus::Pending, update)
            .await
            .map_err(|e| Self::cas_error(e, TransactionStatus::Escrow))?;

        self.store
            .append_event(TransactionEvent::new(
                &tx.id,
                "payment_received",
                format!(
                    "payment {} captured for order {}",
                    request.gateway_payment_id, request.gateway_order_id
                ),
            ))
            .await?;

        info!(
            "Transaction {} moved to escrow (payment {})",
            tx.id, request.gateway_payment_id
        );

        Ok(tx)
    }

    /// Confirm delivery and release escrowed funds to the seller
    ///
    /// The status change commits atomically through the CAS. The listing
    /// flip, audit event, and seller counter are best-effort: their
    /// failure is logged and repaired by reconciliation, never rolled
    /// back, because funds-release correctness does not depend on them.
    pub async fn confirm_delivery(&self, transaction_id: &str) -> EscrowResult<Transaction> {
        let tx = self.store.transaction(transaction_id).await?;
        tx.validate_transition(TransactionStatus::Completed)?;

        let update = TransactionUpdate {
            status: Some(TransactionStatus::Completed),
            completed_at: Some(Utc::now()),
            ..TransactionUpdate::default()
        };
        let tx = self
            .store
            .compare_and_swap_status(transaction_id, TransactionStatus::Escrow, update)
            .await
            .map_err(|e| Self::cas_error(e, TransactionStatus::Completed))?;

        if let Err(e) = self.store.mark_listing_sold(&tx.listing_id).await {
            warn!(
                "Transaction {} completed but listing {} not marked sold: {}",
                tx.id, tx.listing_id, e
            );
        }

        if let Err(e) = self
            .store
            .append_event(TransactionEvent::new(
                &tx.id,
                "delivery_confirmed",
                "buyer confirmed delivery, funds released",
            ))
            .await
        {
            warn!("Transaction {} completed but event not recorded: {}", tx.id, e);
        }

        match self.store.increment_seller_sales(&tx.seller_id).await {
            Ok(total) => info!(
                "Transaction {} completed, seller {} total sales now {}",
                tx.id, tx.seller_id, total
            ),
            Err(e) => warn!(
                "Transaction {} completed but seller {} counter not updated: {}",
                tx.id, tx.seller_id, e
            ),
        }

        Ok(tx)
    }

    /// Refund an abandoned or returned transaction
    pub async fn refund(&self, transaction_id: &str, note: &str) -> EscrowResult<Transaction> {
        self.abandon(transaction_id, TransactionStatus::Refunded, "refund_issued", note)
            .await
    }

    /// Move a transaction under arbitration
    pub async fn open_dispute(&self, transaction_id: &str, note: &str) -> EscrowResult<Transaction> {
        self.abandon(transaction_id, TransactionStatus::Disputed, "dispute_opened", note)
            .await
    }

    /// Load a transaction
    pub async fn transaction(&self, transaction_id: &str) -> EscrowResult<Transaction> {
        Ok(self.store.transaction(transaction_id).await?)
    }

    /// Audit trail for a transaction, ordered by creation time
    pub async fn events(&self, transaction_id: &str) -> EscrowResult<Vec<TransactionEvent>> {
        Ok(self.store.events(transaction_id).await?)
    }

    /// Terminate a pending or escrowed transaction
    async fn abandon(
        &self,
        transaction_id: &str,
        to: TransactionStatus,
        event_type: &str,
        note: &str,
    ) -> EscrowResult<Transaction> {
        let tx = self.store.transaction(transaction_id).await?;
        tx.validate_transition(to)?;

        let tx = self
            .store
            .compare_and_swap_status(transaction_id, tx.status, TransactionUpdate::to_status(to))
            .await
            .map_err(|e| Self::cas_error(e, to))?;

        self.store
            .append_event(TransactionEvent::new(&tx.id, event_type, note))
            .await?;

        info!("Transaction {} terminated as {}", tx.id, to);

        Ok(tx)
    }

    /// Reconstruct the gateway echo for an already-created order
    fn order_echo(&self, order_id: &str, amount: i64) -> GatewayOrder {
        GatewayOrder {
            id: order_id.to_string(),
            amount,
            currency: self.config.currency.clone(),
            status: "created".to_string(),
        }
    }

    /// Translate a losing compare-and-swap into a transition failure
    fn cas_error(err: StoreError, to: TransactionStatus) -> EscrowError {
        match err {
            StoreError::Conflict { actual, .. } => EscrowError::invalid_transition(
                actual,
                to,
                "transaction status changed concurrently or the callback was replayed",
            ),
            other => other.into(),
        }
    }

    /// Validate an order initiation request
    fn validate_create_order_request(&self, request: &CreateOrderRequest) -> EscrowResult<()> {
        if request.amount <= 0 {
            return Err(EscrowError::validation("amount must be greater than 0"));
        }

        if request.amount > self.config.max_amount {
            return Err(EscrowError::validation(format!(
                "amount {} exceeds maximum {}",
                request.amount, self.config.max_amount
            )));
        }

        for (field, value) in [
            ("transactionId", &request.transaction_id),
            ("listingId", &request.listing_id),
            ("buyerId", &request.buyer_id),
            ("sellerId", &request.seller_id),
        ] {
            if value.trim().is_empty() {
                return Err(EscrowError::validation(format!("{field} cannot be empty")));
            }
        }

        Ok(())
    }
}
