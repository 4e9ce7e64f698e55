//! End-to-end lifecycle scenarios driven through the transaction manager.

use std::sync::Arc;

use async_trait::async_trait;
use escrow_engine::error::EscrowError;
use escrow_engine::models::{GatewayOrder, ListingStatus, TransactionStatus};
use escrow_engine::payment_gateway::{GatewayOrderRequest, PaymentGateway};
use escrow_engine::store::{MemoryStore, TransactionStore};
use escrow_engine::transaction_manager::{
    ConfirmPaymentRequest, CreateOrderRequest, TransactionManager, TransactionManagerConfig,
};
use escrow_engine::verification_service::SignatureVerifier;
use escrow_engine::EscrowResult;

const SECRET: &str = "lifecycle-secret";

struct StaticGateway;

#[async_trait]
impl PaymentGateway for StaticGateway {
    async fn create_order(&self, request: GatewayOrderRequest) -> EscrowResult<GatewayOrder> {
        Ok(GatewayOrder {
            id: format!("order_{}", request.transaction_id),
            amount: request.amount,
            currency: request.currency,
            status: "created".to_string(),
        })
    }
}

fn setup() -> (TransactionManager, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let manager = TransactionManager::new(
        TransactionManagerConfig::default(),
        store.clone(),
        Arc::new(StaticGateway),
        SignatureVerifier::new(SECRET),
    );
    (manager, store)
}

fn order_request(transaction_id: &str) -> CreateOrderRequest {
    CreateOrderRequest {
        transaction_id: transaction_id.to_string(),
        listing_id: "listing-1".to_string(),
        buyer_id: "buyer-1".to_string(),
        seller_id: "seller-1".to_string(),
        amount: 50_000,
    }
}

fn callback(transaction_id: &str, order_id: &str, payment_id: &str) -> ConfirmPaymentRequest {
    ConfirmPaymentRequest {
        transaction_id: transaction_id.to_string(),
        gateway_order_id: order_id.to_string(),
        gateway_payment_id: payment_id.to_string(),
        signature: SignatureVerifier::new(SECRET).sign(order_id, payment_id),
    }
}

#[tokio::test]
async fn full_sale_reaches_completed_and_sells_the_listing() {
    let (manager, store) = setup();

    let order = manager.create_order(order_request("t1")).await.unwrap();
    assert_eq!(order.amount, 50_000);

    let tx = manager
        .confirm_payment(callback("t1", &order.id, "pay1"))
        .await
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Escrow);

    let tx = manager.confirm_delivery("t1").await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Completed);

    let listing = store.listing("listing-1").await.unwrap();
    assert_eq!(listing.status, ListingStatus::Sold);

    // The audit trail reconstructs the lifecycle in order.
    let events = manager.events("t1").await.unwrap();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, ["payment_received", "delivery_confirmed"]);
}

#[tokio::test]
async fn bad_signature_leaves_transaction_pending() {
    let (manager, store) = setup();
    let order = manager.create_order(order_request("t1")).await.unwrap();

    let result = manager
        .confirm_payment(ConfirmPaymentRequest {
            transaction_id: "t1".to_string(),
            gateway_order_id: order.id,
            gateway_payment_id: "pay1".to_string(),
            signature: "bad".to_string(),
        })
        .await;
    assert!(matches!(result, Err(EscrowError::InvalidSignature)));

    let tx = store.transaction("t1").await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn delivery_before_payment_is_rejected() {
    let (manager, store) = setup();
    manager.create_order(order_request("t1")).await.unwrap();

    let result = manager.confirm_delivery("t1").await;
    assert!(matches!(result, Err(EscrowError::InvalidTransition { .. })));

    let tx = store.transaction("t1").await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn observed_statuses_form_the_legal_sequence() {
    let (manager, store) = setup();

    let mut observed = Vec::new();
    observed.push(TransactionStatus::Pending);

    let order = manager.create_order(order_request("t1")).await.unwrap();
    observed.push(store.transaction("t1").await.unwrap().status);

    manager
        .confirm_payment(callback("t1", &order.id, "pay1"))
        .await
        .unwrap();
    observed.push(store.transaction("t1").await.unwrap().status);

    manager.confirm_delivery("t1").await.unwrap();
    observed.push(store.transaction("t1").await.unwrap().status);

    assert_eq!(
        observed,
        [
            TransactionStatus::Pending,
            TransactionStatus::Pending,
            TransactionStatus::Escrow,
            TransactionStatus::Completed,
        ]
    );
}
