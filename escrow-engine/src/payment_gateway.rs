//! Payment Gateway - creates payment orders with the external gateway
//!
//! The gateway authorizes and captures buyer payments; this module only
//! creates orders and never sees card or bank details. Transaction,
//! listing, buyer, and seller identifiers are echoed to the gateway as
//! opaque note metadata so callbacks can be reconciled later.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

use crate::error::EscrowError;
use crate::models::GatewayOrder;
use crate::EscrowResult;

/// Configuration for the Razorpay client
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway API base URL
    pub api_url: String,
    /// API key id for basic auth
    pub key_id: String,
    /// API key secret for basic auth
    pub key_secret: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.razorpay.com".to_string(),
            key_id: String::new(),
            key_secret: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Order creation request passed to the gateway client
#[derive(Debug, Clone)]
pub struct GatewayOrderRequest {
    pub transaction_id: String,
    pub listing_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    /// Amount in the minor currency unit
    pub amount: i64,
    /// Order currency (ISO 4217)
    pub currency: String,
}

/// External payment gateway
///
/// Implemented by the Razorpay client in production and by in-memory fakes
/// in tests. Implementations must not touch the transaction store.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment order; any gateway failure surfaces as
    /// [`EscrowError::UpstreamPayment`]
    async fn create_order(&self, request: GatewayOrderRequest) -> EscrowResult<GatewayOrder>;
}

/// Razorpay order-creation request body
#[derive(Debug, Serialize)]
struct RazorpayOrderRequest {
    amount: i64,
    currency: String,
    receipt: String,
    notes: HashMap<String, String>,
}

/// Razorpay order response
#[derive(Debug, Deserialize)]
struct RazorpayOrderResponse {
    id: String,
    amount: i64,
    currency: String,
    status: String,
}

/// Razorpay client over HTTPS
pub struct RazorpayGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl RazorpayGateway {
    /// Build the client; the request timeout is bounded so a hung gateway
    /// leaves the transaction pending and the operation retryable
    pub fn new(config: GatewayConfig) -> EscrowResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EscrowError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(&self, request: GatewayOrderRequest) -> EscrowResult<GatewayOrder> {
        let mut notes = HashMap::new();
        notes.insert("transactionId".to_string(), request.transaction_id.clone());
        notes.insert("listingId".to_string(), request.listing_id);
        notes.insert("buyerId".to_string(), request.buyer_id);
        notes.insert("sellerId".to_string(), request.seller_id);

        let body = RazorpayOrderRequest {
            amount: request.amount,
            currency: request.currency.clone(),
            receipt: request.transaction_id.clone(),
            notes,
        };

        let url = format!("{}/v1/orders", self.config.api_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| EscrowError::upstream(format!("order creation failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(EscrowError::upstream(format!(
                "gateway returned {status}: {detail}"
            )));
        }

        let order: RazorpayOrderResponse = response
            .json()
            .await
            .map_err(|e| EscrowError::upstream(format!("malformed gateway response: {e}")))?;

        info!(
            "Created gateway order {} for transaction {}",
            order.id, request.transaction_id
        );

        Ok(GatewayOrder {
            id: order.id,
            amount: order.amount,
            currency: order.currency,
            status: order.status,
        })
    }
}
