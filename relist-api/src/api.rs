//! # Resale escrow REST API
//!
//! Builds the axum router for the escrow backend. All endpoints share
//! application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                        | Description                           |
//! |--------|-----------------------------|---------------------------------------|
//! | GET    | `/health`                   | Liveness probe                        |
//! | POST   | `/resale-orders`            | Create a gateway payment order        |
//! | POST   | `/resale-payments/verify`   | Verify a payment callback signature   |
//! | POST   | `/resale-deliveries/confirm`| Confirm delivery and release funds    |
//!
//! Request bodies are strict: unknown fields are rejected before anything
//! reaches the state machine. Error responses carry generic messages;
//! internal failure detail is logged server-side only.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use escrow_engine::error::EscrowError;
use escrow_engine::models::GatewayOrder;
use escrow_engine::transaction_manager::{
    ConfirmPaymentRequest, CreateOrderRequest, TransactionManager,
};

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<TransactionManager>,
}

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/resale-orders", post(create_order_handler))
        .route("/resale-payments/verify", post(verify_payment_handler))
        .route("/resale-deliveries/confirm", post(confirm_delivery_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateOrderBody {
    amount: i64,
    transaction_id: String,
    listing_id: String,
    buyer_id: String,
    seller_id: String,
}

/// Gateway callback fields arrive snake_cased from Razorpay; the
/// transaction id keeps the client-side camelCase spelling.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VerifyPaymentBody {
    razorpay_order_id: String,
    razorpay_payment_id: String,
    razorpay_signature: String,
    #[serde(rename = "transactionId")]
    transaction_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfirmDeliveryBody {
    #[serde(rename = "transactionId")]
    transaction_id: String,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
struct DeliveryResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Wrapper that maps the engine error taxonomy onto HTTP responses.
struct ApiError(EscrowError);

impl From<EscrowError> for ApiError {
    fn from(err: EscrowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            EscrowError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            EscrowError::InvalidSignature => {
                (StatusCode::BAD_REQUEST, "Invalid signature".to_string())
            }
            EscrowError::InvalidTransition { .. } => (
                StatusCode::BAD_REQUEST,
                "Transaction already processed or not in a valid state".to_string(),
            ),
            EscrowError::NotFound(_) => {
                (StatusCode::BAD_REQUEST, "Transaction not found".to_string())
            }
            EscrowError::UpstreamPayment(_) => (
                StatusCode::BAD_GATEWAY,
                "Payment gateway unavailable".to_string(),
            ),
            EscrowError::StorageUnavailable(_) | EscrowError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Payment verification failed, please retry".to_string(),
            ),
        };

        // Full detail stays server-side.
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        } else {
            warn!("request rejected: {}", self.0);
        }

        let body = ErrorBody {
            success: false,
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Malformed or unknown-shape bodies are a 400, not axum's default 422.
fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError(EscrowError::validation(format!(
        "invalid request body: {rejection}"
    )))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_order_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderBody>, JsonRejection>,
) -> Result<Json<GatewayOrder>, ApiError> {
    let Json(body) = payload.map_err(bad_body)?;

    let order = state
        .manager
        .create_order(CreateOrderRequest {
            transaction_id: body.transaction_id,
            listing_id: body.listing_id,
            buyer_id: body.buyer_id,
            seller_id: body.seller_id,
            amount: body.amount,
        })
        .await?;

    Ok(Json(order))
}

async fn verify_payment_handler(
    State(state): State<AppState>,
    payload: Result<Json<VerifyPaymentBody>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(body) = payload.map_err(bad_body)?;

    state
        .manager
        .confirm_payment(ConfirmPaymentRequest {
            transaction_id: body.transaction_id,
            gateway_order_id: body.razorpay_order_id,
            gateway_payment_id: body.razorpay_payment_id,
            signature: body.razorpay_signature,
        })
        .await?;

    Ok(Json(VerifyResponse { success: true }))
}

async fn confirm_delivery_handler(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmDeliveryBody>, JsonRejection>,
) -> Result<Json<DeliveryResponse>, ApiError> {
    let Json(body) = payload.map_err(bad_body)?;

    let tx = state.manager.confirm_delivery(&body.transaction_id).await?;

    Ok(Json(DeliveryResponse {
        success: true,
        message: format!("transaction {} completed, funds released", tx.id),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use escrow_engine::payment_gateway::{GatewayOrderRequest, PaymentGateway};
    use escrow_engine::store::MemoryStore;
    use escrow_engine::transaction_manager::TransactionManagerConfig;
    use escrow_engine::verification_service::SignatureVerifier;
    use escrow_engine::EscrowResult;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const SECRET: &str = "api-test-secret";

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

    fn test_router() -> Router {
        let manager = Arc::new(TransactionManager::new(
            TransactionManagerConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(StaticGateway),
            SignatureVerifier::new(SECRET),
        ));
        create_router(AppState { manager })
    }

    fn post(path: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn order_body(transaction_id: &str) -> Value {
        json!({
            "amount": 50_000,
            "transactionId": transaction_id,
            "listingId": "l1",
            "buyerId": "b1",
            "sellerId": "s1",
        })
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = test_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn full_flow_over_http() {
        let router = test_router();

        // Create the order.
        let response = router
            .clone()
            .oneshot(post("/resale-orders", order_body("t1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let order = body_json(response).await;
        assert_eq!(order["amount"], 50_000);
        assert_eq!(order["currency"], "INR");
        assert_eq!(order["status"], "created");
        let order_id = order["id"].as_str().unwrap().to_string();

        // Verify the payment with a correctly signed callback.
        let signature = SignatureVerifier::new(SECRET).sign(&order_id, "pay1");
        let response = router
            .clone()
            .oneshot(post(
                "/resale-payments/verify",
                json!({
                    "razorpay_order_id": order_id,
                    "razorpay_payment_id": "pay1",
                    "razorpay_signature": signature,
                    "transactionId": "t1",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": true }));

        // Confirm delivery.
        let response = router
            .oneshot(post(
                "/resale-deliveries/confirm",
                json!({ "transactionId": "t1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn invalid_signature_is_a_400_with_message() {
        let router = test_router();
        router
            .clone()
            .oneshot(post("/resale-orders", order_body("t1")))
            .await
            .unwrap();

        let response = router
            .oneshot(post(
                "/resale-payments/verify",
                json!({
                    "razorpay_order_id": "order_t1",
                    "razorpay_payment_id": "pay1",
                    "razorpay_signature": "bad",
                    "transactionId": "t1",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "success": false, "message": "Invalid signature" })
        );
    }

    #[tokio::test]
    async fn missing_fields_are_a_400() {
        let response = test_router()
            .oneshot(post("/resale-orders", json!({ "amount": 50_000 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn unknown_fields_are_rejected() {
        let mut body = order_body("t1");
        body["adminOverride"] = json!(true);

        let response = test_router()
            .oneshot(post("/resale-orders", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delivery_without_payment_is_a_400() {
        let router = test_router();
        router
            .clone()
            .oneshot(post("/resale-orders", order_body("t1")))
            .await
            .unwrap();

        let response = router
            .oneshot(post(
                "/resale-deliveries/confirm",
                json!({ "transactionId": "t1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn preflight_is_permitted() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/resale-orders")
            .header(header::ORIGIN, "https://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
