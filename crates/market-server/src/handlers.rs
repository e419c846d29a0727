//! HTTP Handlers

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Form, Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use market_core::{
    AccountStore, Order, OrderNo, OrderStatus, OrderStore, Purchase, Resource, ResourceStore,
};
use market_payments::{
    CallbackHandler, CheckoutRequest as PaymentCheckoutRequest, PaymentError,
};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub payments_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: String,
    #[serde(default)]
    pub resource_id: Option<u64>,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_no: String,
    pub payment_url: String,
    pub payment_params: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub order_no: String,
    pub status: OrderStatus,
    pub amount: Decimal,
    pub coins: u64,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl OrderView {
    fn from_order(order: &Order) -> Self {
        Self {
            order_no: order.order_no.as_str().into(),
            status: order.status,
            amount: order.amount,
            coins: order.coins,
            created_at: order.created_at,
            paid_at: order.paid_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResourceView {
    pub id: u64,
    pub title: String,
    pub author: String,
    pub category: String,
    pub price_coins: u64,
    pub is_free: bool,
    pub summary: String,
    /// Present only when the request identified a user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked: Option<bool>,
}

impl ResourceView {
    fn from_resource(resource: &Resource, unlocked: Option<bool>) -> Self {
        Self {
            id: resource.id,
            title: resource.title.clone(),
            author: resource.author.clone(),
            category: resource.category.clone(),
            price_coins: resource.price_coins,
            is_free: resource.is_free,
            summary: resource.summary.clone(),
            unlocked,
        }
    }
}

/// The polled order-status payload
#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub order: OrderView,
    pub resource: Option<ResourceView>,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub user_id: String,
    pub coins: u64,
    pub purchases: Vec<PurchaseView>,
}

#[derive(Debug, Serialize)]
pub struct PurchaseView {
    pub resource_id: u64,
    pub order_no: Option<String>,
    pub coins_spent: u64,
    pub purchased_at: DateTime<Utc>,
}

impl PurchaseView {
    fn from_purchase(purchase: &Purchase) -> Self {
        Self {
            resource_id: purchase.resource_id,
            order_no: purchase.order_no.as_ref().map(|n| n.as_str().into()),
            coins_spent: purchase.coins_spent,
            purchased_at: purchase.purchased_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResourceQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn storage_error(err: market_core::MarketError) -> ApiError {
    tracing::error!("Store error: {}", err);
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Storage failure",
        "STORAGE_ERROR",
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        payments_configured: state.gateway.is_some(),
    })
}

/// List the catalog
pub async fn list_resources(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResourceView>>, ApiError> {
    let resources = state.resources.list().map_err(storage_error)?;

    Ok(Json(
        resources
            .iter()
            .map(|r| ResourceView::from_resource(r, None))
            .collect(),
    ))
}

/// Resource detail, with unlock state when a user is identified
pub async fn get_resource(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<ResourceView>, ApiError> {
    let resource = state
        .resources
        .get(id)
        .map_err(storage_error)?
        .ok_or_else(|| {
            api_error(StatusCode::NOT_FOUND, "Resource not found", "RESOURCE_NOT_FOUND")
        })?;

    let unlocked = query.user_id.as_deref().map(|user_id| {
        resource.is_free
            || state
                .accounts
                .get(user_id)
                .ok()
                .flatten()
                .is_some_and(|a| a.owns(id))
    });

    Ok(Json(ResourceView::from_resource(&resource, unlocked)))
}

/// Create a checkout and return the popup's payment descriptor
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let gateway = state.gateway.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Payments not configured",
            "PAYMENTS_DISABLED",
        )
    })?;

    let (amount, subject) = match payload.resource_id {
        Some(resource_id) => {
            let resource = state
                .resources
                .get(resource_id)
                .map_err(storage_error)?
                .ok_or_else(|| {
                    api_error(
                        StatusCode::NOT_FOUND,
                        "Resource not found",
                        "RESOURCE_NOT_FOUND",
                    )
                })?;

            if resource.is_free {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "Free resources do not need checkout",
                    "RESOURCE_FREE",
                ));
            }

            let already_owned = state
                .accounts
                .get(&payload.user_id)
                .ok()
                .flatten()
                .is_some_and(|a| a.owns(resource_id));
            if already_owned {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "Resource already purchased",
                    "ALREADY_OWNED",
                ));
            }

            let amount = Decimal::from(resource.price_coins)
                .checked_div(Decimal::from(gateway.coins_per_unit()))
                .ok_or_else(|| {
                    tracing::error!("Gateway coin rate is zero");
                    api_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Payments misconfigured",
                        "CHECKOUT_ERROR",
                    )
                })?;
            (amount, resource.title)
        }
        None => {
            let amount = payload.amount.filter(|a| *a > Decimal::ZERO).ok_or_else(|| {
                api_error(
                    StatusCode::BAD_REQUEST,
                    "Top-up amount must be positive",
                    "INVALID_AMOUNT",
                )
            })?;
            (amount, "Coin top-up".into())
        }
    };

    let checkout = gateway
        .create_checkout(PaymentCheckoutRequest {
            user_id: payload.user_id,
            resource_id: payload.resource_id,
            amount,
            subject,
        })
        .map_err(|e| {
            tracing::error!("Checkout error: {}", e);
            let status = match e {
                PaymentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            api_error(status, e.user_message(), "CHECKOUT_ERROR")
        })?;

    state.orders.save(&checkout.order).map_err(storage_error)?;

    Ok(Json(CheckoutResponse {
        order_no: checkout.order.order_no.as_str().into(),
        payment_url: checkout.descriptor.payment_url,
        payment_params: checkout.descriptor.payment_params,
    }))
}

/// Order status — the endpoint the popup polls.
///
/// Strictly read-only: polling can never change an order.
pub async fn order_status(
    State(state): State<AppState>,
    Path(order_no): Path<String>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let order = state
        .orders
        .get(&OrderNo::from_string(order_no))
        .map_err(storage_error)?
        .ok_or_else(|| {
            api_error(StatusCode::NOT_FOUND, "Order not found", "ORDER_NOT_FOUND")
        })?;

    let resource = order
        .resource_id
        .and_then(|id| state.resources.get(id).ok().flatten())
        .map(|r| ResourceView::from_resource(&r, None));

    Ok(Json(OrderStatusResponse {
        order: OrderView::from_order(&order),
        resource,
    }))
}

/// Wallet view — what the opener reconciler re-fetches
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<WalletResponse>, ApiError> {
    let account = state
        .accounts
        .get_or_create(&user_id)
        .map_err(storage_error)?;

    Ok(Json(WalletResponse {
        user_id: account.user_id,
        coins: account.coins,
        purchases: account
            .purchases
            .iter()
            .map(PurchaseView::from_purchase)
            .collect(),
    }))
}

/// Gateway notify callback — the only writer of order status
pub async fn gateway_notify(
    State(state): State<AppState>,
    Form(params): Form<BTreeMap<String, String>>,
) -> Result<&'static str, ApiError> {
    let gateway = state.gateway.as_ref().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Payments not configured",
            "PAYMENTS_DISABLED",
        )
    })?;

    let handler = CallbackHandler::new(state.orders.clone(), state.accounts.clone());

    let notify = handler
        .parse_notify(&params, gateway.secret())
        .map_err(|e| {
            tracing::warn!("Rejected gateway notify: {}", e);
            let code = match e {
                PaymentError::SignatureInvalid(_) => "INVALID_SIGNATURE",
                _ => "BAD_NOTIFY",
            };
            api_error(StatusCode::BAD_REQUEST, "Invalid notify", code)
        })?;

    handler.handle(notify).await.map_err(|e| {
        tracing::error!("Notify processing error: {}", e);
        match e {
            PaymentError::OrderNotFound(_) => {
                api_error(StatusCode::NOT_FOUND, "Order not found", "ORDER_NOT_FOUND")
            }
            PaymentError::AmountMismatch { .. } => api_error(
                StatusCode::BAD_REQUEST,
                "Amount mismatch",
                "AMOUNT_MISMATCH",
            ),
            _ => api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Notify processing failed",
                "NOTIFY_ERROR",
            ),
        }
    })?;

    // The gateway keeps retrying until it sees this exact body.
    Ok("success")
}
