use std::fmt::Display;

use cpg_common::Czk;
use czk_payment_engine::{
    db_types::{OrderStatusType, PaymentStatus, Vs},
    traits::{OrderCreated, PaymentQueryFilter, StockDecrement},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_UNMATCHED_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

/// What the checkout gets back after an order has been committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_id: i64,
    pub vs: Option<Vs>,
    pub status: OrderStatusType,
    pub total_czk: Option<Czk>,
    pub decremented_items: Vec<StockDecrement>,
}

impl From<OrderCreated> for CreateOrderResponse {
    fn from(created: OrderCreated) -> Self {
        Self {
            order_id: created.order.id,
            vs: created.order.vs,
            status: created.order.status,
            total_czk: created.order.total_czk,
            decremented_items: created.stock,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkPaidRequest {
    pub vs: Vs,
    #[serde(default)]
    pub amount: Option<Czk>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockUpdateRequest {
    pub stock: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrParams {
    #[serde(default)]
    pub vs: Option<Vs>,
    pub amount: Czk,
    #[serde(default)]
    pub msg: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentSearchParams {
    #[serde(default)]
    pub vs: Option<Vs>,
    #[serde(default)]
    pub status: Option<PaymentStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl From<PaymentSearchParams> for PaymentQueryFilter {
    fn from(params: PaymentSearchParams) -> Self {
        PaymentQueryFilter { vs: params.vs, status: params.status, limit: params.limit }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

impl LimitParams {
    pub fn limit_or_default(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_UNMATCHED_LIMIT)
    }
}
