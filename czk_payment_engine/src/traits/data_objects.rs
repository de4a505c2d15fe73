use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem, Payment, PaymentStatus, Vs};

/// The result of an inventory decrement for a single order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDecrement {
    pub product_id: i64,
    pub taken: i64,
    pub remaining: i64,
}

/// Everything written by a successful order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// The pending payment. `None` if a payment row already existed for the variable symbol.
    pub payment: Option<Payment>,
    pub stock: Vec<StockDecrement>,
}

/// The outcome of moving a payment to `received` and its order to `paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidTransition {
    pub payment: Payment,
    pub payment_created: bool,
    /// The order carrying the payment's variable symbol, if there is one.
    pub order: Option<Order>,
    /// True only if this call moved the order from `awaiting_payment` to `paid`.
    pub status_changed: bool,
}

/// How new variable symbols are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VsPolicy {
    /// Width of generated tokens.
    pub digits: u32,
    /// Generation gives up after this many collisions.
    pub max_attempts: u32,
}

impl Default for VsPolicy {
    fn default() -> Self {
        Self { digits: 10, max_attempts: 50 }
    }
}

pub const MAX_PAYMENT_QUERY_LIMIT: i64 = 500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentQueryFilter {
    pub vs: Option<Vs>,
    pub status: Option<PaymentStatus>,
    pub limit: Option<i64>,
}

impl PaymentQueryFilter {
    pub fn with_vs(mut self, vs: Vs) -> Self {
        self.vs = Some(vs);
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The effective row limit, clamped to `1..=500`. Defaults to 100.
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, MAX_PAYMENT_QUERY_LIMIT)
    }
}
