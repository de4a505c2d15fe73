use std::fmt::Debug;

use crate::{
    cpe_api::order_objects::{OrderWithItems, PaymentStatusView},
    db_types::{Order, Payment, SoldProduct, UnmatchedPayment, Vs},
    traits::{OrderManagement, PaymentGatewayError, PaymentQueryFilter, SettlementManagement},
};

/// Read-only access to orders, payments and the unmatched audit trail.
pub struct OrderQueryApi<B> {
    db: B,
}

impl<B> Debug for OrderQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderQueryApi")
    }
}

impl<B> OrderQueryApi<B>
where B: OrderManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn order_by_id(&self, order_id: i64) -> Result<Option<OrderWithItems>, PaymentGatewayError> {
        let order = self.db.fetch_order(order_id).await?;
        self.with_items(order).await
    }

    pub async fn order_by_vs(&self, vs: &Vs) -> Result<Option<OrderWithItems>, PaymentGatewayError> {
        let order = self.db.fetch_order_by_vs(vs).await?;
        self.with_items(order).await
    }

    /// The latest payment and the order for a token. Used by the checkout "thank you" page to poll for the payment.
    pub async fn payment_status_by_vs(&self, vs: &Vs) -> Result<PaymentStatusView, PaymentGatewayError> {
        let payment = self.db.fetch_latest_payment(vs).await?;
        let order = self.db.fetch_order_by_vs(vs).await?;
        Ok(PaymentStatusView { vs: vs.clone(), payment, order })
    }

    /// The full payment history of a token, newest first.
    pub async fn payments_for_vs(&self, vs: &Vs) -> Result<Vec<Payment>, PaymentGatewayError> {
        self.db.fetch_payments_for_vs(vs).await
    }

    pub async fn search_payments(&self, query: PaymentQueryFilter) -> Result<Vec<Payment>, PaymentGatewayError> {
        self.db.search_payments(query).await
    }

    pub async fn unmatched_payments(&self, limit: i64) -> Result<Vec<UnmatchedPayment>, PaymentGatewayError> {
        self.db.fetch_unmatched_payments(limit.clamp(1, crate::traits::MAX_PAYMENT_QUERY_LIMIT)).await
    }

    async fn with_items(&self, order: Option<Order>) -> Result<Option<OrderWithItems>, PaymentGatewayError> {
        match order {
            Some(order) => {
                let items = self.db.fetch_order_items(order.id).await?;
                Ok(Some(OrderWithItems { order, items }))
            },
            None => Ok(None),
        }
    }
}

impl<B> OrderQueryApi<B>
where B: SettlementManagement
{
    /// The sold product records of an order. Empty until the order has been settled.
    pub async fn sold_products(&self, order_id: i64) -> Result<Vec<SoldProduct>, PaymentGatewayError> {
        if self.db.fetch_order(order_id).await?.is_none() {
            return Err(PaymentGatewayError::OrderNotFound(format!("#{order_id}")));
        }
        self.db.fetch_sold_products(order_id).await
    }
}
