use crate::{
    db_types::{Order, OrderItem, Payment, UnmatchedPayment, Vs},
    traits::{PaymentGatewayError, PaymentQueryFilter},
};

/// The `OrderManagement` trait defines the behaviour for querying orders and payments in the database backend.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_order_by_vs(&self, vs: &Vs) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, PaymentGatewayError>;

    /// The authoritative payment for a token: the most recently created row.
    async fn fetch_latest_payment(&self, vs: &Vs) -> Result<Option<Payment>, PaymentGatewayError>;

    /// All payment rows for a token, newest first.
    async fn fetch_payments_for_vs(&self, vs: &Vs) -> Result<Vec<Payment>, PaymentGatewayError>;

    async fn search_payments(&self, query: PaymentQueryFilter) -> Result<Vec<Payment>, PaymentGatewayError>;

    /// The most recent unmatched bank confirmations, newest first.
    async fn fetch_unmatched_payments(&self, limit: i64) -> Result<Vec<UnmatchedPayment>, PaymentGatewayError>;
}
