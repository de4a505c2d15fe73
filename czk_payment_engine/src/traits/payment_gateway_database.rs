use thiserror::Error;

use crate::{
    db_types::{Czk, NewOrder, NewUnmatchedPayment, PaymentStatus, UnmatchedPayment, Vs},
    traits::{OrderCreated, OrderManagement, PaidTransition, VsPolicy},
};

/// This trait defines the highest level of behaviour for backends supporting the payment engine.
///
/// This behaviour includes:
/// * Creating orders atomically: variable symbol reservation, stock decrements, the order itself and its pending
///   payment either all commit or none do.
/// * The guarded paid transition, for bank confirmations and for manual overrides.
/// * Recording bank confirmations that could not be matched.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone + OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Creates a new order in a single transaction:
    ///
    /// 1. Reserves the variable symbol. If `order.vs` is given, exactly that token is reserved, and an
    ///    [`PaymentGatewayError::VsAlreadyTaken`] error is returned if it has been used before. Otherwise a new token
    ///    is generated according to `vs_policy`.
    /// 2. Decrements the stock of every line item with a conditional update.
    /// 3. Inserts the order and its items, with `total` as the stored total.
    /// 4. Inserts a pending payment for `total`, unless a payment already exists for the token.
    ///
    /// Any failure rolls back every step, including the token reservation and the stock decrements.
    /// The order is assumed to be validated already.
    async fn create_order(
        &self,
        order: NewOrder,
        total: Czk,
        vs_policy: VsPolicy,
    ) -> Result<OrderCreated, PaymentGatewayError>;

    /// Applies a matched bank confirmation in a single transaction:
    ///
    /// * The order is moved to `paid` if it is not paid already. [`PaidTransition::status_changed`] reports whether
    ///   this call made the change.
    /// * The payment is moved to `received`, with `amount` as the received amount. `received_at` is set if it was not
    ///   set before.
    async fn confirm_bank_payment(
        &self,
        payment_id: i64,
        order_id: i64,
        amount: Czk,
    ) -> Result<PaidTransition, PaymentGatewayError>;

    /// Applies a manual payment confirmation for a token. The latest payment for the token is moved to `received`, or
    /// a new received payment is created if none exists. `amount` replaces the payment amount when given, and
    /// `reference` is appended to the payment's audit trail. The order carrying the token, if any, is moved to `paid`
    /// with the same guard as [`Self::confirm_bank_payment`].
    async fn confirm_payment_manually(
        &self,
        vs: &Vs,
        amount: Option<Czk>,
        reference: Option<String>,
    ) -> Result<PaidTransition, PaymentGatewayError>;

    /// Overrides the status of a single payment row. Moving a payment to `received` also applies the guarded paid
    /// transition to its order. Other statuses never touch the order.
    async fn set_payment_status(
        &self,
        payment_id: i64,
        status: PaymentStatus,
    ) -> Result<PaidTransition, PaymentGatewayError>;

    /// Stores an audit record for a bank confirmation that could not be applied.
    async fn record_unmatched_payment(
        &self,
        unmatched: NewUnmatchedPayment,
    ) -> Result<UnmatchedPayment, PaymentGatewayError>;

    /// Creates a pending payment for every unpaid order with a token and a stored total, but no payment rows.
    /// Returns the number of payments created.
    async fn backfill_pending_payments(&self) -> Result<u64, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("Invalid order: {0}")]
    ValidationError(String),
    #[error("Insufficient stock for product {product_id}. Requested {requested}, only {remaining} left.")]
    InsufficientStock { product_id: i64, requested: i64, remaining: i64 },
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("An order with variable symbol {0} already exists")]
    VsAlreadyTaken(Vs),
    #[error("Could not allocate a free variable symbol after {0} attempts")]
    VsExhausted(u32),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(String),
    #[error("Order {0} has not been paid yet")]
    OrderNotPaid(i64),
    #[error("The requested payment {0} does not exist")]
    PaymentNotFound(i64),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for PaymentGatewayError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        PaymentGatewayError::DatabaseError(format!("Migration failed. {e}"))
    }
}
