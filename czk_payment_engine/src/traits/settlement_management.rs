use chrono::{DateTime, Utc};

use crate::{
    db_types::SoldProduct,
    traits::{OrderManagement, PaymentGatewayError},
};

/// Storage for the artefacts of settling a paid order. Every method is safe to call repeatedly.
#[allow(async_fn_in_trait)]
pub trait SettlementManagement: OrderManagement {
    /// Writes one sold-product record per order line that does not have one yet. Lines are identified by their
    /// (product, quantity, unit price) signature. Returns the number of records created by this call.
    async fn materialize_sold_products(&self, order_id: i64) -> Result<u64, PaymentGatewayError>;

    async fn fetch_sold_products(&self, order_id: i64) -> Result<Vec<SoldProduct>, PaymentGatewayError>;

    /// Sets the invoice dispatch marker. Returns false if the marker was already set, in which case it is left
    /// untouched.
    async fn mark_invoice_sent(&self, order_id: i64, sent_at: DateTime<Utc>) -> Result<bool, PaymentGatewayError>;
}
