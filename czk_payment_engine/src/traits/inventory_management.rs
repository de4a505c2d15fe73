use crate::{
    db_types::{NewProduct, Product},
    traits::PaymentGatewayError,
};

/// The inventory ledger.
///
/// Stock may only ever be taken with [`InventoryManagement::decrement_stock`], which must be implemented as a single
/// conditional update. Backends must never read the stock level and then write it back.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    /// Adds a product to the catalogue slice used by the engine.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, PaymentGatewayError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, PaymentGatewayError>;

    /// Sets the absolute stock level for a product, e.g. after a stock take.
    async fn set_stock(&self, product_id: i64, stock: i64) -> Result<Product, PaymentGatewayError>;

    /// Takes `quantity` units of the product, returning the remaining stock.
    ///
    /// Fails with [`PaymentGatewayError::InsufficientStock`] (carrying the actual remaining quantity) if fewer than
    /// `quantity` units are available, and with [`PaymentGatewayError::ProductNotFound`] if the product does not
    /// exist.
    async fn decrement_stock(&self, product_id: i64, quantity: i64) -> Result<i64, PaymentGatewayError>;
}
