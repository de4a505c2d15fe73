use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewProduct, Product},
    traits::{InventoryManagement, PaymentGatewayError},
};

/// The inventory ledger. Checkout decrements stock inside its own transaction. This API is for everything else:
/// seeding products, restocking, and one-off decrements.
pub struct InventoryApi<B> {
    db: B,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn add_product(&self, product: NewProduct) -> Result<Product, PaymentGatewayError> {
        if product.stock < 0 {
            return Err(PaymentGatewayError::ValidationError("Stock cannot be negative".into()));
        }
        let product = self.db.insert_product(product).await?;
        debug!("🗃️ Product #{} '{}' added with {} in stock", product.id, product.name, product.stock);
        Ok(product)
    }

    pub async fn product(&self, product_id: i64) -> Result<Option<Product>, PaymentGatewayError> {
        self.db.fetch_product(product_id).await
    }

    pub async fn set_stock(&self, product_id: i64, stock: i64) -> Result<Product, PaymentGatewayError> {
        if stock < 0 {
            return Err(PaymentGatewayError::ValidationError("Stock cannot be negative".into()));
        }
        self.db.set_stock(product_id, stock).await
    }

    /// Takes `quantity` units of a product and returns what is left. Fails with
    /// [`PaymentGatewayError::InsufficientStock`] when fewer units remain, in which case nothing is taken.
    pub async fn decrement(&self, product_id: i64, quantity: i64) -> Result<i64, PaymentGatewayError> {
        if quantity <= 0 {
            return Err(PaymentGatewayError::ValidationError(format!("Quantity must be positive. Got {quantity}")));
        }
        self.db.decrement_stock(product_id, quantity).await
    }
}
