use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product},
    traits::PaymentGatewayError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, PaymentGatewayError> {
    if product.stock < 0 {
        return Err(PaymentGatewayError::ValidationError(format!("Stock cannot be negative ({})", product.stock)));
    }
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (name, price, stock) VALUES ($1, $2, $3) RETURNING id, name, price, stock",
    )
    .bind(product.name)
    .bind(product.price)
    .bind(product.stock)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Product #{} ({}) added with {} units in stock", product.id, product.name, product.stock);
    Ok(product)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, PaymentGatewayError> {
    let product = sqlx::query_as::<_, Product>("SELECT id, name, price, stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn set_stock(product_id: i64, stock: i64, conn: &mut SqliteConnection) -> Result<Product, PaymentGatewayError> {
    if stock < 0 {
        return Err(PaymentGatewayError::ValidationError(format!("Stock cannot be negative ({stock})")));
    }
    sqlx::query_as::<_, Product>(
        "UPDATE products SET stock = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING id, name, price, stock",
    )
    .bind(stock)
    .bind(product_id)
    .fetch_optional(conn)
    .await?
    .ok_or(PaymentGatewayError::ProductNotFound(product_id))
}

/// Takes `quantity` units of a product with a single conditional update.
///
/// The update only matches the row if at least `quantity` units are in stock, so concurrent callers can never take
/// more than is available. Zero affected rows is the failure signal; the follow-up read only serves to report the
/// remaining stock to the caller.
///
/// Returns the remaining stock and the catalogue name of the product.
pub async fn decrement_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(i64, String), PaymentGatewayError> {
    if quantity <= 0 {
        return Err(PaymentGatewayError::ValidationError(format!("Quantity must be positive ({quantity})")));
    }
    let taken = sqlx::query_as::<_, (i64, String)>(
        r#"
            UPDATE products
            SET stock = stock - $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND stock >= $1
            RETURNING stock, name
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    match taken {
        Some((remaining, name)) => {
            trace!("🗃️ Took {quantity} units of product #{product_id}. {remaining} left");
            Ok((remaining, name))
        },
        None => {
            let remaining = sqlx::query_scalar::<_, i64>("SELECT stock FROM products WHERE id = $1")
                .bind(product_id)
                .fetch_optional(conn)
                .await?
                .ok_or(PaymentGatewayError::ProductNotFound(product_id))?;
            debug!("🗃️ Cannot take {quantity} units of product #{product_id}. Only {remaining} left");
            Err(PaymentGatewayError::InsufficientStock { product_id, requested: quantity, remaining })
        },
    }
}
