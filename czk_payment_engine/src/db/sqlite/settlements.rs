use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::SoldProduct, traits::PaymentGatewayError};

/// Copies the order lines into `sold_products`. Lines that were materialized before are skipped by the unique
/// (order, product, quantity, price) index, so re-running this after a partial failure only fills the gaps.
pub async fn materialize_sold_products(order_id: i64, conn: &mut SqliteConnection) -> Result<u64, PaymentGatewayError> {
    let result = sqlx::query(
        r#"
            INSERT OR IGNORE INTO sold_products (
                order_id, product_id, product_name, quantity, unit_price, buyer_name, buyer_email, vs
            )
            SELECT i.order_id, i.product_id, i.product_name, i.quantity, i.unit_price,
                   o.customer_name, o.customer_email, o.vs
            FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE o.id = $1
            ORDER BY i.id
        "#,
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    let created = result.rows_affected();
    debug!("🗃️ {created} sold product records created for order #{order_id}");
    Ok(created)
}

pub async fn fetch_sold_products(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<SoldProduct>, PaymentGatewayError> {
    let sold = sqlx::query_as::<_, SoldProduct>(
        r#"
            SELECT id, order_id, product_id, product_name, quantity, unit_price, buyer_name, buyer_email, vs, sold_at
            FROM sold_products
            WHERE order_id = $1
            ORDER BY id
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(sold)
}
