use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Customer, Czk, Order, OrderItem, Vs},
    traits::PaymentGatewayError,
};

const ORDER_COLUMNS: &str = "id, vs, customer_name, customer_email, customer_phone, customer_address, note, total_czk, \
                             status, invoice_sent_at, created_at, updated_at";

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(
    customer: &Customer,
    vs: &Vs,
    total: Czk,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let sql = format!(
        r#"
            INSERT INTO orders (vs, customer_name, customer_email, customer_phone, customer_address, note, total_czk)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ORDER_COLUMNS}
        "#
    );
    let result = sqlx::query_as::<_, Order>(&sql)
        .bind(vs)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(&customer.note)
        .bind(total)
        .fetch_one(conn)
        .await;
    match result {
        Ok(order) => {
            debug!("🗃️ Order #{} has been saved in the DB with vs {vs}", order.id);
            Ok(order)
        },
        // Orders created before the registry existed can still hold a token that was never registered
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(PaymentGatewayError::VsAlreadyTaken(vs.clone())),
        Err(e) => Err(e.into()),
    }
}

pub async fn insert_order_item(
    order_id: i64,
    product_id: i64,
    product_name: &str,
    quantity: i64,
    unit_price: Czk,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, PaymentGatewayError> {
    let item = sqlx::query_as::<_, OrderItem>(
        r#"
            INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, order_id, product_id, product_name, quantity, unit_price
        "#,
    )
    .bind(order_id)
    .bind(product_id)
    .bind(product_name)
    .bind(quantity)
    .bind(unit_price)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, PaymentGatewayError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_vs(vs: &Vs, conn: &mut SqliteConnection) -> Result<Option<Order>, PaymentGatewayError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE vs = $1 ORDER BY id DESC LIMIT 1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(vs).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, PaymentGatewayError> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, product_name, quantity, unit_price FROM order_items WHERE order_id = $1 \
         ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// The guarded paid transition. Only an order that is not paid yet is updated, so the return value is true if, and
/// only if, this call moved the order to `paid`.
pub async fn mark_order_paid(order_id: i64, conn: &mut SqliteConnection) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'paid', updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND status <> 'paid'",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    let changed = result.rows_affected() == 1;
    trace!("🗃️ Paid transition for order #{order_id}: changed = {changed}");
    Ok(changed)
}

/// Like [`mark_order_paid`], but for the order carrying `vs`. Returns false if there is no such order.
pub async fn mark_order_paid_by_vs(vs: &Vs, conn: &mut SqliteConnection) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'paid', updated_at = CURRENT_TIMESTAMP WHERE vs = $1 AND status <> 'paid'",
    )
    .bind(vs)
    .execute(conn)
    .await?;
    let changed = result.rows_affected() > 0;
    trace!("🗃️ Paid transition for order with vs {vs}: changed = {changed}");
    Ok(changed)
}

/// Sets the invoice dispatch marker if it is not set yet. Returns true if this call set it.
pub async fn mark_invoice_sent(
    order_id: i64,
    sent_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, PaymentGatewayError> {
    let result = sqlx::query(
        "UPDATE orders SET invoice_sent_at = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND invoice_sent_at IS \
         NULL",
    )
    .bind(sent_at)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
