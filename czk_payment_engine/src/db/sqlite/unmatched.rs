use log::info;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewUnmatchedPayment, UnmatchedPayment},
    traits::PaymentGatewayError,
};

const UNMATCHED_COLUMNS: &str = "id, vs, paid, expected, order_id, reason, created_at";

pub async fn insert_unmatched(
    unmatched: NewUnmatchedPayment,
    conn: &mut SqliteConnection,
) -> Result<UnmatchedPayment, PaymentGatewayError> {
    let sql = format!(
        "INSERT INTO unmatched_payments (vs, paid, expected, order_id, reason) VALUES ($1, $2, $3, $4, $5) RETURNING \
         {UNMATCHED_COLUMNS}"
    );
    let record = sqlx::query_as::<_, UnmatchedPayment>(&sql)
        .bind(&unmatched.vs)
        .bind(unmatched.paid)
        .bind(unmatched.expected)
        .bind(unmatched.order_id)
        .bind(unmatched.reason)
        .fetch_one(conn)
        .await?;
    info!("🗃️ Unmatched bank confirmation recorded: vs {} paid {} ({})", record.vs, record.paid, record.reason);
    Ok(record)
}

pub async fn fetch_unmatched(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<UnmatchedPayment>, PaymentGatewayError> {
    let sql = format!("SELECT {UNMATCHED_COLUMNS} FROM unmatched_payments ORDER BY id DESC LIMIT $1");
    let records = sqlx::query_as::<_, UnmatchedPayment>(&sql).bind(limit.clamp(1, 500)).fetch_all(conn).await?;
    Ok(records)
}
