use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Czk, NewPayment, Payment, PaymentStatus, Vs},
    traits::{PaymentGatewayError, PaymentQueryFilter},
};

const PAYMENT_COLUMNS: &str = "id, vs, amount_czk, status, reference, received_at, created_at, updated_at";

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, PaymentGatewayError> {
    let sql = format!(
        r#"
            INSERT INTO payments (vs, amount_czk, status, reference, received_at)
            VALUES ($1, $2, $3, $4, CASE WHEN $3 = 'received' THEN CURRENT_TIMESTAMP END)
            RETURNING {PAYMENT_COLUMNS}
        "#
    );
    let payment = sqlx::query_as::<_, Payment>(&sql)
        .bind(&payment.vs)
        .bind(payment.amount)
        .bind(payment.status)
        .bind(&payment.reference)
        .fetch_one(conn)
        .await?;
    debug!("🗃️ Payment #{} ({}) for vs {} saved as {}", payment.id, payment.amount_czk, payment.vs, payment.status);
    Ok(payment)
}

pub async fn fetch_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, PaymentGatewayError> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
    let payment = sqlx::query_as::<_, Payment>(&sql).bind(payment_id).fetch_optional(conn).await?;
    Ok(payment)
}

/// The most recently created payment for `vs`. Row ids are monotonic, so the highest id is the newest row.
pub async fn fetch_latest_payment(vs: &Vs, conn: &mut SqliteConnection) -> Result<Option<Payment>, PaymentGatewayError> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE vs = $1 ORDER BY id DESC LIMIT 1");
    let payment = sqlx::query_as::<_, Payment>(&sql).bind(vs).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payments_for_vs(vs: &Vs, conn: &mut SqliteConnection) -> Result<Vec<Payment>, PaymentGatewayError> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE vs = $1 ORDER BY id DESC");
    let payments = sqlx::query_as::<_, Payment>(&sql).bind(vs).fetch_all(conn).await?;
    Ok(payments)
}

pub async fn payment_exists_for_vs(vs: &Vs, conn: &mut SqliteConnection) -> Result<bool, PaymentGatewayError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM payments WHERE vs = $1)")
        .bind(vs)
        .fetch_one(conn)
        .await?;
    Ok(exists)
}

/// Moves a payment to `received` on behalf of a bank confirmation. A payment that is already received is left
/// untouched, so redelivered confirmations do not modify the row. Returns `None` if the payment does not exist.
pub async fn receive_bank_payment(
    payment_id: i64,
    amount: Czk,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, PaymentGatewayError> {
    let sql = format!(
        r#"
            UPDATE payments SET
                status = 'received',
                amount_czk = $1,
                received_at = COALESCE(received_at, CURRENT_TIMESTAMP),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND status <> 'received'
            RETURNING {PAYMENT_COLUMNS}
        "#
    );
    let updated = sqlx::query_as::<_, Payment>(&sql).bind(amount).bind(payment_id).fetch_optional(&mut *conn).await?;
    match updated {
        Some(p) => Ok(Some(p)),
        None => fetch_payment(payment_id, conn).await,
    }
}

/// Moves a payment to `received` on behalf of an operator. `amount` replaces the stored amount when given, and `note`
/// is appended to the reference trail.
pub async fn receive_manual_payment(
    payment_id: i64,
    amount: Option<Czk>,
    note: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, PaymentGatewayError> {
    let sql = format!(
        r#"
            UPDATE payments SET
                status = 'received',
                amount_czk = COALESCE($1, amount_czk),
                received_at = COALESCE(received_at, CURRENT_TIMESTAMP),
                reference = CASE
                    WHEN $2 IS NULL THEN reference
                    WHEN reference IS NULL OR reference = '' THEN $2
                    ELSE reference || ' | ' || $2
                END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            RETURNING {PAYMENT_COLUMNS}
        "#
    );
    let payment = sqlx::query_as::<_, Payment>(&sql).bind(amount).bind(note).bind(payment_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn update_payment_status(
    payment_id: i64,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, PaymentGatewayError> {
    let sql = format!(
        r#"
            UPDATE payments SET
                status = $1,
                received_at = CASE WHEN $1 = 'received' THEN COALESCE(received_at, CURRENT_TIMESTAMP) ELSE received_at END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            RETURNING {PAYMENT_COLUMNS}
        "#
    );
    let payment = sqlx::query_as::<_, Payment>(&sql).bind(status).bind(payment_id).fetch_optional(conn).await?;
    Ok(payment)
}

/// Fetches payments according to the criteria in the `PaymentQueryFilter`, newest first.
pub async fn search_payments(
    query: PaymentQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, PaymentGatewayError> {
    let limit = query.effective_limit();
    let mut builder = QueryBuilder::new(format!("SELECT {PAYMENT_COLUMNS} FROM payments"));
    if query.vs.is_some() || query.status.is_some() {
        builder.push(" WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(vs) = query.vs {
        where_clause.push("vs = ");
        where_clause.push_bind_unseparated(vs);
    }
    if let Some(status) = query.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status);
    }
    builder.push(" ORDER BY id DESC LIMIT ");
    builder.push_bind(limit);
    trace!("🗃️ Executing query: {}", builder.sql());
    let payments = builder.build_query_as::<Payment>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_payments: {}", payments.len());
    Ok(payments)
}

/// Creates a pending payment for every unpaid order that has a token and a stored total, but no payment rows at all.
pub async fn backfill_pending_payments(conn: &mut SqliteConnection) -> Result<u64, PaymentGatewayError> {
    let result = sqlx::query(
        r#"
            INSERT INTO payments (vs, amount_czk, status, reference)
            SELECT o.vs, o.total_czk, 'pending', 'Order #' || o.id
            FROM orders o
            WHERE o.status = 'awaiting_payment'
              AND o.vs IS NOT NULL
              AND o.total_czk IS NOT NULL
              AND NOT EXISTS (SELECT 1 FROM payments p WHERE p.vs = o.vs)
        "#,
    )
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
