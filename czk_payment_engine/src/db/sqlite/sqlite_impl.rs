use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::{new_pool, orders, payments, products, settlements, unmatched, vs_registry};
use crate::{
    db_types::{
        Czk,
        NewOrder,
        NewPayment,
        NewProduct,
        NewUnmatchedPayment,
        Order,
        OrderItem,
        Payment,
        PaymentStatus,
        Product,
        SoldProduct,
        UnmatchedPayment,
        Vs,
    },
    traits::{
        InventoryManagement,
        OrderCreated,
        OrderManagement,
        PaidTransition,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        PaymentQueryFilter,
        SettlementManagement,
        StockDecrement,
        VsPolicy,
        VsRegistry,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentGatewayError> {
        let pool = new_pool(url, max_connections).await?;
        trace!("🗃️ Created new connection pool for {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub async fn migrate(&self) -> Result<(), PaymentGatewayError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_order(
        &self,
        order: NewOrder,
        total: Czk,
        vs_policy: VsPolicy,
    ) -> Result<OrderCreated, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        // Must stay the first statement, so that the transaction holds the write lock before it reads anything.
        let vs = match &order.vs {
            Some(vs) => {
                vs_registry::reserve_exact(vs, &mut tx).await?;
                vs.clone()
            },
            None => vs_registry::reserve_new(vs_policy, &mut tx).await?,
        };
        let mut stock = Vec::with_capacity(order.items.len());
        let mut names = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let (remaining, catalogue_name) = products::decrement_stock(item.product_id, item.quantity, &mut tx).await?;
            stock.push(StockDecrement { product_id: item.product_id, taken: item.quantity, remaining });
            names.push(item.name.clone().unwrap_or(catalogue_name));
        }
        let new_order = orders::insert_order(&order.customer, &vs, total, &mut tx).await?;
        let mut items = Vec::with_capacity(order.items.len());
        for (item, name) in order.items.iter().zip(names) {
            let item =
                orders::insert_order_item(new_order.id, item.product_id, &name, item.quantity, item.unit_price, &mut tx)
                    .await?;
            items.push(item);
        }
        let payment = if payments::payment_exists_for_vs(&vs, &mut tx).await? {
            debug!("🗃️ A payment already exists for vs {vs}. No pending payment created for order #{}", new_order.id);
            None
        } else {
            let reference = format!("Order #{}", new_order.id);
            Some(payments::insert_payment(NewPayment::pending(vs.clone(), total, reference), &mut tx).await?)
        };
        tx.commit().await?;
        info!("🗃️ Order #{} created with vs {vs} for {total}", new_order.id);
        Ok(OrderCreated { order: new_order, items, payment, stock })
    }

    async fn confirm_bank_payment(
        &self,
        payment_id: i64,
        order_id: i64,
        amount: Czk,
    ) -> Result<PaidTransition, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let status_changed = orders::mark_order_paid(order_id, &mut tx).await?;
        let payment = payments::receive_bank_payment(payment_id, amount, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::PaymentNotFound(payment_id))?;
        let order = orders::fetch_order(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(PaidTransition { payment, payment_created: false, order, status_changed })
    }

    async fn confirm_payment_manually(
        &self,
        vs: &Vs,
        amount: Option<Czk>,
        reference: Option<String>,
    ) -> Result<PaidTransition, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let status_changed = orders::mark_order_paid_by_vs(vs, &mut tx).await?;
        let order = orders::fetch_order_by_vs(vs, &mut tx).await?;
        let (payment, payment_created) = match payments::fetch_latest_payment(vs, &mut tx).await? {
            Some(latest) => {
                let payment = payments::receive_manual_payment(latest.id, amount, reference.as_deref(), &mut tx)
                    .await?
                    .ok_or(PaymentGatewayError::PaymentNotFound(latest.id))?;
                (payment, false)
            },
            None => {
                let amount = amount.or_else(|| order.as_ref().and_then(|o| o.total_czk)).unwrap_or_default();
                let new_payment = NewPayment::received(vs.clone(), amount, reference);
                let payment = payments::insert_payment(new_payment, &mut tx).await?;
                (payment, true)
            },
        };
        tx.commit().await?;
        debug!("🗃️ Manual confirmation for vs {vs} applied. Payment #{} (new: {payment_created})", payment.id);
        Ok(PaidTransition { payment, payment_created, order, status_changed })
    }

    async fn set_payment_status(
        &self,
        payment_id: i64,
        status: PaymentStatus,
    ) -> Result<PaidTransition, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::update_payment_status(payment_id, status, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::PaymentNotFound(payment_id))?;
        let status_changed = match status {
            PaymentStatus::Received => orders::mark_order_paid_by_vs(&payment.vs, &mut tx).await?,
            _ => false,
        };
        let order = orders::fetch_order_by_vs(&payment.vs, &mut tx).await?;
        tx.commit().await?;
        Ok(PaidTransition { payment, payment_created: false, order, status_changed })
    }

    async fn record_unmatched_payment(
        &self,
        unmatched: NewUnmatchedPayment,
    ) -> Result<UnmatchedPayment, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        unmatched::insert_unmatched(unmatched, &mut conn).await
    }

    async fn backfill_pending_payments(&self) -> Result<u64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let created = payments::backfill_pending_payments(&mut conn).await?;
        info!("🗃️ Backfilled {created} pending payments");
        Ok(created)
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_order_by_vs(&self, vs: &Vs) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_vs(vs, &mut conn).await
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_items(order_id, &mut conn).await
    }

    async fn fetch_latest_payment(&self, vs: &Vs) -> Result<Option<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_latest_payment(vs, &mut conn).await
    }

    async fn fetch_payments_for_vs(&self, vs: &Vs) -> Result<Vec<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payments_for_vs(vs, &mut conn).await
    }

    async fn search_payments(&self, query: PaymentQueryFilter) -> Result<Vec<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payments::search_payments(query, &mut conn).await
    }

    async fn fetch_unmatched_payments(&self, limit: i64) -> Result<Vec<UnmatchedPayment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        unmatched::fetch_unmatched(limit, &mut conn).await
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(product_id, &mut conn).await
    }

    async fn set_stock(&self, product_id: i64, stock: i64) -> Result<Product, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        products::set_stock(product_id, stock, &mut conn).await
    }

    async fn decrement_stock(&self, product_id: i64, quantity: i64) -> Result<i64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        products::decrement_stock(product_id, quantity, &mut conn).await.map(|(remaining, _)| remaining)
    }
}

impl VsRegistry for SqliteDatabase {
    async fn reserve_exact(&self, vs: &Vs) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        vs_registry::reserve_exact(vs, &mut conn).await
    }

    async fn reserve_new(&self, policy: VsPolicy) -> Result<Vs, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        vs_registry::reserve_new(policy, &mut conn).await
    }

    async fn is_reserved(&self, vs: &Vs) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        vs_registry::is_reserved(vs, &mut conn).await
    }
}

impl SettlementManagement for SqliteDatabase {
    async fn materialize_sold_products(&self, order_id: i64) -> Result<u64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        settlements::materialize_sold_products(order_id, &mut conn).await
    }

    async fn fetch_sold_products(&self, order_id: i64) -> Result<Vec<SoldProduct>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        settlements::fetch_sold_products(order_id, &mut conn).await
    }

    async fn mark_invoice_sent(&self, order_id: i64, sent_at: DateTime<Utc>) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::mark_invoice_sent(order_id, sent_at, &mut conn).await
    }
}
