#![allow(dead_code)]
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
    Mutex,
};

use czk_payment_engine::{
    db_types::{Customer, Czk, NewOrder, NewOrderItem, NewProduct, Product},
    integrations::{Notifier, NotifierError, OutboundMessage},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    InventoryManagement,
    PaymentGatewayDatabase,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub async fn setup() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not remove {url}: {e}");
    }
}

pub async fn add_product(db: &SqliteDatabase, name: &str, crowns: i64, stock: i64) -> Product {
    db.insert_product(NewProduct::new(name, Czk::from_crowns(crowns), stock)).await.expect("Error adding product")
}

pub fn customer() -> Customer {
    Customer::new("Jana Nováková", "jana@example.cz", "Dlouhá 1, 110 00 Praha")
}

/// An order for `quantity` units of each `(product, unit price in crowns)` pair.
pub fn new_order(lines: &[(i64, i64, i64)]) -> NewOrder {
    let items = lines.iter().map(|&(id, qty, crowns)| NewOrderItem::new(id, qty, Czk::from_crowns(crowns))).collect();
    NewOrder::new(customer(), items)
}

/// A notifier that keeps every message it was given, and fails on demand.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    failures_left: Arc<AtomicUsize>,
}

impl RecordingNotifier {
    pub fn failing(times: usize) -> Self {
        let result = Self::default();
        result.failures_left.store(times, Ordering::SeqCst);
        result
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, message: OutboundMessage) -> Result<(), NotifierError> {
        let failed = self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok();
        if failed {
            return Err(NotifierError::Transport("connection refused".into()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}
