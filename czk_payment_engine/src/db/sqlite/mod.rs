//! SQLite backend for the payment engine.
//!
//! The submodules hold "low-level" functions that take a `&mut SqliteConnection`, so that they can be composed inside a
//! transaction (pass `&mut *tx`) or run on their own. None of them are atomic by themselves beyond the single
//! statement they execute. [`SqliteDatabase`] composes them into the transactional flows defined by the backend traits.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::traits::PaymentGatewayError;

pub mod orders;
pub mod payments;
pub mod products;
pub mod settlements;
mod sqlite_impl;
pub mod unmatched;
pub mod vs_registry;

pub use sqlite_impl::SqliteDatabase;

const SQLITE_DB_URL: &str = "sqlite://data/cpg_store.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub fn db_url() -> String {
    let result = env::var("CPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ CPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

/// Opens a connection pool. Connections use WAL journaling and a generous busy timeout so that concurrent writers
/// queue up behind each other instead of failing with `SQLITE_BUSY`.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, PaymentGatewayError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
