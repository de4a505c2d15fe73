//! CZK Payment Engine
//!
//! The CZK Payment Engine takes orders for a small shop and reconciles them against bank transfers in Czech crowns.
//! Customers pay by bank transfer, quoting a variable symbol that the engine allocated for their order. The bank's
//! notification e-mails are scraped for `(variable symbol, amount)` pairs, which are matched against the stored order
//! totals. A matched order is marked as paid exactly once, after which its sale is recorded and the invoice is sent.
//!
//! The library is divided into these sections:
//! 1. Database management ([`mod@traits`] and the SQLite backend). You should never need to access the database
//!    directly. Use the public API instead. The data types stored in the database live in [`mod@db_types`].
//! 2. The payment engine public API ([`mod@cpe_api`]): checkout, reconciliation, settlement, queries and inventory.
//! 3. Collaborators at the edges ([`mod@integrations`]): the bank mailbox, invoice rendering and outbound notifiers.
//! 4. Stateless helpers ([`mod@helpers`]): the bank notification parser and QR Platba (SPD) payment codes.
//!
//! The engine also emits events when an order is created and when an order is paid. A simple Actor framework
//! ([`mod@events`]) lets you hook into these events, e.g. to settle the order or to ping the shop owner.
mod db;

pub mod cpe_api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod integrations;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{db_url, new_pool, SqliteDatabase};
pub use cpe_api::{
    errors::BankSyncError,
    inventory_api::InventoryApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    order_query_api::OrderQueryApi,
    reconciliation_api::ReconciliationApi,
    settlement_api::SettlementApi,
    EngineConfig,
};
pub use traits::{
    InventoryManagement,
    OrderManagement,
    PaymentGatewayDatabase,
    PaymentGatewayError,
    SettlementManagement,
    VsRegistry,
};
