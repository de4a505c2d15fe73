//! #  Database backend contracts
//!
//! This module defines the behaviour that a database backend needs to expose in order to be supported by the
//! payment engine. The engine APIs are generic over these traits, so the same flows run against SQLite in
//! production and against mocks in the server's endpoint tests.
//!
//! * [`PaymentGatewayDatabase`] defines the state-changing flows: order creation and the paid transition.
//! * [`InventoryManagement`] is the inventory ledger: products and their atomic conditional stock decrement.
//! * [`VsRegistry`] allocates variable symbols and guarantees that no token is ever handed out twice.
//! * [`OrderManagement`] provides read-only queries for orders, payments and the unmatched-payment audit trail.
//! * [`SettlementManagement`] stores the idempotent artefacts of settling a paid order.
mod data_objects;
mod inventory_management;
mod order_management;
mod payment_gateway_database;
mod settlement_management;
mod vs_registry;

pub use data_objects::{
    OrderCreated,
    PaidTransition,
    PaymentQueryFilter,
    StockDecrement,
    VsPolicy,
    MAX_PAYMENT_QUERY_LIMIT,
};
pub use inventory_management::InventoryManagement;
pub use order_management::OrderManagement;
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
pub use settlement_management::SettlementManagement;
pub use vs_registry::VsRegistry;
