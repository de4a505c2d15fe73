//! # Payment engine public API
//!
//! The `cpe_api` module exposes the programmatic API of the payment engine. Each API covers one concern and only asks
//! for the backend traits it needs, so callers can pick the parts they use.
//!
//! * [`order_flow_api`] handles checkout: validation, pricing, and the atomic creation of an order with its stock
//!   decrements, variable symbol and pending payment.
//! * [`reconciliation_api`] matches bank confirmations to orders, records the ones that do not match, and carries the
//!   manual confirmation and status override paths.
//! * [`settlement_api`] runs the idempotent side effects of a paid order: sold product records, the invoice e-mail and
//!   the operator notification.
//! * [`order_query_api`] answers read-only questions about orders, payments and unmatched confirmations.
//! * [`inventory_api`] manages the product catalogue and its stock.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs.
//!
//! ```rust,ignore
//! use czk_payment_engine::{cpe_api::EngineConfig, events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/cpg_store.db", 25).await?;
//! // SqliteDatabase implements PaymentGatewayDatabase
//! let api = OrderFlowApi::new(db, EventProducers::default(), EngineConfig::default());
//! let created = api.create_order(new_order).await?;
//! println!("Pay {} with variable symbol {:?}", created.order.total_czk.unwrap_or_default(), created.order.vs);
//! ```

mod engine_config;
pub mod errors;
pub mod inventory_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod order_query_api;
pub mod reconciliation_api;
pub mod settlement_api;

pub use engine_config::{EngineConfig, DEFAULT_PAYMENT_TOLERANCE, DEFAULT_SHIPPING_FEE};
