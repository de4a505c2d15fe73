//! # CZK Payment Gateway server
//! The HTTP front of the CZK payment engine. It is responsible for:
//! * Taking orders from the storefront and answering with the variable symbol the customer must quote.
//! * Serving payment status and QR Platba codes to customers.
//! * Letting the shop operator manage stock, confirm payments by hand and trigger a bank mailbox sync.
//! * Running the background worker that reconciles bank notifications against open orders.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: Checkout, order lookups, payment status, QR codes and product lookups.
//! * `/admin/...`: Inventory and payment administration. Guarded by the admin IP whitelist.

pub mod bank_sync_worker;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
