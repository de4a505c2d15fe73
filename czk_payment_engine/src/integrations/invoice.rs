//! Invoice documents.
//!
//! The engine only needs a byte stream and a file name to attach to the customer e-mail. The layout of the document
//! belongs to the renderer. [`PlainTextInvoice`] is the built-in renderer.
use std::fmt::Write;

use thiserror::Error;

use crate::db_types::{Czk, Order, OrderItem};

#[derive(Debug, Clone, Error)]
#[error("Could not render the invoice. {0}")]
pub struct InvoiceError(pub String);

impl From<std::fmt::Error> for InvoiceError {
    fn from(e: std::fmt::Error) -> Self {
        Self(e.to_string())
    }
}

/// Everything that goes on an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceData {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub shipping_fee: Czk,
    /// The reference of the payment that settled the order, e.g. `Order #17`.
    pub payment_reference: Option<String>,
}

impl InvoiceData {
    pub fn subtotal(&self) -> Czk {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// The stored order total. Legacy orders without one are billed as items plus shipping.
    pub fn total(&self) -> Czk {
        self.order.total_czk.unwrap_or_else(|| self.subtotal() + self.shipping_fee)
    }

    /// The shipping line. Derived from the total, so the document always adds up.
    pub fn shipping(&self) -> Czk {
        self.total() - self.subtotal()
    }
}

pub trait InvoiceRenderer {
    fn content_type(&self) -> &str;

    fn file_extension(&self) -> &str;

    fn render(&self, data: &InvoiceData) -> Result<Vec<u8>, InvoiceError>;

    fn file_name(&self, order_id: i64) -> String {
        format!("Invoice-Order-{order_id}.{}", self.file_extension())
    }
}

#[derive(Debug, Clone)]
pub struct PlainTextInvoice {
    seller: String,
}

impl Default for PlainTextInvoice {
    fn default() -> Self {
        Self { seller: "CZK Payment Gateway".to_string() }
    }
}

impl PlainTextInvoice {
    pub fn new<S: Into<String>>(seller: S) -> Self {
        Self { seller: seller.into() }
    }
}

impl InvoiceRenderer for PlainTextInvoice {
    fn content_type(&self) -> &str {
        "text/plain; charset=utf-8"
    }

    fn file_extension(&self) -> &str {
        "txt"
    }

    fn render(&self, data: &InvoiceData) -> Result<Vec<u8>, InvoiceError> {
        let order = &data.order;
        let mut doc = String::new();
        writeln!(doc, "INVOICE - Order #{}", order.id)?;
        writeln!(doc, "Seller: {}", self.seller)?;
        writeln!(doc, "Issued: {}", order.updated_at.format("%d.%m.%Y"))?;
        if let Some(vs) = &order.vs {
            writeln!(doc, "Variable symbol: {vs}")?;
        }
        if let Some(reference) = &data.payment_reference {
            writeln!(doc, "Payment reference: {reference}")?;
        }
        writeln!(doc)?;
        writeln!(doc, "Customer: {}", order.customer_name)?;
        writeln!(doc, "E-mail: {}", order.customer_email)?;
        if let Some(phone) = &order.customer_phone {
            writeln!(doc, "Phone: {phone}")?;
        }
        writeln!(doc, "Address: {}", order.customer_address)?;
        writeln!(doc)?;
        writeln!(doc, "{:<32} {:>5} {:>12} {:>12}", "Item", "Qty", "Unit price", "Total")?;
        for item in &data.items {
            writeln!(
                doc,
                "{:<32} {:>5} {:>12} {:>12}",
                item.product_name,
                item.quantity,
                item.unit_price.to_decimal_string(),
                item.line_total().to_decimal_string()
            )?;
        }
        writeln!(doc, "{:<32} {:>5} {:>12} {:>12}", "Shipping", "", "", data.shipping().to_decimal_string())?;
        writeln!(doc)?;
        writeln!(doc, "TOTAL: {}", data.total())?;
        Ok(doc.into_bytes())
    }
}
