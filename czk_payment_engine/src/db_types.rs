//! Data types stored in, and returned from, the payment engine database.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use cpg_common::Czk;
use log::error;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------          Vs           ---------------------------------------------------------
/// The variable symbol: a numeric token of 1 to 10 digits that the bank carries with every payment. It is the only
/// link between an incoming bank transfer and an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct Vs(String);

pub const VS_MAX_DIGITS: u32 = 10;

impl Vs {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates a random candidate token with exactly `digits` digits (no leading zero).
    pub fn random<R: Rng>(rng: &mut R, digits: u32) -> Self {
        let digits = digits.clamp(1, VS_MAX_DIGITS);
        let low = if digits == 1 { 1 } else { 10u64.pow(digits - 1) };
        let high = 10u64.pow(digits);
        Self(rng.gen_range(low..high).to_string())
    }
}

impl FromStr for Vs {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = !s.is_empty() && s.len() <= VS_MAX_DIGITS as usize && s.chars().all(|c| c.is_ascii_digit());
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(ConversionError(format!("'{s}' is not a variable symbol. Expected 1 to 10 digits.")))
        }
    }
}

impl TryFrom<String> for Vs {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Vs> for String {
    fn from(value: Vs) -> Self {
        value.0
    }
}

impl Display for Vs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been created and is waiting for the bank transfer.
    AwaitingPayment,
    /// A matching payment was received, or an admin marked the order as paid.
    Paid,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::AwaitingPayment => write!(f, "awaiting_payment"),
            OrderStatusType::Paid => write!(f, "paid"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_payment" => Ok(Self::AwaitingPayment),
            "paid" => Ok(Self::Paid),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to awaiting_payment");
            OrderStatusType::AwaitingPayment
        })
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Received,
    Failed,
    Canceled,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Received => "received",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "received" => Ok(Self::Received),
            "failed" => Ok(Self::Failed),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------       Product         ---------------------------------------------------------
/// The slice of a catalogue product that the engine needs. The catalogue itself is managed elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Czk,
    pub stock: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Czk,
    pub stock: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price: Czk, stock: i64) -> Self {
        Self { name: name.into(), price, stock }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub vs: Option<Vs>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub customer_address: String,
    pub note: Option<String>,
    /// `None` only for legacy rows created before totals were stored.
    pub total_czk: Option<Czk>,
    pub status: OrderStatusType,
    pub invoice_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.status == OrderStatusType::Paid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Czk,
}

impl OrderItem {
    pub fn line_total(&self) -> Czk {
        self.unit_price * self.quantity
    }
}

/// Contact details supplied at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl Customer {
    pub fn new<S: Into<String>>(name: S, email: S, address: S) -> Self {
        Self { name: name.into(), email: email.into(), address: address.into(), ..Default::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    /// The name printed on the invoice. Falls back to the catalogue name when omitted.
    #[serde(default)]
    pub name: Option<String>,
    pub quantity: i64,
    pub unit_price: Czk,
}

impl NewOrderItem {
    pub fn new(product_id: i64, quantity: i64, unit_price: Czk) -> Self {
        Self { product_id, name: None, quantity, unit_price }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer: Customer,
    pub items: Vec<NewOrderItem>,
    /// A client-chosen variable symbol, e.g. one already shown to the customer in a QR code.
    #[serde(default)]
    pub vs: Option<Vs>,
}

impl NewOrder {
    pub fn new(customer: Customer, items: Vec<NewOrderItem>) -> Self {
        Self { customer, items, vs: None }
    }

    pub fn with_vs(mut self, vs: Vs) -> Self {
        self.vs = Some(vs);
        self
    }
}

//--------------------------------------       Payment         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub vs: Vs,
    pub amount_czk: Czk,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub vs: Vs,
    pub amount: Czk,
    pub status: PaymentStatus,
    pub reference: Option<String>,
}

impl NewPayment {
    pub fn pending(vs: Vs, amount: Czk, reference: String) -> Self {
        Self { vs, amount, status: PaymentStatus::Pending, reference: Some(reference) }
    }

    pub fn received(vs: Vs, amount: Czk, reference: Option<String>) -> Self {
        Self { vs, amount, status: PaymentStatus::Received, reference }
    }
}

//--------------------------------------     SoldProduct       ---------------------------------------------------------
/// A settlement record: one row per order line, written once the order is paid.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SoldProduct {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Czk,
    pub buyer_name: String,
    pub buyer_email: String,
    pub vs: Option<Vs>,
    pub sold_at: DateTime<Utc>,
}

//--------------------------------------  UnmatchedPayment     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// No payment row exists for the token.
    UnknownVs,
    /// A payment exists, but no order carries the token.
    OrderNotFound,
    /// The order has neither a stored total nor line items to recompute it from.
    OrderAmountMissing,
    /// The paid amount is outside the tolerance.
    AmountMismatch,
}

impl Display for UnmatchedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnmatchedReason::UnknownVs => "unknown_vs",
            UnmatchedReason::OrderNotFound => "order_not_found",
            UnmatchedReason::OrderAmountMissing => "order_amount_missing",
            UnmatchedReason::AmountMismatch => "amount_mismatch",
        };
        f.write_str(s)
    }
}

/// An audit entry for a bank confirmation that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UnmatchedPayment {
    pub id: i64,
    pub vs: Vs,
    pub paid: Czk,
    pub expected: Option<Czk>,
    pub order_id: Option<i64>,
    pub reason: UnmatchedReason,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUnmatchedPayment {
    pub vs: Vs,
    pub paid: Czk,
    pub expected: Option<Czk>,
    pub order_id: Option<i64>,
    pub reason: UnmatchedReason,
}
