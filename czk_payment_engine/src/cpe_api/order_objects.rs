use serde::{Deserialize, Serialize};

use crate::db_types::{Czk, Order, OrderItem, Payment, UnmatchedReason, Vs};

/// An order together with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// The latest payment and the order carrying a variable symbol. Either may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusView {
    pub vs: Vs,
    pub payment: Option<Payment>,
    pub order: Option<Order>,
}

/// The result of applying one bank confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationOutcome {
    pub vs: Vs,
    pub paid: Czk,
    pub expected: Option<Czk>,
    pub payment_id: Option<i64>,
    pub order_id: Option<i64>,
    /// The confirmation was matched to an order within the tolerance.
    pub order_matched: bool,
    /// This confirmation moved the order to `paid`. False when the order had already been paid.
    pub status_changed: bool,
    pub unmatched_reason: Option<UnmatchedReason>,
}

/// A confirmation that could not be processed at all, e.g. because the database was unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedConfirmation {
    pub vs: Vs,
    pub paid: Czk,
    pub error: String,
}

/// What a batch of bank confirmations did. Amounts are kept for audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub checked: usize,
    pub matched: Vec<ConfirmationOutcome>,
    pub unmatched: Vec<ConfirmationOutcome>,
    pub failed: Vec<FailedConfirmation>,
}

impl ReconciliationSummary {
    pub fn orders_paid(&self) -> usize {
        self.matched.iter().filter(|o| o.status_changed).count()
    }

    pub fn push(&mut self, outcome: ConfirmationOutcome) {
        self.checked += 1;
        if outcome.order_matched {
            self.matched.push(outcome);
        } else {
            self.unmatched.push(outcome);
        }
    }

    pub fn push_failure(&mut self, failure: FailedConfirmation) {
        self.checked += 1;
        self.failed.push(failure);
    }
}

/// The result of a manual payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualConfirmation {
    pub payment_id: i64,
    pub payment_created: bool,
    pub order_id: Option<i64>,
    pub status_changed: bool,
}

/// What the settlement hook did for one order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub sold_records_created: u64,
    pub invoice_emailed: bool,
    pub operator_notified: bool,
}
