use std::fmt::Debug;

use log::*;

use crate::{
    cpe_api::{
        errors::BankSyncError,
        order_objects::{ConfirmationOutcome, FailedConfirmation, ManualConfirmation, ReconciliationSummary},
        EngineConfig,
    },
    db_types::{Czk, NewUnmatchedPayment, Order, OrderItem, PaymentStatus, UnmatchedReason, Vs},
    events::{EventProducers, OrderPaidEvent},
    helpers::BankConfirmation,
    integrations::{BankNotificationIngester, Mailbox},
    traits::{PaidTransition, PaymentGatewayDatabase, PaymentGatewayError},
};

/// Manual references are cut to this many characters.
pub const MAX_REFERENCE_LEN: usize = 255;

/// `ReconciliationApi` matches bank confirmations to orders and applies the paid transition.
///
/// Every path that can mark an order as paid goes through here: bank confirmations, manual confirmations by an admin,
/// and payment status overrides. All of them rely on the same guarded transition in the backend, and all of them
/// publish an [`OrderPaidEvent`] only when the call itself moved the order to `paid`. Re-applying a confirmation is
/// therefore harmless: the state ends up the same and the settlement hook does not fire again.
pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
    config: EngineConfig,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi (tolerance: {})", self.config.tolerance)
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers, config: EngineConfig) -> Self {
        Self { db, producers, config }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> ReconciliationApi<B>
where B: PaymentGatewayDatabase
{
    /// Applies a single `(vs, amount)` bank confirmation.
    ///
    /// 1. The latest payment for the token is looked up. Without one, the confirmation is unmatched.
    /// 2. The expected amount is the order's stored total. Legacy orders without one fall back to the sum of their
    ///    items plus the configured shipping fee.
    /// 3. An amount within the tolerance of the expected total is a match. The payment is marked as received and the
    ///    order as paid, unless it was paid already.
    ///
    /// Anything that does not match is recorded in the unmatched audit trail, and no payment or order is touched.
    pub async fn apply_bank_confirmation(
        &self,
        vs: &Vs,
        paid: Czk,
    ) -> Result<ConfirmationOutcome, PaymentGatewayError> {
        let Some(payment) = self.db.fetch_latest_payment(vs).await? else {
            info!("🔄️💰️ Bank payment of {paid} for unknown vs {vs}");
            return self.unmatched(vs, paid, None, None, None, UnmatchedReason::UnknownVs).await;
        };
        let Some(order) = self.db.fetch_order_by_vs(vs).await? else {
            warn!("🔄️💰️ Payment #{} exists for vs {vs}, but no order carries it", payment.id);
            let reason = UnmatchedReason::OrderNotFound;
            return self.unmatched(vs, paid, Some(payment.amount_czk), Some(payment.id), None, reason).await;
        };
        let Some(expected) = self.expected_total(&order).await? else {
            warn!("🔄️💰️ Order #{} has no total and no items. Cannot check the bank payment of {paid}", order.id);
            let reason = UnmatchedReason::OrderAmountMissing;
            return self.unmatched(vs, paid, None, Some(payment.id), Some(order.id), reason).await;
        };
        if !self.config.amounts_match(paid, expected) {
            info!("🔄️💰️ Bank payment of {paid} for order #{} does not match the expected {expected}", order.id);
            let reason = UnmatchedReason::AmountMismatch;
            return self.unmatched(vs, paid, Some(expected), Some(payment.id), Some(order.id), reason).await;
        }
        let transition = self.db.confirm_bank_payment(payment.id, order.id, paid).await?;
        if transition.status_changed {
            info!("🔄️✅️ Order #{} is paid. Bank payment of {paid} for vs {vs}", order.id);
        } else {
            debug!("🔄️✅️ Order #{} was already paid. Confirmation for vs {vs} is a no-op", order.id);
        }
        let status_changed = transition.status_changed;
        self.call_order_paid_hook(transition).await;
        Ok(ConfirmationOutcome {
            vs: vs.clone(),
            paid,
            expected: Some(expected),
            payment_id: Some(payment.id),
            order_id: Some(order.id),
            order_matched: true,
            status_changed,
            unmatched_reason: None,
        })
    }

    /// Applies a batch of confirmations in order. A confirmation that fails outright (as opposed to not matching) is
    /// reported in [`ReconciliationSummary::failed`] and the batch carries on.
    pub async fn apply_bank_confirmations(&self, confirmations: Vec<BankConfirmation>) -> ReconciliationSummary {
        let mut summary = ReconciliationSummary::default();
        for BankConfirmation { vs, amount } in confirmations {
            match self.apply_bank_confirmation(&vs, amount).await {
                Ok(outcome) => summary.push(outcome),
                Err(e) => {
                    error!("🔄️💰️ Could not apply the bank confirmation for vs {vs} ({amount}). {e}");
                    summary.push_failure(FailedConfirmation { vs, paid: amount, error: e.to_string() });
                },
            }
        }
        info!(
            "🔄️💰️ Reconciled {} bank confirmations. {} matched ({} orders paid), {} unmatched, {} failed",
            summary.checked,
            summary.matched.len(),
            summary.orders_paid(),
            summary.unmatched.len(),
            summary.failed.len()
        );
        summary
    }

    /// Polls the bank mailbox once and reconciles whatever it produced.
    pub async fn sync_mailbox<M: Mailbox>(
        &self,
        ingester: &BankNotificationIngester<M>,
    ) -> Result<ReconciliationSummary, BankSyncError> {
        let confirmations = ingester.poll_batch().await?;
        Ok(self.apply_bank_confirmations(confirmations).await)
    }

    /// Confirms a payment by hand, e.g. after the admin checked the bank statement.
    ///
    /// The latest payment for the token is marked as received, or a received payment is created if there is none.
    /// `amount` replaces the payment amount when given and must not be negative. `reference` is appended to the
    /// payment's audit trail. The order carrying the token, if any, is marked as paid with the same guard as the bank
    /// path.
    pub async fn confirm_payment_manually(
        &self,
        vs: &Vs,
        amount: Option<Czk>,
        reference: Option<String>,
    ) -> Result<ManualConfirmation, PaymentGatewayError> {
        if let Some(amount) = amount.filter(Czk::is_negative) {
            return Err(PaymentGatewayError::InvalidAmount(format!("The amount cannot be negative. Got {amount}")));
        }
        let reference = reference
            .map(|r| r.trim().chars().take(MAX_REFERENCE_LEN).collect::<String>())
            .filter(|r| !r.is_empty());
        let transition = self.db.confirm_payment_manually(vs, amount, reference).await?;
        let result = ManualConfirmation {
            payment_id: transition.payment.id,
            payment_created: transition.payment_created,
            order_id: transition.order.as_ref().map(|o| o.id),
            status_changed: transition.status_changed,
        };
        info!(
            "🔄️✋️ Payment for vs {vs} confirmed manually. Payment #{} (new: {}). Order paid now: {}",
            result.payment_id, result.payment_created, result.status_changed
        );
        self.call_order_paid_hook(transition).await;
        Ok(result)
    }

    /// Overrides the status of a payment. Moving it to `received` marks its order as paid, if it was not already.
    pub async fn set_payment_status(
        &self,
        payment_id: i64,
        status: PaymentStatus,
    ) -> Result<PaidTransition, PaymentGatewayError> {
        let transition = self.db.set_payment_status(payment_id, status).await?;
        info!("🔄️✋️ Payment #{payment_id} set to {status}");
        self.call_order_paid_hook(transition.clone()).await;
        Ok(transition)
    }

    /// Creates the missing pending payments for unpaid orders. Returns how many were created.
    pub async fn backfill_pending_payments(&self) -> Result<u64, PaymentGatewayError> {
        self.db.backfill_pending_payments().await
    }

    async fn expected_total(&self, order: &Order) -> Result<Option<Czk>, PaymentGatewayError> {
        if let Some(total) = order.total_czk {
            return Ok(Some(total));
        }
        let items = self.db.fetch_order_items(order.id).await?;
        if items.is_empty() {
            return Ok(None);
        }
        let subtotal = items.iter().map(OrderItem::line_total).sum::<Czk>();
        Ok(Some(subtotal + self.config.shipping_fee))
    }

    async fn unmatched(
        &self,
        vs: &Vs,
        paid: Czk,
        expected: Option<Czk>,
        payment_id: Option<i64>,
        order_id: Option<i64>,
        reason: UnmatchedReason,
    ) -> Result<ConfirmationOutcome, PaymentGatewayError> {
        let record = NewUnmatchedPayment { vs: vs.clone(), paid, expected, order_id, reason };
        self.db.record_unmatched_payment(record).await?;
        Ok(ConfirmationOutcome {
            vs: vs.clone(),
            paid,
            expected,
            payment_id,
            order_id,
            order_matched: false,
            status_changed: false,
            unmatched_reason: Some(reason),
        })
    }

    async fn call_order_paid_hook(&self, transition: PaidTransition) {
        let PaidTransition { payment, order, status_changed, .. } = transition;
        let Some(order) = order.filter(|_| status_changed) else {
            return;
        };
        for emitter in &self.producers.order_paid_producer {
            debug!("🔄️📦️ Notifying order paid hook subscribers");
            let event = OrderPaidEvent::new(order.clone(), payment.clone());
            emitter.publish_event(event).await;
        }
    }
}
