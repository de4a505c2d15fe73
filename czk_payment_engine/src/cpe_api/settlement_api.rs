use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    cpe_api::{order_objects::SettlementResult, EngineConfig},
    db_types::{Order, Payment},
    integrations::{Attachment, InvoiceData, InvoiceRenderer, Notifier, OutboundMessage},
    traits::{PaymentGatewayError, SettlementManagement},
};

/// The recipient used for operator notifications when none is configured.
pub const DEFAULT_OPERATOR_RECIPIENT: &str = "operator";

/// `SettlementApi` runs the post-payment side effects of an order that has just been paid.
///
/// Every step is idempotent, so the hook can be re-run after a partial failure:
/// * Sold product records are materialized once per distinct order line.
/// * The invoice e-mail is sent at most once. The `invoice_sent_at` marker is set only after a successful send.
/// * The operator is pinged on every run. That notification is best-effort.
pub struct SettlementApi<B, R, N> {
    db: B,
    renderer: R,
    customer_notifier: N,
    operator: Option<(N, String)>,
    config: EngineConfig,
}

impl<B, R, N> Debug for SettlementApi<B, R, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi (operator notifications: {})", self.operator.is_some())
    }
}

impl<B, R, N> SettlementApi<B, R, N> {
    pub fn new(db: B, renderer: R, customer_notifier: N, config: EngineConfig) -> Self {
        Self { db, renderer, customer_notifier, operator: None, config }
    }

    pub fn with_operator_notifier<S: Into<String>>(mut self, notifier: N, recipient: S) -> Self {
        self.operator = Some((notifier, recipient.into()));
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, R, N> SettlementApi<B, R, N>
where
    B: SettlementManagement,
    R: InvoiceRenderer,
    N: Notifier,
{
    /// Settles a paid order.
    ///
    /// Only a failure to write the sold product records or to read the order is returned as an error. Delivery
    /// failures are logged, leave the invoice marker untouched, and show up as `false` in the result.
    pub async fn on_order_paid(&self, order_id: i64) -> Result<SettlementResult, PaymentGatewayError> {
        let sold_records_created = self.db.materialize_sold_products(order_id).await?;
        let order = self
            .db
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(format!("#{order_id}")))?;
        let payment = match &order.vs {
            Some(vs) => self.db.fetch_latest_payment(vs).await?,
            None => None,
        };
        let invoice_emailed = match order.invoice_sent_at {
            Some(sent_at) => {
                debug!("🧾️ Invoice for order #{order_id} went out at {sent_at}. Not sending it again");
                false
            },
            None => self.send_invoice(&order, payment.as_ref()).await,
        };
        let operator_notified = self.notify_operator(&order, payment.as_ref()).await;
        let result = SettlementResult { sold_records_created, invoice_emailed, operator_notified };
        info!(
            "🧾️ Order #{order_id} settled. {} sold records created. Invoice sent: {}. Operator notified: {}",
            result.sold_records_created, result.invoice_emailed, result.operator_notified
        );
        Ok(result)
    }

    /// Re-runs settlement on operator request, e.g. after the mail relay was down when the order was paid.
    ///
    /// Unlike [`Self::on_order_paid`], which trusts the paid event, this refuses orders that are not `paid`.
    pub async fn settle(&self, order_id: i64) -> Result<SettlementResult, PaymentGatewayError> {
        let order = self
            .db
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(format!("#{order_id}")))?;
        if !order.is_paid() {
            debug!("🧾️ Not settling order #{order_id}. It is {}", order.status);
            return Err(PaymentGatewayError::OrderNotPaid(order_id));
        }
        info!("🧾️ Re-running settlement for order #{order_id}");
        self.on_order_paid(order_id).await
    }

    async fn send_invoice(&self, order: &Order, payment: Option<&Payment>) -> bool {
        let items = match self.db.fetch_order_items(order.id).await {
            Ok(items) => items,
            Err(e) => {
                error!("🧾️ Could not fetch the items of order #{}. The invoice was not sent. {e}", order.id);
                return false;
            },
        };
        let data = InvoiceData {
            order: order.clone(),
            items,
            shipping_fee: self.config.shipping_fee,
            payment_reference: payment.and_then(|p| p.reference.clone()),
        };
        let document = match self.renderer.render(&data) {
            Ok(doc) => doc,
            Err(e) => {
                error!("🧾️ Could not render the invoice for order #{}. {e}", order.id);
                return false;
            },
        };
        let attachment =
            Attachment::new(self.renderer.file_name(order.id), self.renderer.content_type().to_string(), document);
        let subject = format!("Invoice for order #{}", order.id);
        let body = format!(
            "Dear {},\n\nthank you for your payment of {}. Your invoice is attached.\n",
            order.customer_name,
            data.total()
        );
        let message = OutboundMessage::new(order.customer_email.clone(), subject, body).with_attachment(attachment);
        if let Err(e) = self.customer_notifier.send(message).await {
            error!("🧾️ Could not send the invoice for order #{} to {}. {e}", order.id, order.customer_email);
            return false;
        }
        match self.db.mark_invoice_sent(order.id, Utc::now()).await {
            Ok(true) => {
                debug!("🧾️ Invoice for order #{} sent to {}", order.id, order.customer_email);
                true
            },
            Ok(false) => {
                warn!("🧾️ Invoice for order #{} was marked as sent by someone else in the meantime", order.id);
                false
            },
            Err(e) => {
                error!("🧾️ Invoice for order #{} was sent, but could not be marked as sent. {e}", order.id);
                false
            },
        }
    }

    async fn notify_operator(&self, order: &Order, payment: Option<&Payment>) -> bool {
        let Some((notifier, recipient)) = &self.operator else {
            return false;
        };
        let vs = order.vs.as_ref().map(|v| v.as_str()).unwrap_or("-");
        let amount = payment.map(|p| p.amount_czk).or(order.total_czk).map(|a| a.to_string()).unwrap_or_default();
        let body = format!(
            "Order #{} is paid.\nVS: {vs}\nAmount: {amount}\nCustomer: {} <{}>\n",
            order.id, order.customer_name, order.customer_email
        );
        let message = OutboundMessage::new(recipient.clone(), format!("Payment confirmed: order #{}", order.id), body);
        match notifier.send(message).await {
            Ok(()) => true,
            Err(e) => {
                warn!("🧾️ Could not notify the operator about order #{}. {e}", order.id);
                false
            },
        }
    }
}
