use std::sync::Arc;

use czk_payment_engine::{
    db_types::{Order, OrderItem},
    events::{EventHandlers, EventHooks},
    integrations::{Notifier, NotifierChannel, OutboundMessage, PlainTextInvoice, SpoolNotifier, TelegramNotifier},
    SettlementApi,
    SqliteDatabase,
};
use log::*;

use crate::config::ServerConfig;

pub const SETTLEMENT_EVENT_BUFFER_SIZE: usize = 25;

/// The settlement hook as the server runs it: invoices are plain text, and messages go through a runtime-selected
/// channel.
pub type ShopSettlementApi = SettlementApi<SqliteDatabase, PlainTextInvoice, NotifierChannel>;

/// Where order and settlement messages go.
#[derive(Debug, Clone)]
pub struct ShopNotifiers {
    /// Customer mail, spooled for the mail relay.
    pub customer: NotifierChannel,
    /// The operator channel and its recipient. `None` disables operator pings.
    pub operator: Option<(NotifierChannel, String)>,
    /// New orders are copied to this address when set.
    pub order_notify_email: Option<String>,
    /// Printed in order confirmations so that customers know where to pay.
    pub merchant_iban: Option<String>,
}

impl ShopNotifiers {
    pub fn from_config(config: &ServerConfig) -> Self {
        let notifications = &config.notifications;
        let customer = NotifierChannel::Spool(SpoolNotifier::new(&notifications.outbox_dir));
        let operator = notifications.telegram.as_ref().map(|telegram| {
            let notifier = TelegramNotifier::new(telegram.bot_token.clone(), telegram.chat_id.clone());
            (NotifierChannel::Telegram(notifier), telegram.chat_id.clone())
        });
        Self {
            customer,
            operator,
            order_notify_email: notifications.order_notify_email.clone(),
            merchant_iban: config.merchant_iban.clone(),
        }
    }
}

pub fn build_settlement_api(
    db: SqliteDatabase,
    notifiers: &ShopNotifiers,
    config: &ServerConfig,
) -> ShopSettlementApi {
    let renderer = config.invoice_seller.as_ref().map(PlainTextInvoice::new).unwrap_or_default();
    let api = SettlementApi::new(db, renderer, notifiers.customer.clone(), config.engine);
    match &notifiers.operator {
        Some((notifier, recipient)) => api.with_operator_notifier(notifier.clone(), recipient.clone()),
        None => api,
    }
}

/// Wires the shop's side effects to engine events.
///
/// 1. OrderCreatedEvent - The customer gets an order confirmation with payment instructions, and the shop owner gets a
///    copy if `CPG_ORDER_NOTIFY_EMAIL` is set. Both are best-effort.
/// 2. OrderPaidEvent - The settlement hook runs: sold product records, the invoice e-mail and the operator ping. The
///    event is only published for the call that moved the order to `paid`, and every settlement step is idempotent.
///
/// The settlement API is shared with the admin retry route.
pub fn create_settlement_event_handlers(
    settlement: Arc<ShopSettlementApi>,
    notifiers: ShopNotifiers,
) -> EventHandlers {
    let mut hooks = EventHooks::default();
    // --- On OrderPaid Handler ---
    hooks.on_order_paid(move |ev| {
        let settlement = Arc::clone(&settlement);
        let order_id = ev.order.id;
        Box::pin(async move {
            match settlement.on_order_paid(order_id).await {
                Ok(result) => info!(
                    "🧾️ Order #{order_id} settled. Sold records: {}. Invoice sent: {}. Operator notified: {}",
                    result.sold_records_created, result.invoice_emailed, result.operator_notified
                ),
                Err(e) => error!("🧾️ Settlement of order #{order_id} failed. {e}"),
            }
        })
    });
    // --- On OrderCreated Handler ---
    let notifiers = Arc::new(notifiers);
    hooks.on_order_created(move |ev| {
        let notifiers = Arc::clone(&notifiers);
        Box::pin(async move {
            let confirmation = order_confirmation(&ev.order, &ev.items, notifiers.merchant_iban.as_deref());
            let owner_copy = notifiers.order_notify_email.as_ref().map(|email| {
                OutboundMessage::new(email.clone(), format!("New order #{}", ev.order.id), confirmation.body.clone())
            });
            if let Err(e) = notifiers.customer.send(confirmation).await {
                let (id, email) = (ev.order.id, &ev.order.customer_email);
                warn!("📬️ Could not send the confirmation for order #{id} to {email}. {e}");
            }
            if let Some(copy) = owner_copy {
                if let Err(e) = notifiers.customer.send(copy).await {
                    warn!("📬️ Could not send the owner's copy of order #{}. {e}", ev.order.id);
                }
            }
        })
    });
    EventHandlers::new(SETTLEMENT_EVENT_BUFFER_SIZE, hooks)
}

/// The message a customer receives right after checkout.
pub fn order_confirmation(order: &Order, items: &[OrderItem], iban: Option<&str>) -> OutboundMessage {
    let mut body = format!("Dear {},\n\nthank you for your order #{}.\n\n", order.customer_name, order.id);
    for item in items {
        let line_total = item.line_total();
        body.push_str(&format!("  {} x {} @ {} = {line_total}\n", item.quantity, item.product_name, item.unit_price));
    }
    if let Some(total) = order.total_czk {
        body.push_str(&format!("\nTotal including shipping: {total}\n"));
    }
    match (iban, &order.vs) {
        (Some(iban), Some(vs)) => {
            body.push_str(&format!("\nPlease transfer the total to {iban} with variable symbol {vs}.\n"));
        },
        (None, Some(vs)) => body.push_str(&format!("\nPlease use variable symbol {vs} when paying.\n")),
        _ => {},
    }
    OutboundMessage::new(order.customer_email.clone(), format!("Order #{} received", order.id), body)
}
