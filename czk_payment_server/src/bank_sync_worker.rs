use std::time::Duration;

use czk_payment_engine::{
    cpe_api::order_objects::ReconciliationSummary,
    integrations::{BankNotificationIngester, SpoolMailbox},
    ReconciliationApi,
    SqliteDatabase,
};
use log::*;
use tokio::task::JoinHandle;

/// Starts the bank mailbox worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, the worker polls the mailbox once and reconciles what it found. A failed poll is logged and
/// retried on the next tick. Since messages are only marked as seen after they have been parsed, nothing is lost.
pub fn start_bank_sync_worker(
    api: ReconciliationApi<SqliteDatabase>,
    ingester: BankNotificationIngester<SpoolMailbox>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let dir = ingester.mailbox().dir().display().to_string();
        info!("🕰️ Bank mailbox worker started. Polling {dir} every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running bank mailbox sync job");
            match api.sync_mailbox(&ingester).await {
                Ok(summary) => log_summary(&summary),
                Err(e) => error!("🕰️ Error running bank mailbox sync job: {e}"),
            }
        }
    })
}

fn log_summary(summary: &ReconciliationSummary) {
    if summary.checked == 0 {
        trace!("🕰️ No new bank notifications");
        return;
    }
    info!(
        "🕰️ {} bank confirmation(s) checked. {} order(s) paid, {} unmatched, {} failed",
        summary.checked,
        summary.orders_paid(),
        summary.unmatched.len(),
        summary.failed.len()
    );
    for outcome in &summary.unmatched {
        debug!(
            "🕰️ Unmatched: VS {} paid {} (expected {}). Reason: {}",
            outcome.vs,
            outcome.paid,
            outcome.expected.map(|e| e.to_string()).unwrap_or_else(|| "-".into()),
            outcome.unmatched_reason.map(|r| r.to_string()).unwrap_or_default()
        );
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use cpg_common::Czk;
    use czk_payment_engine::{
        db_types::{Customer, NewOrder, NewOrderItem, NewProduct, OrderStatusType},
        events::EventProducers,
        helpers::BankNotificationParser,
        integrations::BankMessage,
        test_utils::prepare_env::{prepare_test_env, random_db_path},
        EngineConfig,
        InventoryManagement,
        OrderFlowApi,
        OrderManagement,
        PaymentGatewayDatabase,
    };

    use super::*;

    #[tokio::test]
    async fn worker_reconciles_spooled_notifications() {
        let db = prepare_test_env(&random_db_path()).await;
        let product = db.insert_product(NewProduct::new("Náramek", Czk::from_crowns(100), 5)).await.unwrap();
        let flow = OrderFlowApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
        let customer = Customer::new("Jana Nováková", "jana@example.cz", "Dlouhá 1, Praha");
        let order = NewOrder::new(customer, vec![NewOrderItem::new(product.id, 1, Czk::from_crowns(100))]);
        let created = flow.create_order(order).await.unwrap();
        let vs = created.order.vs.clone().unwrap();

        let spool = tempfile::tempdir().unwrap();
        let message = BankMessage::new("", "noreply@csob.cz").with_text(format!("VS: {vs}\nČástka: 189,00 CZK"));
        std::fs::write(spool.path().join("0001.json"), serde_json::to_vec(&message).unwrap()).unwrap();

        let parser = BankNotificationParser::with_default_senders().unwrap();
        let ingester = BankNotificationIngester::new(SpoolMailbox::new(spool.path()), parser);
        let api = ReconciliationApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
        let worker = start_bank_sync_worker(api, ingester, Duration::from_millis(50));

        let mut status = OrderStatusType::AwaitingPayment;
        for _ in 0..50 {
            status = db.fetch_order(created.order.id).await.unwrap().unwrap().status;
            if status == OrderStatusType::Paid {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        worker.abort();
        assert_eq!(status, OrderStatusType::Paid);
        assert!(spool.path().join("seen").join("0001.json").exists());
        let mut db = db;
        db.close().await.unwrap();
    }
}
