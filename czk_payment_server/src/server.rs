use std::{path::Path, sync::Arc, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use czk_payment_engine::{
    events::EventProducers,
    helpers::BankNotificationParser,
    integrations::{BankNotificationIngester, NotifierChannel, PlainTextInvoice, SpoolMailbox},
    InventoryApi,
    OrderFlowApi,
    OrderQueryApi,
    ReconciliationApi,
    SqliteDatabase,
};
use futures::{future::ok, FutureExt};
use log::*;

use crate::{
    bank_sync_worker::start_bank_sync_worker,
    config::{BankConfig, ProxyConfig, QrConfig, ServerConfig},
    errors::ServerError,
    helpers::{get_remote_ip, is_whitelisted},
    integrations::settlement::{
        build_settlement_api,
        create_settlement_event_handlers,
        ShopNotifiers,
        ShopSettlementApi,
    },
    routes::{
        health,
        payment_qr,
        payment_qr_payload,
        AddProductRoute,
        CreateOrderRoute,
        MarkPaidRoute,
        OrderByIdRoute,
        OrderByVsRoute,
        PaymentStatusRoute,
        ProductByIdRoute,
        SearchPaymentsRoute,
        SetStockRoute,
        SettleOrderRoute,
        SoldProductsRoute,
        SyncBankRoute,
        SyncFromOrdersRoute,
        UnmatchedPaymentsRoute,
        UpdatePaymentStatusRoute,
    },
};

const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    ensure_database_dir(&config.database_url)?;
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    info!("🗃️ Database is ready at {}", config.database_url);

    let notifiers = ShopNotifiers::from_config(&config);
    let settlement = Arc::new(build_settlement_api(db.clone(), &notifiers, &config));
    let handlers = create_settlement_event_handlers(Arc::clone(&settlement), notifiers);
    let producers = handlers.producers();
    handlers.start_handlers();

    let ingester = create_bank_ingester(&config.bank)?;
    match config.bank.poll_interval {
        Some(interval) => {
            let api = ReconciliationApi::new(db.clone(), producers.clone(), config.engine);
            let _worker = start_bank_sync_worker(api, ingester.clone(), interval);
        },
        None => info!("🕰️ The bank mailbox worker is disabled"),
    }

    let srv = create_server_instance(config, db, producers, ingester, settlement)?;
    srv.await.map_err(|e| ServerError::BackendError(e.to_string()))
}

pub fn create_bank_ingester(config: &BankConfig) -> Result<BankNotificationIngester<SpoolMailbox>, ServerError> {
    let parser = BankNotificationParser::new(&config.senders)
        .map_err(|e| ServerError::InitializeError(format!("Could not build the bank notification parser. {e}")))?;
    let mailbox = SpoolMailbox::new(&config.spool_dir);
    Ok(BankNotificationIngester::new(mailbox, parser).with_batch_size(config.batch_size))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    ingester: BankNotificationIngester<SpoolMailbox>,
    settlement: Arc<ShopSettlementApi>,
) -> Result<Server, ServerError> {
    let proxy = ProxyConfig::from_config(&config);
    let qr_config = QrConfig::from_config(&config);
    let engine = config.engine;
    let admin_whitelist = config.admin_whitelist.clone();
    let ingester = web::Data::new(ingester);
    let settlement = web::Data::from(settlement);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone(), engine);
        let query_api = OrderQueryApi::new(db.clone());
        let reconciliation_api = ReconciliationApi::new(db.clone(), producers.clone(), engine);
        let inventory_api = InventoryApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpg::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(query_api))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(inventory_api))
            .app_data(web::Data::new(qr_config.clone()))
            .app_data(ingester.clone())
            .app_data(settlement.clone());
        // Routes used by the storefront and by customers
        let api_scope = web::scope("/api")
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(OrderByVsRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(PaymentStatusRoute::<SqliteDatabase>::new())
            .service(payment_qr_payload)
            .service(payment_qr)
            .service(ProductByIdRoute::<SqliteDatabase>::new());
        let whitelist = admin_whitelist.clone();
        let admin_scope = web::scope("/admin")
            .wrap_fn(move |req, srv| {
                // The peer address comes from the proxy headers only when they are trusted in the configuration.
                let peer_ip = get_remote_ip(req.request(), proxy.use_x_forwarded_for, proxy.use_forwarded);
                if is_whitelisted(peer_ip, whitelist.as_deref()) {
                    srv.call(req)
                } else {
                    let peer = peer_ip.map(|ip| ip.to_string()).unwrap_or_else(|| "an unknown peer".into());
                    warn!("💻️ Denied admin request to {} from {peer}", req.path());
                    ok(req.error_response(ServerError::Forbidden(format!("{peer} is not on the admin whitelist"))))
                        .boxed_local()
                }
            })
            .service(AddProductRoute::<SqliteDatabase>::new())
            .service(SetStockRoute::<SqliteDatabase>::new())
            .service(MarkPaidRoute::<SqliteDatabase>::new())
            .service(SyncBankRoute::<SqliteDatabase, SpoolMailbox>::new())
            .service(SyncFromOrdersRoute::<SqliteDatabase>::new())
            .service(UnmatchedPaymentsRoute::<SqliteDatabase>::new())
            .service(UpdatePaymentStatusRoute::<SqliteDatabase>::new())
            .service(SearchPaymentsRoute::<SqliteDatabase>::new())
            .service(SettleOrderRoute::<SqliteDatabase, PlainTextInvoice, NotifierChannel>::new())
            .service(SoldProductsRoute::<SqliteDatabase>::new());
        app.service(health).service(api_scope).service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("💻️ Listening on {}:{}", config.host, config.port);
    Ok(srv)
}

/// SQLite creates a missing database file, but not the directory it lives in.
fn ensure_database_dir(url: &str) -> Result<(), ServerError> {
    let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            info!("🗃️ Creating database directory {}", dir.display());
            std::fs::create_dir_all(dir)
                .map_err(|e| ServerError::InitializeError(format!("Could not create {}. {e}", dir.display())))
        },
        _ => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn database_dir_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let db_file = tmp.path().join("nested").join("store.db");
        let url = format!("sqlite://{}?mode=rwc", db_file.display());
        ensure_database_dir(&url).unwrap();
        assert!(tmp.path().join("nested").is_dir());
        ensure_database_dir("sqlite::memory:").unwrap();
    }

    #[test]
    fn empty_sender_list_still_builds_an_ingester() {
        let config = BankConfig { senders: vec![], ..BankConfig::default() };
        let ingester = create_bank_ingester(&config).unwrap();
        assert_eq!(ingester.batch_size(), config.batch_size);
    }
}
