use actix_web::{http::StatusCode, test, web, web::ServiceConfig, App};
use cpg_common::Czk;
use czk_payment_engine::{
    db_types::{Customer, NewOrder, NewOrderItem, NewProduct, Order},
    events::EventProducers,
    integrations::{LogNotifier, PlainTextInvoice},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    EngineConfig,
    InventoryManagement,
    OrderFlowApi,
    OrderQueryApi,
    PaymentGatewayDatabase,
    ReconciliationApi,
    SettlementApi,
    SqliteDatabase,
};
use serde_json::Value;

use super::helpers::get_request;
use crate::{
    endpoint_tests::mocks::MockSettlementStore,
    routes::{SettleOrderRoute, SoldProductsRoute},
};

async fn place_order(db: &SqliteDatabase, product_id: i64) -> Order {
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
    let customer = Customer::new("Jana Nováková", "jana@example.cz", "Dlouhá 1, Praha");
    let order = NewOrder::new(customer, vec![NewOrderItem::new(product_id, 2, Czk::from_crowns(125))]);
    flow.create_order(order).await.unwrap().order
}

#[actix_web::test]
async fn settlement_can_be_retried_for_paid_orders() {
    let _ = env_logger::try_init().ok();
    let db = prepare_test_env(&random_db_path()).await;
    let product = db.insert_product(NewProduct::new("Náramek", Czk::from_crowns(125), 5)).await.unwrap();
    let paid = place_order(&db, product.id).await;
    let unpaid = place_order(&db, product.id).await;
    // Paid without any event handlers, as if the settlement hook had never run
    let reconciliation = ReconciliationApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
    let vs = paid.vs.clone().unwrap();
    assert!(reconciliation.confirm_payment_manually(&vs, None, None).await.unwrap().status_changed);

    let settlement = SettlementApi::new(db.clone(), PlainTextInvoice::default(), LogNotifier, EngineConfig::default());
    let app = App::new()
        .app_data(web::Data::new(settlement))
        .app_data(web::Data::new(OrderQueryApi::new(db.clone())))
        .service(SettleOrderRoute::<SqliteDatabase, PlainTextInvoice, LogNotifier>::new())
        .service(SoldProductsRoute::<SqliteDatabase>::new());
    let service = test::init_service(app).await;

    let req = test::TestRequest::get().uri(&format!("/orders/{}/sold", paid.id)).to_request();
    let sold: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(sold, serde_json::json!([]));

    let req = test::TestRequest::post().uri(&format!("/orders/{}/settle", paid.id)).to_request();
    let result: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(result["sold_records_created"], 1);
    assert_eq!(result["invoice_emailed"], true);
    assert_eq!(result["operator_notified"], false);

    let req = test::TestRequest::post().uri(&format!("/orders/{}/settle", paid.id)).to_request();
    let result: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(result["sold_records_created"], 0);
    assert_eq!(result["invoice_emailed"], false);

    let req = test::TestRequest::get().uri(&format!("/orders/{}/sold", paid.id)).to_request();
    let sold: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(sold.as_array().map(Vec::len), Some(1));
    assert_eq!(sold[0]["quantity"], 2);
    assert_eq!(sold[0]["buyer_email"], "jana@example.cz");
    assert_eq!(sold[0]["vs"], vs.as_str());

    let req = test::TestRequest::post().uri(&format!("/orders/{}/settle", unpaid.id)).to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let req = test::TestRequest::post().uri("/orders/9999/settle").to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri(&format!("/orders/{}/sold", unpaid.id)).to_request();
    let sold: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(sold, serde_json::json!([]));
    let mut db = db;
    db.close().await.unwrap();
}

#[actix_web::test]
async fn sold_products_of_unknown_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/42/sold", configure_unknown_order).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("#42"));
}

fn configure_unknown_order(cfg: &mut ServiceConfig) {
    let mut store = MockSettlementStore::new();
    store.expect_fetch_order().withf(|id| *id == 42).returning(|_| Ok(None));
    store.expect_fetch_sold_products().never();
    let api = OrderQueryApi::new(store);
    cfg.service(SoldProductsRoute::<MockSettlementStore>::new()).app_data(web::Data::new(api));
}
