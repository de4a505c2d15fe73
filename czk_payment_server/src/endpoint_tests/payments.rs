use actix_web::{http::StatusCode, test, web, web::ServiceConfig, App};
use chrono::{TimeZone, Utc};
use cpg_common::Czk;
use czk_payment_engine::{
    db_types::{
        Customer,
        NewOrder,
        NewOrderItem,
        NewProduct,
        OrderStatusType,
        PaymentStatus,
        UnmatchedPayment,
        UnmatchedReason,
    },
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    EngineConfig,
    InventoryManagement,
    OrderFlowApi,
    OrderManagement,
    OrderQueryApi,
    PaymentGatewayDatabase,
    ReconciliationApi,
    SqliteDatabase,
};
use serde_json::{json, Value};

use super::helpers::get_request;
use crate::{
    config::QrConfig,
    data_objects::MarkPaidRequest,
    endpoint_tests::mocks::MockOrderManager,
    routes::{payment_qr, payment_qr_payload, MarkPaidRoute, SearchPaymentsRoute, UnmatchedPaymentsRoute},
};

const IBAN: &str = "CZ65 0800 0000 1920 0014 5399";

#[actix_web::test]
async fn qr_payload() {
    let _ = env_logger::try_init().ok();
    let path = "/payments/qr/payload?vs=2024000017&amount=339&msg=Order%2017";
    let (status, body) = get_request(path, configure_qr).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "SPD*1.0*ACC:CZ6508000000192000145399*AM:339.00*CC:CZK*X-VS:2024000017*MSG:Order 17");
}

#[actix_web::test]
async fn qr_code_is_an_svg() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/payments/qr?amount=189.50", configure_qr).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<svg"));
}

#[actix_web::test]
async fn qr_needs_a_merchant_account() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/payments/qr/payload?amount=100", configure_qr_without_iban).await.unwrap();
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("No merchant IBAN is configured"));
}

#[actix_web::test]
async fn qr_rejects_negative_amounts() {
    let _ = env_logger::try_init().ok();
    let (status, _) = get_request("/payments/qr/payload?amount=-5", configure_qr).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn search_payments_passes_the_filter_on() {
    let _ = env_logger::try_init().ok();
    let path = "/payments?vs=2024000017&status=received&limit=5";
    let (status, body) = get_request(path, configure_search).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");

    let (status, _) = get_request("/payments?status=lost", configure_search).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unmatched_payments_are_listed() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/payments/unmatched?limit=10000", configure_search).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let unmatched: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(unmatched[0]["vs"], "2024000017");
    assert_eq!(unmatched[0]["paid"], "300.00");
    assert_eq!(unmatched[0]["expected"], "339.00");
    assert_eq!(unmatched[0]["reason"], "amount_mismatch");
}

#[actix_web::test]
async fn mark_paid_settles_the_order_once() {
    let db = prepare_test_env(&random_db_path()).await;
    let product = db.insert_product(NewProduct::new("Náramek", Czk::from_crowns(125), 3)).await.unwrap();
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
    let customer = Customer::new("Jana Nováková", "jana@example.cz", "Dlouhá 1, Praha");
    let order = NewOrder::new(customer, vec![NewOrderItem::new(product.id, 2, Czk::from_crowns(125))]);
    let created = flow.create_order(order).await.unwrap();
    let vs = created.order.vs.clone().unwrap();

    let api = ReconciliationApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
    let app = App::new().app_data(web::Data::new(api)).service(MarkPaidRoute::<SqliteDatabase>::new());
    let service = test::init_service(app).await;
    let request = MarkPaidRequest { vs: vs.clone(), amount: None, reference: Some("statement 05/2024".into()) };

    let req = test::TestRequest::post().uri("/payments/mark-paid").set_json(&request).to_request();
    let result: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(result["order_id"], created.order.id);
    assert_eq!(result["payment_created"], false);
    assert_eq!(result["status_changed"], true);

    let req = test::TestRequest::post().uri("/payments/mark-paid").set_json(&request).to_request();
    let result: Value = test::call_and_read_body_json(&service, req).await;
    assert_eq!(result["status_changed"], false);

    let order = db.fetch_order(created.order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    let payment = db.fetch_latest_payment(&vs).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Received);

    let req = test::TestRequest::post().uri("/payments/mark-paid").set_json(json!({ "vs": "12ab" })).to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let mut db = db;
    db.close().await.unwrap();
}

fn configure_qr(cfg: &mut ServiceConfig) {
    cfg.service(payment_qr_payload).service(payment_qr).app_data(web::Data::new(QrConfig::new(IBAN)));
}

fn configure_qr_without_iban(cfg: &mut ServiceConfig) {
    cfg.service(payment_qr_payload).app_data(web::Data::new(QrConfig::default()));
}

fn configure_search(cfg: &mut ServiceConfig) {
    let mut order_manager = MockOrderManager::new();
    order_manager
        .expect_search_payments()
        .withf(|q| {
            q.vs.as_ref().map(|v| v.as_str()) == Some("2024000017") &&
                q.status == Some(PaymentStatus::Received) &&
                q.limit == Some(5)
        })
        .returning(|_| Ok(vec![]));
    order_manager.expect_fetch_unmatched_payments().withf(|limit| *limit == 500).returning(|_| Ok(unmatched()));
    let api = OrderQueryApi::new(order_manager);
    cfg.service(UnmatchedPaymentsRoute::<MockOrderManager>::new())
        .service(SearchPaymentsRoute::<MockOrderManager>::new())
        .app_data(web::Data::new(api));
}

fn unmatched() -> Vec<UnmatchedPayment> {
    vec![UnmatchedPayment {
        id: 1,
        vs: "2024000017".parse().unwrap(),
        paid: Czk::from_crowns(300),
        expected: Some(Czk::from_crowns(339)),
        order_id: Some(17),
        reason: UnmatchedReason::AmountMismatch,
        created_at: Utc.with_ymd_and_hms(2024, 5, 3, 7, 0, 0).unwrap(),
    }]
}
