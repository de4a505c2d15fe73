use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use cpg_common::Czk;
use czk_payment_engine::{
    db_types::{Order, OrderItem, OrderStatusType, Payment, PaymentStatus},
    OrderQueryApi,
};
use serde_json::Value;

use super::helpers::get_request;
use crate::{
    endpoint_tests::mocks::MockOrderManager,
    routes::{OrderByIdRoute, OrderByVsRoute, PaymentStatusRoute},
};

#[actix_web::test]
async fn fetch_order_by_id() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/17", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["id"], 17);
    assert_eq!(order["vs"], "2024000017");
    assert_eq!(order["status"], "awaiting_payment");
    assert_eq!(order["total_czk"], "339.00");
    assert_eq!(order["items"][0]["product_name"], "Náramek");
    assert_eq!(order["items"][0]["quantity"], 2);
}

#[actix_web::test]
async fn fetch_missing_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/18", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Order #18"));
}

#[actix_web::test]
async fn fetch_order_with_a_bad_id() {
    let _ = env_logger::try_init().ok();
    let (status, _) = get_request("/orders/seventeen", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn fetch_order_by_vs() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/by-vs/2024000017", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["id"], 17);

    let (status, _) = get_request("/orders/by-vs/2024000099", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn malformed_variable_symbols_are_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/by-vs/12ab", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("error"));
    let (status, _) = get_request("/payments/status/12345678901", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn payment_status_for_a_paid_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/payments/status/2024000017", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let view: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(view["vs"], "2024000017");
    assert_eq!(view["payment"]["status"], "received");
    assert_eq!(view["payment"]["amount_czk"], "339.00");
    assert_eq!(view["order"]["id"], 17);
}

#[actix_web::test]
async fn payment_status_for_an_unknown_symbol() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/payments/status/2024000099", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let view: Value = serde_json::from_str(&body).unwrap();
    assert!(view["payment"].is_null());
    assert!(view["order"].is_null());
}

fn configure(cfg: &mut ServiceConfig) {
    let mut order_manager = MockOrderManager::new();
    order_manager.expect_fetch_order().returning(|id| Ok((id == 17).then(order)));
    order_manager.expect_fetch_order_by_vs().returning(|vs| Ok((vs.as_str() == "2024000017").then(order)));
    order_manager.expect_fetch_order_items().returning(|_| Ok(order_items()));
    order_manager
        .expect_fetch_latest_payment()
        .returning(|vs| Ok((vs.as_str() == "2024000017").then(payment)));
    let api = OrderQueryApi::new(order_manager);
    cfg.service(OrderByVsRoute::<MockOrderManager>::new())
        .service(OrderByIdRoute::<MockOrderManager>::new())
        .service(PaymentStatusRoute::<MockOrderManager>::new())
        .app_data(web::Data::new(api));
}

fn order() -> Order {
    Order {
        id: 17,
        vs: Some("2024000017".parse().unwrap()),
        customer_name: "Jana Nováková".into(),
        customer_email: "jana@example.cz".into(),
        customer_phone: None,
        customer_address: "Dlouhá 1, Praha".into(),
        note: None,
        total_czk: Some(Czk::from_crowns(339)),
        status: OrderStatusType::AwaitingPayment,
        invoice_sent_at: None,
        created_at: Utc.with_ymd_and_hms(2024, 5, 2, 9, 15, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 2, 9, 15, 0).unwrap(),
    }
}

fn order_items() -> Vec<OrderItem> {
    vec![OrderItem {
        id: 1,
        order_id: 17,
        product_id: 3,
        product_name: "Náramek".into(),
        quantity: 2,
        unit_price: Czk::from_halere(12_500),
    }]
}

fn payment() -> Payment {
    Payment {
        id: 4,
        vs: "2024000017".parse().unwrap(),
        amount_czk: Czk::from_crowns(339),
        status: PaymentStatus::Received,
        reference: Some("csob".into()),
        received_at: Some(Utc.with_ymd_and_hms(2024, 5, 3, 7, 0, 0).unwrap()),
        created_at: Utc.with_ymd_and_hms(2024, 5, 2, 9, 15, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 3, 7, 0, 0).unwrap(),
    }
}
