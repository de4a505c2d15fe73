use actix_web::{http::StatusCode, web, web::ServiceConfig};
use cpg_common::Czk;
use czk_payment_engine::{db_types::Product, InventoryApi, PaymentGatewayError};
use serde_json::{json, Value};

use super::helpers::{get_request, post_request};
use crate::{
    endpoint_tests::mocks::MockInventoryManager,
    routes::{AddProductRoute, ProductByIdRoute, SetStockRoute},
};

#[actix_web::test]
async fn fetch_product() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/products/3", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let product: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(product["name"], "Náramek");
    assert_eq!(product["price"], "125.00");
    assert_eq!(product["stock"], 4);

    let (status, _) = get_request("/products/4", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn add_product() {
    let _ = env_logger::try_init().ok();
    let new_product = json!({ "name": "Prsten", "price": "450.00", "stock": 2 });
    let (status, body) = post_request("/products", &new_product, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::CREATED);
    let product: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(product["id"], 9);
    assert_eq!(product["name"], "Prsten");
    assert_eq!(product["price"], "450.00");
}

#[actix_web::test]
async fn negative_stock_is_rejected() {
    let _ = env_logger::try_init().ok();
    let new_product = json!({ "name": "Prsten", "price": "450.00", "stock": -1 });
    let (status, body) = post_request("/products", &new_product, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Stock cannot be negative"));

    let (status, _) = post_request("/products/3/stock", &json!({ "stock": -5 }), configure).await.expect("Failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn set_stock_level() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/products/3/stock", &json!({ "stock": 12 }), configure).await.expect("Failed");
    assert_eq!(status, StatusCode::OK);
    let product: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(product["stock"], 12);

    let (status, _) = post_request("/products/4/stock", &json!({ "stock": 1 }), configure).await.expect("Failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn configure(cfg: &mut ServiceConfig) {
    let mut inventory = MockInventoryManager::new();
    inventory.expect_fetch_product().returning(|id| Ok((id == 3).then(|| product(4))));
    inventory
        .expect_insert_product()
        .returning(|p| Ok(Product { id: 9, name: p.name, price: p.price, stock: p.stock }));
    inventory.expect_set_stock().returning(|id, stock| match id {
        3 => Ok(product(stock)),
        id => Err(PaymentGatewayError::ProductNotFound(id)),
    });
    inventory.expect_decrement_stock().never();
    let api = InventoryApi::new(inventory);
    cfg.service(ProductByIdRoute::<MockInventoryManager>::new())
        .service(AddProductRoute::<MockInventoryManager>::new())
        .service(SetStockRoute::<MockInventoryManager>::new())
        .app_data(web::Data::new(api));
}

fn product(stock: i64) -> Product {
    Product { id: 3, name: "Náramek".into(), price: Czk::from_crowns(125), stock }
}
