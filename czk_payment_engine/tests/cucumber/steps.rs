use cucumber::{given, then, when};
use czk_payment_engine::{
    db_types::{Customer, Czk, NewOrder, NewOrderItem, NewProduct, OrderStatusType, PaymentStatus, Vs},
    InventoryManagement,
    OrderManagement,
    PaymentGatewayError,
};

use crate::cucumber::{shop_world::ShopSystem, ShopWorld};

fn czk(amount: &str) -> Czk {
    amount.parse().unwrap_or_else(|e| panic!("{e}"))
}

#[given("a fresh shop")]
async fn fresh_shop(world: &mut ShopWorld) {
    world.system = Some(ShopSystem::new().await);
}

#[given(expr = "product {string} priced {string} with {int} units in stock")]
async fn add_product(world: &mut ShopWorld, name: String, price: String, stock: i64) {
    let sys = world.system();
    let product = sys.db.insert_product(NewProduct::new(name.as_str(), czk(&price), stock)).await.unwrap();
    sys.products.insert(name, product);
}

// "2 x Náramek, 1 x Přívěsek"
#[when(expr = "the customer orders {string}")]
async fn place_order(world: &mut ShopWorld, lines: String) {
    let sys = world.system();
    let mut items = Vec::new();
    for line in lines.split(',') {
        let (qty, name) = line.split_once(" x ").unwrap_or_else(|| panic!("Malformed order line: {line}"));
        let product = sys.product(name.trim());
        let qty = qty.trim().parse::<i64>().expect("Quantity must be a number");
        items.push(NewOrderItem::new(product.id, qty, product.price));
    }
    let customer = Customer::new("Jana Nováková", "jana@example.cz", "Dlouhá 1, 110 00 Praha");
    match sys.flow.create_order(NewOrder::new(customer, items)).await {
        Ok(created) => {
            sys.last_order = Some(created);
            sys.last_error = None;
        },
        Err(e) => sys.last_error = Some(e),
    }
}

#[when(expr = "the bank confirms {string} for the order")]
async fn bank_confirms_order(world: &mut ShopWorld, amount: String) {
    let sys = world.system();
    let vs = sys.last_order().order.vs.clone().expect("The order has no variable symbol");
    let outcome = sys.reconciliation.apply_bank_confirmation(&vs, czk(&amount)).await.unwrap();
    sys.last_outcome = Some(outcome);
}

#[when(expr = "the bank confirms {string} for variable symbol {string}")]
async fn bank_confirms_vs(world: &mut ShopWorld, amount: String, vs: String) {
    let sys = world.system();
    let vs = vs.parse::<Vs>().unwrap();
    let outcome = sys.reconciliation.apply_bank_confirmation(&vs, czk(&amount)).await.unwrap();
    sys.last_outcome = Some(outcome);
}

#[then(expr = "the order total is {string}")]
async fn order_total(world: &mut ShopWorld, total: String) {
    let order = &world.system().last_order().order;
    assert_eq!(order.total_czk, Some(czk(&total)));
}

#[then(expr = "the order is {word}")]
async fn order_status(world: &mut ShopWorld, status: String) {
    let sys = world.system();
    let id = sys.last_order().order.id;
    let order = sys.db.fetch_order(id).await.unwrap().expect("Order should exist");
    assert_eq!(order.status, status.parse::<OrderStatusType>().unwrap());
}

#[then(expr = "the payment is {word} with amount {string}")]
async fn payment_status(world: &mut ShopWorld, status: String, amount: String) {
    let sys = world.system();
    let vs = sys.last_order().order.vs.clone().unwrap();
    let payment = sys.db.fetch_latest_payment(&vs).await.unwrap().expect("Payment should exist");
    assert_eq!(payment.status, status.parse::<PaymentStatus>().unwrap());
    assert_eq!(payment.amount_czk, czk(&amount));
}

#[then(expr = "product {string} has {int} units in stock")]
async fn stock_level(world: &mut ShopWorld, name: String, stock: i64) {
    let sys = world.system();
    let id = sys.product(&name).id;
    let product = sys.db.fetch_product(id).await.unwrap().expect("Product should exist");
    assert_eq!(product.stock, stock);
}

#[then(expr = "the order is rejected because {string} is out of stock")]
async fn out_of_stock(world: &mut ShopWorld, name: String) {
    let sys = world.system();
    let id = sys.product(&name).id;
    match &sys.last_error {
        Some(PaymentGatewayError::InsufficientStock { product_id, .. }) => assert_eq!(*product_id, id),
        other => panic!("Expected an out of stock error. Got {other:?}"),
    }
}

#[then("the confirmation matches the order")]
async fn confirmation_matched(world: &mut ShopWorld) {
    let outcome = world.system().last_outcome.clone().expect("No confirmation was applied");
    assert!(outcome.order_matched);
}

#[then("the confirmation did not change the order")]
async fn confirmation_no_change(world: &mut ShopWorld) {
    let outcome = world.system().last_outcome.clone().expect("No confirmation was applied");
    assert!(!outcome.status_changed);
}

#[then(expr = "the confirmation is unmatched because of {word}")]
async fn confirmation_unmatched(world: &mut ShopWorld, reason: String) {
    let outcome = world.system().last_outcome.clone().expect("No confirmation was applied");
    assert!(!outcome.order_matched);
    assert_eq!(outcome.unmatched_reason.map(|r| r.to_string()), Some(reason));
}
