use std::collections::HashMap;

use cucumber::World;
use czk_payment_engine::{
    cpe_api::order_objects::ConfirmationOutcome,
    db_types::Product,
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::OrderCreated,
    EngineConfig,
    OrderFlowApi,
    PaymentGatewayError,
    ReconciliationApi,
    SqliteDatabase,
};
use log::*;

#[derive(Default, Debug, World)]
pub struct ShopWorld {
    pub system: Option<ShopSystem>,
}

#[derive(Debug)]
pub struct ShopSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub flow: OrderFlowApi<SqliteDatabase>,
    pub reconciliation: ReconciliationApi<SqliteDatabase>,
    pub products: HashMap<String, Product>,
    pub last_order: Option<OrderCreated>,
    pub last_error: Option<PaymentGatewayError>,
    pub last_outcome: Option<ConfirmationOutcome>,
}

impl ShopWorld {
    pub fn system(&mut self) -> &mut ShopSystem {
        self.system.as_mut().expect("The shop has not been set up")
    }
}

impl ShopSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        debug!("🚀️ Created database: {url}");
        let flow = OrderFlowApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
        let reconciliation = ReconciliationApi::new(db.clone(), EventProducers::default(), EngineConfig::default());
        Self {
            db_path: url,
            db,
            flow,
            reconciliation,
            products: HashMap::new(),
            last_order: None,
            last_error: None,
            last_outcome: None,
        }
    }

    pub fn product(&self, name: &str) -> &Product {
        self.products.get(name).unwrap_or_else(|| panic!("Unknown product {name}"))
    }

    pub fn last_order(&self) -> &OrderCreated {
        self.last_order.as_ref().expect("No order has been placed")
    }
}
