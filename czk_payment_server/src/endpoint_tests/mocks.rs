use chrono::{DateTime, Utc};
use czk_payment_engine::{
    db_types::{NewProduct, Order, OrderItem, Payment, Product, SoldProduct, UnmatchedPayment, Vs},
    traits::PaymentQueryFilter,
    InventoryManagement,
    OrderManagement,
    PaymentGatewayError,
    SettlementManagement,
};
use mockall::mock;

mock! {
    pub OrderManager {}
    impl OrderManagement for OrderManager {
        async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_order_by_vs(&self, vs: &Vs) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, PaymentGatewayError>;
        async fn fetch_latest_payment(&self, vs: &Vs) -> Result<Option<Payment>, PaymentGatewayError>;
        async fn fetch_payments_for_vs(&self, vs: &Vs) -> Result<Vec<Payment>, PaymentGatewayError>;
        async fn search_payments(&self, query: PaymentQueryFilter) -> Result<Vec<Payment>, PaymentGatewayError>;
        async fn fetch_unmatched_payments(&self, limit: i64) -> Result<Vec<UnmatchedPayment>, PaymentGatewayError>;
    }
}

mock! {
    pub InventoryManager {}
    impl InventoryManagement for InventoryManager {
        async fn insert_product(&self, product: NewProduct) -> Result<Product, PaymentGatewayError>;
        async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, PaymentGatewayError>;
        async fn set_stock(&self, product_id: i64, stock: i64) -> Result<Product, PaymentGatewayError>;
        async fn decrement_stock(&self, product_id: i64, quantity: i64) -> Result<i64, PaymentGatewayError>;
    }
}

mock! {
    pub SettlementStore {}
    impl OrderManagement for SettlementStore {
        async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_order_by_vs(&self, vs: &Vs) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, PaymentGatewayError>;
        async fn fetch_latest_payment(&self, vs: &Vs) -> Result<Option<Payment>, PaymentGatewayError>;
        async fn fetch_payments_for_vs(&self, vs: &Vs) -> Result<Vec<Payment>, PaymentGatewayError>;
        async fn search_payments(&self, query: PaymentQueryFilter) -> Result<Vec<Payment>, PaymentGatewayError>;
        async fn fetch_unmatched_payments(&self, limit: i64) -> Result<Vec<UnmatchedPayment>, PaymentGatewayError>;
    }
    impl SettlementManagement for SettlementStore {
        async fn materialize_sold_products(&self, order_id: i64) -> Result<u64, PaymentGatewayError>;
        async fn fetch_sold_products(&self, order_id: i64) -> Result<Vec<SoldProduct>, PaymentGatewayError>;
        async fn mark_invoice_sent(&self, order_id: i64, sent_at: DateTime<Utc>) -> Result<bool, PaymentGatewayError>;
    }
}
