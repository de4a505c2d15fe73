//! Request handlers for the storefront (`/api`) and the shop operator (`/admin`).
//!
//! Handlers are thin. They parse the request, call one engine API and map the result to a response. Anything longer
//! belongs in the engine. All database work is async, so a slow query never blocks an actix worker thread.
//!
//! Most handlers are generic over the backend trait they need, so the endpoint tests can run them against mocks.
//! Actix cannot register generic handlers directly, which is what the [`route!`] macro is for.
use actix_web::{get, web, HttpResponse, Responder};
use czk_payment_engine::{
    db_types::{NewOrder, NewProduct, Vs},
    helpers::SpdPayment,
    integrations::{BankNotificationIngester, InvoiceRenderer, Mailbox, Notifier},
    InventoryApi,
    InventoryManagement,
    OrderFlowApi,
    OrderManagement,
    OrderQueryApi,
    PaymentGatewayDatabase,
    ReconciliationApi,
    SettlementApi,
    SettlementManagement,
};
use log::*;

use crate::{
    config::QrConfig,
    data_objects::{
        CreateOrderResponse,
        JsonResponse,
        LimitParams,
        MarkPaidRequest,
        PaymentSearchParams,
        QrParams,
        StatusUpdateRequest,
        StockUpdateRequest,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

fn parse_vs(s: &str) -> Result<Vs, ServerError> {
    s.parse::<Vs>().map_err(|e| ServerError::InvalidRequestPath(e.to_string()))
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl PaymentGatewayDatabase);
/// Route handler for checkout.
///
/// The order is validated and priced, then committed atomically together with its stock decrements, its variable
/// symbol and a pending payment. A line that cannot be fulfilled rejects the whole order with `409 Conflict`, and the
/// body names the product and how many units are left.
pub async fn create_order<B: PaymentGatewayDatabase>(
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = body.into_inner();
    debug!("💻️ POST new order with {} line(s) for {}", order.items.len(), order.customer.email);
    let created = api.create_order(order).await.map_err(|e| {
        debug!("💻️ Could not create order. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Created().json(CreateOrderResponse::from(created)))
}

route!(order_by_id => Get "/orders/{id}" impl OrderManagement);
pub async fn order_by_id<B: OrderManagement>(
    path: web::Path<i64>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order #{order_id}");
    let order = api.order_by_id(order_id).await?.ok_or_else(|| {
        debug!("💻️ Order #{order_id} does not exist");
        ServerError::NoRecordFound(format!("Order #{order_id}"))
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_by_vs => Get "/orders/by-vs/{vs}" impl OrderManagement);
pub async fn order_by_vs<B: OrderManagement>(
    path: web::Path<String>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let vs = parse_vs(&path.into_inner())?;
    debug!("💻️ GET order for variable symbol {vs}");
    let order = api
        .order_by_vs(&vs)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No order with variable symbol {vs}")))?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payment_status => Get "/payments/status/{vs}" impl OrderManagement);
/// The latest payment for a variable symbol, together with its order. Either may be missing.
pub async fn payment_status<B: OrderManagement>(
    path: web::Path<String>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let vs = parse_vs(&path.into_inner())?;
    debug!("💻️ GET payment status for {vs}");
    let status = api.payment_status_by_vs(&vs).await?;
    Ok(HttpResponse::Ok().json(status))
}

fn spd_payment(params: QrParams, config: &QrConfig) -> Result<SpdPayment, ServerError> {
    let iban = config.merchant_iban.clone().ok_or_else(|| {
        warn!("💻️ A payment QR code was requested, but CPG_MERCHANT_IBAN is not set");
        ServerError::ConfigurationError("No merchant IBAN is configured".into())
    })?;
    let mut payment = SpdPayment::new(iban, params.amount);
    if let Some(vs) = params.vs {
        payment = payment.with_vs(vs);
    }
    if let Some(msg) = params.msg {
        payment = payment.with_message(msg);
    }
    Ok(payment)
}

#[get("/payments/qr")]
pub async fn payment_qr(
    query: web::Query<QrParams>,
    config: web::Data<QrConfig>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET payment QR code for {:?}", query.vs);
    let svg = spd_payment(query.into_inner(), &config)?.to_svg()?;
    Ok(HttpResponse::Ok().content_type("image/svg+xml").body(svg))
}

#[get("/payments/qr/payload")]
pub async fn payment_qr_payload(
    query: web::Query<QrParams>,
    config: web::Data<QrConfig>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET payment QR payload for {:?}", query.vs);
    let payload = spd_payment(query.into_inner(), &config)?.payload()?;
    Ok(HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(payload))
}

//----------------------------------------------   Products  ----------------------------------------------------
route!(product_by_id => Get "/products/{id}" impl InventoryManagement);
pub async fn product_by_id<B: InventoryManagement>(
    path: web::Path<i64>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    debug!("💻️ GET product #{product_id}");
    let product =
        api.product(product_id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Product #{product_id}")))?;
    Ok(HttpResponse::Ok().json(product))
}

route!(add_product => Post "/products" impl InventoryManagement);
pub async fn add_product<B: InventoryManagement>(
    body: web::Json<NewProduct>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product = body.into_inner();
    info!("💻️ POST new product '{}' with {} in stock", product.name, product.stock);
    let product = api.add_product(product).await?;
    Ok(HttpResponse::Created().json(product))
}

route!(set_stock => Post "/products/{id}/stock" impl InventoryManagement);
/// Sets the absolute stock level of a product, e.g. after a stock take.
pub async fn set_stock<B: InventoryManagement>(
    path: web::Path<i64>,
    body: web::Json<StockUpdateRequest>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    let stock = body.into_inner().stock;
    info!("💻️ POST stock level {stock} for product #{product_id}");
    let product = api.set_stock(product_id, stock).await?;
    Ok(HttpResponse::Ok().json(product))
}

//----------------------------------------------   Admin: settlement  --------------------------------------------
route!(settle_order => Post "/orders/{id}/settle" impl SettlementManagement, InvoiceRenderer, Notifier);
/// Re-runs settlement for a paid order. Sold records and the invoice are only created if they are still missing, so
/// this is the way to resend an invoice after a delivery failure. Orders that are not paid get `409 Conflict`.
pub async fn settle_order<B: SettlementManagement, R: InvoiceRenderer, N: Notifier>(
    path: web::Path<i64>,
    api: web::Data<SettlementApi<B, R, N>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    info!("💻️ POST settlement retry for order #{order_id}");
    let result = api.settle(order_id).await.map_err(|e| {
        warn!("💻️ Could not settle order #{order_id}. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(result))
}

route!(sold_products => Get "/orders/{id}/sold" impl SettlementManagement);
pub async fn sold_products<B: SettlementManagement>(
    path: web::Path<i64>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET sold products for order #{order_id}");
    let sold = api.sold_products(order_id).await?;
    Ok(HttpResponse::Ok().json(sold))
}

//----------------------------------------------   Admin: payments  ----------------------------------------------
route!(mark_paid => Post "/payments/mark-paid" impl PaymentGatewayDatabase);
/// Confirms a payment by hand after the operator has checked the bank statement.
///
/// The latest payment for the variable symbol is marked as received (or created, if there is none), and its order is
/// marked as paid. Settlement runs only if this call moved the order to `paid`.
pub async fn mark_paid<B: PaymentGatewayDatabase>(
    body: web::Json<MarkPaidRequest>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let MarkPaidRequest { vs, amount, reference } = body.into_inner();
    info!("💻️ POST manual payment confirmation for {vs}");
    let result = api.confirm_payment_manually(&vs, amount, reference).await.map_err(|e| {
        warn!("💻️ Could not confirm the payment for {vs}. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(result))
}

route!(update_payment_status => Post "/payments/{id}/status" impl PaymentGatewayDatabase);
/// Overrides the status of a single payment. Only `received` touches the order, and paid orders are never reverted.
pub async fn update_payment_status<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    let status = body.into_inner().status;
    info!("💻️ POST status {status} for payment #{payment_id}");
    let result = api.set_payment_status(payment_id, status).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(sync_bank => Post "/payments/sync-bank" impl PaymentGatewayDatabase, Mailbox);
/// Polls the bank mailbox once and reconciles what it finds. The summary lists matched, unmatched and failed
/// confirmations.
pub async fn sync_bank<B: PaymentGatewayDatabase, M: Mailbox>(
    api: web::Data<ReconciliationApi<B>>,
    ingester: web::Data<BankNotificationIngester<M>>,
) -> Result<HttpResponse, ServerError> {
    info!("💻️ POST bank mailbox sync");
    let summary = api.sync_mailbox(ingester.as_ref()).await.map_err(|e| {
        warn!("💻️ Bank mailbox sync failed. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(sync_from_orders => Post "/payments/sync-from-orders" impl PaymentGatewayDatabase);
pub async fn sync_from_orders<B: PaymentGatewayDatabase>(
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    info!("💻️ POST backfill pending payments");
    let created = api.backfill_pending_payments().await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("{created} pending payment(s) created"))))
}

route!(search_payments => Get "/payments" impl OrderManagement);
/// Payment search. `vs`, `status` and `limit` are optional query parameters. Results are newest first, and the
/// limit is clamped to 1..=500.
pub async fn search_payments<B: OrderManagement>(
    query: web::Query<PaymentSearchParams>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = query.into_inner();
    debug!("💻️ GET payments search for {params:?}");
    let payments = api.search_payments(params.into()).await?;
    Ok(HttpResponse::Ok().json(payments))
}

route!(unmatched_payments => Get "/payments/unmatched" impl OrderManagement);
pub async fn unmatched_payments<B: OrderManagement>(
    query: web::Query<LimitParams>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let limit = query.limit_or_default();
    debug!("💻️ GET the last {limit} unmatched payments");
    let unmatched = api.unmatched_payments(limit).await?;
    Ok(HttpResponse::Ok().json(unmatched))
}
