//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Since each worker thread processes its requests sequentially, handlers must never block the current thread. All
//! I/O (database, gateway) is expressed as futures.
use actix_web::{get, http::header::AUTHORIZATION, web, HttpRequest, HttpResponse, Responder};
use fulfillment_engine::{
    db_types::OrderId,
    reconciliation_objects::PaymentStatusQuery,
    traits::{Notifier, OrderManagement, OrderQueryFilter, PaymentGateway, ReconciliationStore},
    CheckoutApi,
    ReconciliationApi,
};
use log::*;

use crate::{
    data_objects::{CheckoutRequest, OrderSearchParams, PaymentActionParams, PaymentStatusParams},
    errors::ServerError,
    helpers::webhook_response,
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

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------  Webhook  ----------------------------------------------------
route!(payment_webhook => Post "/webhook/payment" impl ReconciliationStore, PaymentGateway, Notifier);
/// Route handler for gateway payment notifications.
///
/// The gateway presents the shared webhook secret as a bearer token. The body only needs to carry a `PaymentId`;
/// the transaction itself is always re-fetched from the gateway before anything changes.
///
/// This handler never fails. The status code tells the gateway whether to redeliver:
/// * 200: processed (or already processed). Do not redeliver.
/// * 401, 503: the delivery was not processed. Redeliver later.
/// * 400, 404, 422: the delivery can never be processed, or needs manual review.
pub async fn payment_webhook<B, G, N>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B, G, N>>,
) -> HttpResponse
where
    B: ReconciliationStore,
    G: PaymentGateway,
    N: Notifier,
{
    trace!("💻️ Received payment webhook ({} bytes)", body.len());
    let auth = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let result = api.reconcile(body.as_ref(), auth).await;
    info!("💻️ Payment webhook: {}", result.summary());
    webhook_response(&result)
}

//----------------------------------------------  Operator  ----------------------------------------------------
route!(order_details => Get "/orders/{order_id}" impl ReconciliationStore, PaymentGateway, Notifier);
/// The order, its items, stock movements and payment events.
pub async fn order_details<B, G, N>(
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationStore,
    G: PaymentGateway,
    N: Notifier,
{
    let order_id = OrderId::new(path.into_inner());
    trace!("💻️ Fetching details for order {order_id}");
    let details =
        api.order_details(&order_id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    Ok(HttpResponse::Ok().json(details))
}

route!(search_orders => Get "/orders" impl ReconciliationStore, PaymentGateway, Notifier);
/// Lists orders, optionally filtered by `state` (comma separated) and `customer_id`.
pub async fn search_orders<B, G, N>(
    query: web::Query<OrderSearchParams>,
    api: web::Data<ReconciliationApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationStore,
    G: PaymentGateway,
    N: Notifier,
{
    let filter = OrderQueryFilter::try_from(query.into_inner())?;
    trace!("💻️ Searching orders with {filter:?}");
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(anomalies => Get "/anomalies" impl ReconciliationStore, PaymentGateway, Notifier);
pub async fn anomalies<B, G, N>(api: web::Data<ReconciliationApi<B, G, N>>) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationStore,
    G: PaymentGateway,
    N: Notifier,
{
    let anomalies = api.anomalies().await?;
    Ok(HttpResponse::Ok().json(anomalies))
}

route!(stock_audit => Get "/stock/audit" impl ReconciliationStore, PaymentGateway, Notifier);
/// Products whose stock counter disagrees with their ledger. An empty list means the ledger is consistent.
pub async fn stock_audit<B, G, N>(api: web::Data<ReconciliationApi<B, G, N>>) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationStore,
    G: PaymentGateway,
    N: Notifier,
{
    let drift = api.audit_stock().await?;
    if !drift.is_empty() {
        warn!("💻️ Stock audit found {} product(s) with drift", drift.len());
    }
    Ok(HttpResponse::Ok().json(drift))
}

route!(reconcile_payment => Post "/reconcile/{payment_id}" impl ReconciliationStore, PaymentGateway, Notifier);
/// Reconciles a transaction on demand, exactly as if its webhook had arrived.
pub async fn reconcile_payment<B, G, N>(
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B, G, N>>,
) -> HttpResponse
where
    B: ReconciliationStore,
    G: PaymentGateway,
    N: Notifier,
{
    let payment_id = path.into_inner();
    info!("💻️ Manual reconciliation requested for {payment_id}");
    let result = api.reconcile_transaction(&payment_id).await;
    webhook_response(&result)
}

route!(payment_status => Get "/payment_status" impl ReconciliationStore, PaymentGateway, Notifier);
/// The gateway's current view of a transaction, looked up by `payment_id` or `merchant_order_id`. Read only.
pub async fn payment_status<B, G, N>(
    query: web::Query<PaymentStatusParams>,
    api: web::Data<ReconciliationApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationStore,
    G: PaymentGateway,
    N: Notifier,
{
    let query = PaymentStatusQuery::try_from(query.into_inner())?;
    let status = api.payment_status(query).await?;
    Ok(HttpResponse::Ok().json(status))
}

route!(capture_payment => Post "/payments/{payment_id}/capture" impl ReconciliationStore, PaymentGateway, Notifier);
/// Captures an authorized payment, optionally only `amount` cents of it.
pub async fn capture_payment<B, G, N>(
    path: web::Path<String>,
    query: web::Query<PaymentActionParams>,
    api: web::Data<ReconciliationApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationStore,
    G: PaymentGateway,
    N: Notifier,
{
    let payment_id = path.into_inner();
    info!("💻️ Capture requested for {payment_id}");
    let result = api.capture_payment(&payment_id, query.amount()).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(void_payment => Post "/payments/{payment_id}/void" impl ReconciliationStore, PaymentGateway, Notifier);
/// Voids a payment, optionally only `amount` cents of it.
pub async fn void_payment<B, G, N>(
    path: web::Path<String>,
    query: web::Query<PaymentActionParams>,
    api: web::Data<ReconciliationApi<B, G, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: ReconciliationStore,
    G: PaymentGateway,
    N: Notifier,
{
    let payment_id = path.into_inner();
    info!("💻️ Void requested for {payment_id}");
    let result = api.void_payment(&payment_id, query.amount()).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(checkout => Post "/checkout" impl OrderManagement, PaymentGateway);
/// Creates the order and its gateway transaction, and links the two.
pub async fn checkout<B, G>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement,
    G: PaymentGateway,
{
    let (order, request) = body.into_inner().into_parts()?;
    debug!("💻️ Checkout for order {} ({} {})", order.order_id, order.total_price, order.currency);
    let result = api.submit_order(order, request).await?;
    info!("💻️ Order {} created with payment {}", result.order.order_id, result.transaction.payment_id);
    Ok(HttpResponse::Created().json(result))
}
