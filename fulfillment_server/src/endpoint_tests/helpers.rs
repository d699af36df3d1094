use actix_web::{
    body::MessageBody,
    dev::{HttpServiceFactory, ServiceResponse},
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    App,
};
use chrono::{TimeZone, Utc};
use fpg_common::{Cents, Secret};
use fulfillment_engine::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderState},
    test_utils::prepare_env::{prepare_test_env, random_db_path, seed_product},
    traits::{GatewayTransaction, OrderManagement},
    ReconciliationConfig,
    SqliteDatabase,
};
use log::debug;

use crate::middleware::BearerAuthMiddlewareFactory;

pub const WEBHOOK_SECRET: &str = "endpoint-test-webhook-secret";
pub const ADMIN_TOKEN: &str = "endpoint-test-admin-token";

pub fn reconciliation_config() -> ReconciliationConfig {
    ReconciliationConfig { webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()), ..Default::default() }
}

pub fn webhook_auth() -> String {
    format!("Bearer {WEBHOOK_SECRET}")
}

pub fn admin_auth() -> String {
    format!("Bearer {ADMIN_TOKEN}")
}

pub fn webhook_body(payment_id: &str) -> String {
    format!(r#"{{"PaymentId": "{payment_id}", "ChangeType": 1}}"#)
}

pub fn transaction(payment_id: &str, order_id: &str, status: &str) -> GatewayTransaction {
    GatewayTransaction {
        payment_id: payment_id.to_string(),
        merchant_order_id: Some(OrderId::new(order_id)),
        status_code: status.to_string(),
        amount: None,
    }
}

pub fn sample_order(order_id: &str, status: OrderState) -> Order {
    let ts = Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap();
    Order {
        id: 1,
        order_id: OrderId::new(order_id),
        customer_id: "alice".into(),
        total_price: Cents::from(2500),
        currency: "BRL".into(),
        status,
        payment_transaction_id: Some(format!("pay-{order_id}")),
        version: 0,
        created_at: ts,
        updated_at: ts,
    }
}

/// A migrated database with product `shirt` (10 units) and order `order_id` for 2 shirts, linked to `payment_id`.
pub async fn seeded_db(order_id: &str, payment_id: &str) -> SqliteDatabase {
    let db = prepare_test_env(&random_db_path()).await;
    seed_product(&db, "shirt", 10).await;
    let order = NewOrder::new(OrderId::new(order_id), "alice", vec![NewOrderItem::new("shirt", 2, Cents::from(4990))])
        .expect("Invalid order");
    db.create_order(order).await.expect("Error creating order");
    db.attach_payment_transaction(&OrderId::new(order_id), payment_id).await.expect("Error attaching payment");
    db
}

/// Sends the request to an app holding `data` and the given route. Errors raised by middleware are turned into their
/// response status and message.
pub async fn send<T, F>(data: T, route: F, req: TestRequest) -> (StatusCode, String)
where
    T: 'static,
    F: HttpServiceFactory + 'static,
{
    send_data(web::Data::new(data), route, req).await
}

pub async fn send_data<T, F>(data: web::Data<T>, route: F, req: TestRequest) -> (StatusCode, String)
where
    T: 'static,
    F: HttpServiceFactory + 'static,
{
    let app = App::new().app_data(data).service(route);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => read_response(res),
        Err(e) => (e.as_response_error().status_code(), e.to_string()),
    }
}

/// As [`send`], but the route sits behind the admin token in an `/api` scope.
pub async fn send_operator<T, F>(data: T, route: F, token: &str, req: TestRequest) -> (StatusCode, String)
where
    T: 'static,
    F: HttpServiceFactory + 'static,
{
    let scope = web::scope("/api").wrap(BearerAuthMiddlewareFactory::new(Secret::new(token.to_string()))).service(route);
    let app = App::new().app_data(web::Data::new(data)).service(scope);
    let service = test::init_service(app).await;
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => read_response(res),
        Err(e) => (e.as_response_error().status_code(), e.to_string()),
    }
}

fn read_response<B: MessageBody>(res: ServiceResponse<B>) -> (StatusCode, String) {
    let (_, res) = res.into_parts();
    let status = res.status();
    let body = res.into_body().try_into_bytes().map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
    (status, body)
}
