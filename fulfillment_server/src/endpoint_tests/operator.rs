use actix_web::{http::StatusCode, test::TestRequest};
use fpg_common::Cents;
use fulfillment_engine::{
    db_types::{OrderId, OrderState},
    traits::{GatewayError, GatewayStatusUpdate, OrderManagement, StockManagement},
    CheckoutApi,
    ReconciliationApi,
    SqliteDatabase,
};
use serde_json::{json, Value};

use super::{
    helpers::{admin_auth, reconciliation_config, sample_order, seeded_db, send_operator, transaction, ADMIN_TOKEN},
    mocks::{MockGateway, MockNotifier, MockStore},
};
use crate::routes::{
    AnomaliesRoute,
    CapturePaymentRoute,
    CheckoutRoute,
    OrderDetailsRoute,
    PaymentStatusRoute,
    SearchOrdersRoute,
    StockAuditRoute,
    VoidPaymentRoute,
};

type Api = ReconciliationApi<MockStore, MockGateway, MockNotifier>;

fn api(store: MockStore) -> Api {
    ReconciliationApi::new(store, MockGateway::new(), MockNotifier::new(), reconciliation_config())
}

fn get(path: &str, auth: Option<&str>) -> TestRequest {
    let mut req = TestRequest::get().uri(path);
    if let Some(auth) = auth {
        req = req.insert_header(("Authorization", auth));
    }
    req
}

#[actix_web::test]
async fn operator_routes_require_the_admin_token() {
    let _ = env_logger::try_init().ok();
    let route = AnomaliesRoute::<MockStore, MockGateway, MockNotifier>::new;
    let (status, _) = send_operator(api(MockStore::new()), route(), ADMIN_TOKEN, get("/api/anomalies", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = get("/api/anomalies", Some("Bearer wrong-token"));
    let (status, _) = send_operator(api(MockStore::new()), route(), ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = get("/api/anomalies", Some(&format!("Basic {ADMIN_TOKEN}")));
    let (status, _) = send_operator(api(MockStore::new()), route(), ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn empty_admin_token_closes_the_operator_routes() {
    let _ = env_logger::try_init().ok();
    let route = AnomaliesRoute::<MockStore, MockGateway, MockNotifier>::new();
    let (status, _) = send_operator(api(MockStore::new()), route, "", get("/api/anomalies", Some("Bearer "))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn anomalies_are_listed() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_anomalies().times(1).returning(|| Ok(vec![]));
    let route = AnomaliesRoute::<MockStore, MockGateway, MockNotifier>::new();
    let (status, body) = send_operator(api(store), route, ADMIN_TOKEN, get("/api/anomalies", Some(&admin_auth()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn search_orders_by_state() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store
        .expect_search_orders()
        .withf(|q| q.states == vec![OrderState::Confirmed, OrderState::Refunded] && q.customer_id.is_none())
        .times(1)
        .returning(|_| Ok(vec![sample_order("2001", OrderState::Confirmed)]));
    let route = SearchOrdersRoute::<MockStore, MockGateway, MockNotifier>::new();
    let req = get("/api/orders?state=Confirmed,Refunded", Some(&admin_auth()));
    let (status, body) = send_operator(api(store), route, ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(orders[0]["order_id"], "2001");
    assert_eq!(orders[0]["status"], "Confirmed");
}

#[actix_web::test]
async fn search_orders_rejects_unknown_states() {
    let _ = env_logger::try_init().ok();
    let route = SearchOrdersRoute::<MockStore, MockGateway, MockNotifier>::new();
    let req = get("/api/orders?state=Shipped", Some(&admin_auth()));
    let (status, body) = send_operator(api(MockStore::new()), route, ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("error"));
}

#[actix_web::test]
async fn missing_order_is_not_found() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().times(1).returning(|_| Ok(None));
    let route = OrderDetailsRoute::<MockStore, MockGateway, MockNotifier>::new();
    let req = get("/api/orders/9999", Some(&admin_auth()));
    let (status, _) = send_operator(api(store), route, ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn order_details_show_the_ledger() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db("2002", "pay-2002").await;
    let api = ReconciliationApi::new(db, MockGateway::new(), MockNotifier::new(), reconciliation_config());
    let route = OrderDetailsRoute::<SqliteDatabase, MockGateway, MockNotifier>::new();
    let req = get("/api/orders/2002", Some(&admin_auth()));
    let (status, body) = send_operator(api, route, ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::OK);
    let details: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(details["order"]["status"], "Created");
    assert_eq!(details["order"]["payment_transaction_id"], "pay-2002");
    assert_eq!(details["items"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(details["movements"], json!([]));
    assert_eq!(details["payment_events"], json!([]));
}

#[actix_web::test]
async fn stock_audit_on_a_consistent_ledger() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db("2003", "pay-2003").await;
    let api = ReconciliationApi::new(db, MockGateway::new(), MockNotifier::new(), reconciliation_config());
    let route = StockAuditRoute::<SqliteDatabase, MockGateway, MockNotifier>::new();
    let (status, body) = send_operator(api, route, ADMIN_TOKEN, get("/api/stock/audit", Some(&admin_auth()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn payment_status_is_read_only() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store
        .expect_fetch_order_for_transaction()
        .times(1)
        .returning(|_| Ok(Some(sample_order("2004", OrderState::Processing))));
    let mut gateway = MockGateway::new();
    gateway.expect_get_transaction().times(1).returning(|_| Ok(transaction("pay-2004", "2004", "2")));
    let status_api = ReconciliationApi::new(store, gateway, MockNotifier::new(), reconciliation_config());
    let route = PaymentStatusRoute::<MockStore, MockGateway, MockNotifier>::new();
    let req = get("/api/payment_status?payment_id=pay-2004", Some(&admin_auth()));
    let (status, body) = send_operator(status_api, route, ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::OK);
    let status: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(status["status_code"], "2");
    assert_eq!(status["payment_state"], "Confirmed");
    assert_eq!(status["order_state"], "Processing");

    let route = PaymentStatusRoute::<MockStore, MockGateway, MockNotifier>::new();
    let req = get("/api/payment_status", Some(&admin_auth()));
    let (status, _) = send_operator(api(MockStore::new()), route, ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn checkout_body(order_id: &str, product_id: &str) -> Value {
    json!({
        "order_id": order_id,
        "customer_id": "bob",
        "customer": {"name": "Bob", "email": "bob@example.com"},
        "items": [{"product_id": product_id, "quantity": 3, "unit_price": 1000}],
        "payment_method": {"Type": "Pix"}
    })
}

#[actix_web::test]
async fn checkout_creates_and_links_the_order() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db("2005", "pay-2005").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_transaction()
        .withf(|req| req.order_id == OrderId::new("3001") && req.amount == Cents::from(3000))
        .times(1)
        .returning(|_| Ok(transaction("pay-3001", "3001", "12")));
    let api = CheckoutApi::new(db.clone(), gateway);
    let route = CheckoutRoute::<SqliteDatabase, MockGateway>::new();
    let req = TestRequest::post()
        .uri("/api/checkout")
        .insert_header(("Authorization", admin_auth()))
        .set_json(checkout_body("3001", "shirt"));
    let (status, body) = send_operator(api, route, ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["order"]["payment_transaction_id"], "pay-3001");
    assert_eq!(result["transaction"]["payment_id"], "pay-3001");
    // Orders take no stock until the payment is confirmed
    let order = db.fetch_order(&OrderId::new("3001")).await.unwrap().unwrap();
    assert_eq!(order.status, OrderState::Created);
    assert_eq!(order.total_price, Cents::from(3000));
}

#[actix_web::test]
async fn checkout_rejects_unknown_products_before_charging() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db("2006", "pay-2006").await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_transaction().never();
    let api = CheckoutApi::new(db.clone(), gateway);
    let route = CheckoutRoute::<SqliteDatabase, MockGateway>::new();
    let req = TestRequest::post()
        .uri("/api/checkout")
        .insert_header(("Authorization", admin_auth()))
        .set_json(checkout_body("3002", "hat"));
    let (status, _) = send_operator(api, route, ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(db.fetch_order(&OrderId::new("3002")).await.unwrap().is_none());
}

#[actix_web::test]
async fn checkout_reports_gateway_outages() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db("2007", "pay-2007").await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_transaction().times(1).returning(|_| Err(GatewayError::Transient("timeout".into())));
    let api = CheckoutApi::new(db, gateway);
    let route = CheckoutRoute::<SqliteDatabase, MockGateway>::new();
    let req = TestRequest::post()
        .uri("/api/checkout")
        .insert_header(("Authorization", admin_auth()))
        .set_json(checkout_body("3003", "shirt"));
    let (status, _) = send_operator(api, route, ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn checkout_rejects_totals_that_overflow() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_create_order().never();
    let mut gateway = MockGateway::new();
    gateway.expect_create_transaction().never();
    let api = CheckoutApi::new(store, gateway);
    let route = CheckoutRoute::<MockStore, MockGateway>::new();
    let mut body = checkout_body("3004", "shirt");
    body["items"][0]["quantity"] = json!(i64::MAX / 2);
    let req = TestRequest::post().uri("/api/checkout").insert_header(("Authorization", admin_auth())).set_json(body);
    let (status, body) = send_operator(api, route, ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("overflow"), "{body}");
}

#[actix_web::test]
async fn payment_status_by_merchant_order_asks_the_gateway_when_unknown_locally() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order().withf(|id| id.as_str() == "2011").times(1).returning(|_| Ok(None));
    let mut gateway = MockGateway::new();
    gateway
        .expect_find_transactions_for_order()
        .times(1)
        .returning(|_| Ok(vec!["pay-2011a".to_string(), "pay-2011b".to_string()]));
    gateway
        .expect_get_transaction()
        .withf(|id| id == "pay-2011b")
        .times(1)
        .returning(|_| Ok(transaction("pay-2011b", "2011", "2")));
    let status_api = ReconciliationApi::new(store, gateway, MockNotifier::new(), reconciliation_config());
    let route = PaymentStatusRoute::<MockStore, MockGateway, MockNotifier>::new();
    let req = get("/api/payment_status?merchant_order_id=2011", Some(&admin_auth()));
    let (status, body) = send_operator(status_api, route, ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let status: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(status["payment_id"], "pay-2011b");
    assert_eq!(status["order_state"], Value::Null);
}

fn status_update(payment_id: &str, status_code: &str) -> GatewayStatusUpdate {
    GatewayStatusUpdate { payment_id: payment_id.to_string(), status_code: status_code.to_string(), message: None }
}

fn post(path: &str) -> TestRequest {
    TestRequest::post().uri(path).insert_header(("Authorization", admin_auth()))
}

#[actix_web::test]
async fn capture_confirms_the_order_through_reconciliation() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db("2012", "pay-2012").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_capture()
        .withf(|id, amount| id == "pay-2012" && amount.is_none())
        .times(1)
        .returning(|id, _| Ok(status_update(id, "2")));
    gateway.expect_get_transaction().times(1).returning(|_| Ok(transaction("pay-2012", "2012", "2")));
    let mut notifier = MockNotifier::new();
    notifier.expect_notify_confirmed().times(1).returning(|_| Ok(()));
    let api = ReconciliationApi::new(db.clone(), gateway, notifier, reconciliation_config());
    let route = CapturePaymentRoute::<SqliteDatabase, MockGateway, MockNotifier>::new();
    let (status, body) = send_operator(api, route, ADMIN_TOKEN, post("/api/payments/pay-2012/capture")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["action"], "Capture");
    assert_eq!(result["update"]["status_code"], "2");
    assert_eq!(result["reconciliation"]["Committed"]["order"]["status"], "Confirmed");
    assert_eq!(db.product("shirt").await.unwrap().unwrap().stock, 8);
}

#[actix_web::test]
async fn partial_void_passes_the_amount_on() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db("2013", "pay-2013").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_void()
        .withf(|id, amount| id == "pay-2013" && *amount == Some(Cents::from(500)))
        .times(1)
        .returning(|id, _| Ok(status_update(id, "10")));
    gateway.expect_get_transaction().times(1).returning(|_| Ok(transaction("pay-2013", "2013", "10")));
    let mut notifier = MockNotifier::new();
    notifier.expect_notify_cancelled().times(1).returning(|_, _| Ok(()));
    let api = ReconciliationApi::new(db.clone(), gateway, notifier, reconciliation_config());
    let route = VoidPaymentRoute::<SqliteDatabase, MockGateway, MockNotifier>::new();
    let (status, body) = send_operator(api, route, ADMIN_TOKEN, post("/api/payments/pay-2013/void?amount=500")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order = db.fetch_order(&OrderId::new("2013")).await.unwrap().unwrap();
    assert_eq!(order.status, OrderState::Voided);
}

#[actix_web::test]
async fn capture_of_an_unknown_payment_is_not_found() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_for_transaction().times(1).returning(|_| Ok(None));
    let mut gateway = MockGateway::new();
    gateway.expect_capture().never();
    let capture_api = ReconciliationApi::new(store, gateway, MockNotifier::new(), reconciliation_config());
    let route = CapturePaymentRoute::<MockStore, MockGateway, MockNotifier>::new();
    let (status, _) = send_operator(capture_api, route, ADMIN_TOKEN, post("/api/payments/pay-ghost/capture")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let route = VoidPaymentRoute::<MockStore, MockGateway, MockNotifier>::new();
    let req = post("/api/payments/pay-ghost/void?amount=-5");
    let (status, _) = send_operator(api(MockStore::new()), route, ADMIN_TOKEN, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
