use std::sync::Arc;

use actix_web::{http::StatusCode, test::TestRequest, web};
use fulfillment_engine::{
    db_types::{OrderId, OrderState},
    events::EventNotifier,
    traits::{GatewayError, OrderManagement, PaymentGateway, ReconciliationStore, StockManagement},
    ReconciliationApi,
    SqliteDatabase,
};

use super::{
    helpers::{reconciliation_config, seeded_db, send, send_data, transaction, webhook_auth, webhook_body},
    mocks::{MockGateway, MockNotifier, MockStore},
};
use crate::{data_objects::JsonResponse, routes::PaymentWebhookRoute};

type Route<B, G> = PaymentWebhookRoute<B, G, MockNotifier>;

fn webhook(auth: Option<&str>, body: &str) -> TestRequest {
    let mut req = TestRequest::post().uri("/webhook/payment").set_payload(body.to_string());
    if let Some(auth) = auth {
        req = req.insert_header(("Authorization", auth));
    }
    req
}

fn parse(body: &str) -> JsonResponse {
    serde_json::from_str(body).expect("Expected a JSON response")
}

#[actix_web::test]
async fn webhook_without_credentials_is_rejected() {
    let _ = env_logger::try_init().ok();
    // None of the mocks have expectations, so any backend call would panic
    let api = ReconciliationApi::new(MockStore::new(), MockGateway::new(), MockNotifier::new(), reconciliation_config());
    let (status, body) = send(api, Route::<MockStore, MockGateway>::new(), webhook(None, &webhook_body("p1"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!parse(&body).success);

    let api = ReconciliationApi::new(MockStore::new(), MockGateway::new(), MockNotifier::new(), reconciliation_config());
    let req = webhook(Some("Bearer not-the-secret"), &webhook_body("p1"));
    let (status, _) = send(api, Route::<MockStore, MockGateway>::new(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn malformed_webhook_bodies_are_bad_requests() {
    let _ = env_logger::try_init().ok();
    let auth = webhook_auth();
    for body in ["not json", "{}", r#"{"PaymentId": ""}"#] {
        let api =
            ReconciliationApi::new(MockStore::new(), MockGateway::new(), MockNotifier::new(), reconciliation_config());
        let (status, body) = send(api, Route::<MockStore, MockGateway>::new(), webhook(Some(&auth), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }
}

#[actix_web::test]
async fn confirmed_payment_commits_and_redelivery_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db("1001", "pay-1001").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_get_transaction()
        .withf(|id| id == "pay-1001")
        .times(2)
        .returning(|_| Ok(transaction("pay-1001", "1001", "2")));
    let mut notifier = MockNotifier::new();
    notifier.expect_notify_confirmed().times(1).returning(|_| Ok(()));
    let api = ReconciliationApi::new(db.clone(), gateway, notifier, reconciliation_config());
    let api = Arc::new(api);

    let auth = webhook_auth();
    let route = Route::<SqliteDatabase, MockGateway>::new;
    let (status, body) = send_shared(api.clone(), route(), webhook(Some(&auth), &webhook_body("pay-1001"))).await;
    assert_eq!(status, StatusCode::OK);
    let response = parse(&body);
    assert!(response.success);
    assert_eq!(response.message, "Order 1001 moved from Created to Confirmed");

    let (status, body) = send_shared(api, route(), webhook(Some(&auth), &webhook_body("pay-1001"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body).message, "Event for order 1001 was already processed");

    let order = db.fetch_order(&OrderId::new("1001")).await.unwrap().unwrap();
    assert_eq!(order.status, OrderState::Confirmed);
    assert_eq!(db.product("shirt").await.unwrap().unwrap().stock, 8);
}

#[actix_web::test]
async fn gateway_outage_asks_for_redelivery() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db("1002", "pay-1002").await;
    let mut gateway = MockGateway::new();
    gateway.expect_get_transaction().returning(|_| Err(GatewayError::Transient("HTTP 503".into())));
    let api = ReconciliationApi::new(db.clone(), gateway, MockNotifier::new(), reconciliation_config());
    let req = webhook(Some(&webhook_auth()), &webhook_body("pay-1002"));
    let (status, body) = send(api, Route::<SqliteDatabase, MockGateway>::new(), req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!parse(&body).success);
    let order = db.fetch_order(&OrderId::new("1002")).await.unwrap().unwrap();
    assert_eq!(order.status, OrderState::Created);
    assert_eq!(order.version, 0);
}

#[actix_web::test]
async fn unknown_orders_and_rejected_lookups_are_permanent() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db("1003", "pay-1003").await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_get_transaction()
        .withf(|id| id == "pay-ghost")
        .returning(|_| Ok(transaction("pay-ghost", "no-such-order", "2")));
    gateway
        .expect_get_transaction()
        .withf(|id| id == "pay-unknown")
        .returning(|_| Err(GatewayError::Rejected("HTTP 404".into())));
    let api = Arc::new(ReconciliationApi::new(db, gateway, MockNotifier::new(), reconciliation_config()));
    let auth = webhook_auth();
    let route = Route::<SqliteDatabase, MockGateway>::new;

    let (status, _) = send_shared(api.clone(), route(), webhook(Some(&auth), &webhook_body("pay-ghost"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send_shared(api, route(), webhook(Some(&auth), &webhook_body("pay-unknown"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn denial_after_confirmation_is_held_for_review() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db("1004", "pay-1004").await;
    let mut gateway = MockGateway::new();
    let mut seq = mockall::Sequence::new();
    gateway
        .expect_get_transaction()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(transaction("pay-1004", "1004", "2")));
    gateway
        .expect_get_transaction()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(transaction("pay-1004", "1004", "3")));
    let mut notifier = MockNotifier::new();
    notifier.expect_notify_confirmed().times(1).returning(|_| Ok(()));
    notifier.expect_notify_cancelled().never();
    let api = Arc::new(ReconciliationApi::new(db.clone(), gateway, notifier, reconciliation_config()));
    let auth = webhook_auth();
    let route = Route::<SqliteDatabase, MockGateway>::new;

    let (status, _) = send_shared(api.clone(), route(), webhook(Some(&auth), &webhook_body("pay-1004"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send_shared(api, route(), webhook(Some(&auth), &webhook_body("pay-1004"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(parse(&body).message.starts_with("IllegalTransition recorded for review"));
    let order = db.fetch_order(&OrderId::new("1004")).await.unwrap().unwrap();
    assert_eq!(order.status, OrderState::Confirmed);
    assert_eq!(db.product("shirt").await.unwrap().unwrap().stock, 8);
}

#[actix_web::test]
async fn live_notifier_is_accepted_by_the_route() {
    let _ = env_logger::try_init().ok();
    let db = seeded_db("1005", "pay-1005").await;
    let mut gateway = MockGateway::new();
    gateway.expect_get_transaction().returning(|_| Ok(transaction("pay-1005", "1005", "12")));
    let api = ReconciliationApi::new(db.clone(), gateway, EventNotifier::default(), reconciliation_config());
    let req = webhook(Some(&webhook_auth()), &webhook_body("pay-1005"));
    let route = PaymentWebhookRoute::<SqliteDatabase, MockGateway, EventNotifier>::new();
    let (status, _) = send(api, route, req).await;
    assert_eq!(status, StatusCode::OK);
    let order = db.fetch_order(&OrderId::new("1005")).await.unwrap().unwrap();
    assert_eq!(order.status, OrderState::Processing);
}

/// Several requests against one api instance, so the mocks' expectations span the whole test.
async fn send_shared<B, G>(
    api: Arc<ReconciliationApi<B, G, MockNotifier>>,
    route: Route<B, G>,
    req: TestRequest,
) -> (StatusCode, String)
where
    B: ReconciliationStore + 'static,
    G: PaymentGateway + 'static,
{
    send_data(web::Data::from(api), route, req).await
}
