use cucumber::{given, then, when};
use fulfillment_engine::{
    db_types::{OrderId, OrderState, StockDirection},
    reconciliation_objects::{Notified, ReconciliationResult},
    traits::{OrderManagement, ReconciliationStore, StockManagement},
};

use crate::{
    cucumber::FulfillmentWorld,
    support::{auth_header, webhook_body, Sent},
};

#[given(expr = "product {word} with {int} units in stock")]
async fn product_in_stock(world: &mut FulfillmentWorld, product_id: String, stock: i64) {
    world.system().add_product(&product_id, stock).await;
}

#[given(expr = "order {word} for {int} units of {word} paid with [{word}]")]
async fn order_with_payment(world: &mut FulfillmentWorld, order_id: String, qty: i64, product_id: String, pay: String) {
    world.system().add_order(&order_id, &[(product_id.as_str(), qty)], Some(&pay)).await;
}

#[given(expr = "order {word} is {word}")]
async fn order_in_state(world: &mut FulfillmentWorld, order_id: String, state: String) {
    let sys = world.system();
    let order = sys.order(&order_id).await;
    match state.parse::<OrderState>().expect("Not a valid order state") {
        OrderState::Processing => {
            sys.db.compare_and_swap(&order.order_id, order.version, OrderState::Processing).await.expect("CAS failed");
        },
        // Go through the reconciler so that the stock is taken as well
        OrderState::Confirmed => {
            let payment_id = order.payment_transaction_id.clone().expect("Order has no payment");
            sys.gateway.set_status(&payment_id, &order_id, "2");
            let result = sys.api.reconcile_transaction(&payment_id).await;
            assert!(matches!(result, ReconciliationResult::Committed { .. }), "Setup failed: {result:?}");
        },
        other => panic!("Cannot set up an order in state {other}"),
    }
}

#[when(expr = "the gateway reports status {string} for [{word}] on order {word}")]
async fn gateway_reports(world: &mut FulfillmentWorld, status: String, payment_id: String, order_id: String) {
    world.system().gateway.set_status(&payment_id, &order_id, &status);
}

#[when(expr = "a webhook for [{word}] arrives")]
async fn webhook_arrives(world: &mut FulfillmentWorld, payment_id: String) {
    let result = world.api().reconcile(&webhook_body(&payment_id), Some(&auth_header())).await;
    world.last_result = Some(result);
}

#[then(expr = "order {word} is now {word}")]
async fn check_order_state(world: &mut FulfillmentWorld, order_id: String, state: String) {
    let order = world.system().order(&order_id).await;
    assert_eq!(order.status.to_string(), state, "Order state is incorrect");
}

#[then(expr = "order {word} is at version {int}")]
async fn check_order_version(world: &mut FulfillmentWorld, order_id: String, version: i64) {
    assert_eq!(world.system().order(&order_id).await.version, version, "Order version is incorrect");
}

#[then(expr = "product {word} has {int} units in stock")]
async fn check_stock(world: &mut FulfillmentWorld, product_id: String, stock: i64) {
    assert_eq!(world.system().stock_of(&product_id).await, stock, "Stock is incorrect");
}

#[then(expr = "order {word} has {int} {word} movement(s) of {int} units of {word}")]
async fn check_movements(
    world: &mut FulfillmentWorld,
    order_id: String,
    count: usize,
    direction: String,
    qty: i64,
    product_id: String,
) {
    let direction = match direction.as_str() {
        "decrement" => StockDirection::Decrement,
        "increment" => StockDirection::Increment,
        other => panic!("Unknown direction {other}"),
    };
    let movements = world.system().db.movements_for_order(&OrderId::new(order_id)).await.expect("Error fetching");
    let matching = movements
        .iter()
        .filter(|m| m.direction == direction && m.product_id == product_id && m.quantity == qty)
        .count();
    assert_eq!(matching, count, "Movements are incorrect: {movements:?}");
}

#[then(expr = "order {word} has {int} stock movement(s) in total")]
async fn check_movement_count(world: &mut FulfillmentWorld, order_id: String, count: usize) {
    let movements = world.system().db.movements_for_order(&OrderId::new(order_id)).await.expect("Error fetching");
    assert_eq!(movements.len(), count, "Movement count is incorrect");
}

#[then(expr = "the result is {word}")]
async fn check_result(world: &mut FulfillmentWorld, expected: String) {
    let result = world.last_result();
    let ok = match expected.as_str() {
        "Committed" => matches!(result, ReconciliationResult::Committed { .. }),
        "AlreadyProcessed" => matches!(result, ReconciliationResult::AlreadyProcessed { .. }),
        "AnomalyRecorded" => matches!(result, ReconciliationResult::AnomalyRecorded(_)),
        "Unchanged" => matches!(result, ReconciliationResult::Unchanged { .. }),
        other => panic!("Unknown result {other}"),
    };
    assert!(ok, "Expected {expected}, got {result:?}");
}

#[then(expr = "a confirmation was sent for order {word}")]
async fn check_confirmation(world: &mut FulfillmentWorld, order_id: String) {
    let result = world.last_result();
    assert!(
        matches!(result, ReconciliationResult::Committed { notification: Notified::Confirmed, .. }),
        "Got {result:?}"
    );
    let sent = world.system().notifier.sent();
    assert_eq!(sent.iter().filter(|s| **s == Sent::Confirmed(OrderId::new(order_id.clone()))).count(), 1);
}

#[then(expr = "a cancellation with reason {string} was sent for order {word}")]
async fn check_cancellation(world: &mut FulfillmentWorld, reason: String, order_id: String) {
    let sent = world.system().notifier.sent();
    let expected = OrderId::new(order_id.clone());
    let found = sent.iter().any(|s| matches!(s, Sent::Cancelled(id, r) if *id == expected && r.to_string() == reason));
    assert!(found, "No cancellation ({reason}) for {order_id} in {sent:?}");
    let result = world.last_result();
    assert!(
        matches!(result, ReconciliationResult::Committed { notification: Notified::Cancelled(_), .. }),
        "Got {result:?}"
    );
}

#[then(expr = "{int} notification(s) was/were sent")]
async fn check_notification_count(world: &mut FulfillmentWorld, count: usize) {
    assert_eq!(world.system().notifier.sent().len(), count, "Notification count is incorrect");
}

#[then(expr = "{int} anomaly record(s) exist(s)")]
async fn check_anomalies(world: &mut FulfillmentWorld, count: usize) {
    let anomalies = world.system().db.fetch_anomalies().await.expect("Error fetching anomalies");
    assert_eq!(anomalies.len(), count, "Anomaly count is incorrect");
}

#[then(expr = "order {word} has {int} payment event(s)")]
async fn check_events(world: &mut FulfillmentWorld, order_id: String, count: usize) {
    let id = OrderId::new(order_id);
    let events = world.system().db.fetch_payment_events_for_order(&id).await.expect("Error fetching events");
    assert_eq!(events.len(), count, "Payment event count is incorrect");
    assert!(world.system().db.fetch_order(&id).await.expect("Error fetching order").is_some());
}
