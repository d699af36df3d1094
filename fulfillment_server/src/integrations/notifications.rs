//! Customer notification hooks.
//!
//! The reconciliation engine only queues notifications; the hooks here deliver them. If `FPG_NOTIFICATION_URL` is
//! set, every event is POSTed there as JSON (see [`EventType`]). Otherwise events are only logged.
use std::time::Duration;

use fulfillment_engine::events::{EventHandlers, EventHooks, EventType, OrderCancelledEvent, OrderConfirmedEvent};
use futures::future::BoxFuture;
use log::*;

use crate::errors::ServerError;

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 50;
const DELIVERY_ATTEMPTS: u32 = 3;
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);
const DELIVERY_BACKOFF: Duration = Duration::from_millis(500);

pub fn create_notification_handlers(url: Option<String>) -> Result<EventHandlers, ServerError> {
    let mut hooks = EventHooks::default();
    let Some(url) = url else {
        hooks.on_order_confirmed(|ev: OrderConfirmedEvent| {
            info!("📬️ Order {} is confirmed. The customer would be notified now.", ev.order.order_id);
            no_op()
        });
        hooks.on_order_cancelled(|ev: OrderCancelledEvent| {
            info!("📬️ Order {} was {}. The customer would be notified now.", ev.order.order_id, ev.reason);
            no_op()
        });
        return Ok(EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks));
    };
    let client = reqwest::Client::builder()
        .timeout(DELIVERY_TIMEOUT)
        .build()
        .map_err(|e| ServerError::InitializeError(format!("Could not create notification client. {e}")))?;
    let webhook = NotificationWebhook { client, url };
    let confirmed = webhook.clone();
    hooks.on_order_confirmed(move |ev| -> BoxFuture<'static, ()> {
        let webhook = confirmed.clone();
        Box::pin(async move { webhook.deliver(EventType::OrderConfirmed(ev)).await })
    });
    hooks.on_order_cancelled(move |ev| -> BoxFuture<'static, ()> {
        let webhook = webhook.clone();
        Box::pin(async move { webhook.deliver(EventType::OrderCancelled(ev)).await })
    });
    Ok(EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks))
}

#[derive(Clone)]
struct NotificationWebhook {
    client: reqwest::Client,
    url: String,
}

impl NotificationWebhook {
    async fn deliver(&self, event: EventType) {
        let order_id = match &event {
            EventType::OrderConfirmed(ev) => ev.order.order_id.clone(),
            EventType::OrderCancelled(ev) => ev.order.order_id.clone(),
        };
        for attempt in 1..=DELIVERY_ATTEMPTS {
            match self.client.post(&self.url).json(&event).send().await.and_then(|r| r.error_for_status()) {
                Ok(_) => {
                    info!("📬️ Notification for order {order_id} delivered");
                    return;
                },
                Err(e) if attempt < DELIVERY_ATTEMPTS => {
                    warn!("📬️ Notification for order {order_id} failed (attempt {attempt}). {e}");
                    tokio::time::sleep(DELIVERY_BACKOFF * attempt).await;
                },
                Err(e) => error!("📬️ Giving up on the notification for order {order_id}. {e}"),
            }
        }
    }
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
