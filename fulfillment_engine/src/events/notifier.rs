use log::*;

use crate::{
    db_types::Order,
    events::{EventProducers, OrderCancelledEvent, OrderConfirmedEvent},
    traits::{CancellationReason, NotificationError, Notifier},
};

/// A [`Notifier`] that hands notifications to the event hooks. Delivery happens in the hook's own task; this only
/// fails if an event could not be queued.
#[derive(Clone, Default)]
pub struct EventNotifier {
    producers: EventProducers,
}

impl EventNotifier {
    pub fn new(producers: EventProducers) -> Self {
        Self { producers }
    }
}

impl Notifier for EventNotifier {
    async fn notify_confirmed(&self, order: &Order) -> Result<(), NotificationError> {
        for producer in &self.producers.order_confirmed_producer {
            debug!("📬️ Queueing confirmation for order {}", order.order_id);
            producer
                .try_publish_event(OrderConfirmedEvent::new(order.clone()))
                .map_err(|e| NotificationError(e.to_string()))?;
        }
        Ok(())
    }

    async fn notify_cancelled(&self, order: &Order, reason: CancellationReason) -> Result<(), NotificationError> {
        for producer in &self.producers.order_cancelled_producer {
            debug!("📬️ Queueing cancellation ({reason}) for order {}", order.order_id);
            producer
                .try_publish_event(OrderCancelledEvent::new(order.clone(), reason))
                .map_err(|e| NotificationError(e.to_string()))?;
        }
        Ok(())
    }
}
