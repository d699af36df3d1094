use serde::{Deserialize, Serialize};

use crate::{db_types::Order, traits::CancellationReason};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmedEvent {
    pub order: Order,
}

impl OrderConfirmedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
    pub reason: CancellationReason,
}

impl OrderCancelledEvent {
    pub fn new(order: Order, reason: CancellationReason) -> Self {
        Self { order, reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventType {
    OrderConfirmed(OrderConfirmedEvent),
    OrderCancelled(OrderCancelledEvent),
}
