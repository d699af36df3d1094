use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Anomaly, Order, OrderId, OrderItem, OrderState, PaymentEvent, StockMovement},
    status_translator::PaymentState,
    traits::{CancellationReason, GatewayStatusUpdate},
};

/// The notification that was dispatched for a committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notified {
    Confirmed,
    Cancelled(CancellationReason),
    /// The new state does not warrant a customer notification
    NotRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermanentFailure {
    /// The webhook body could not be parsed, or had no payment id
    MalformedPayload(String),
    /// No local order matches the gateway transaction
    UnknownOrder(String),
    GatewayRejected(String),
    GatewayMalformed(String),
}

impl Display for PermanentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedPayload(s) => write!(f, "Malformed payload. {s}"),
            Self::UnknownOrder(s) => write!(f, "Unknown order. {s}"),
            Self::GatewayRejected(s) => write!(f, "The gateway rejected the lookup. {s}"),
            Self::GatewayMalformed(s) => write!(f, "The gateway response was malformed. {s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationResult {
    /// The transition was applied and the notification (if any) was dispatched
    Committed { order: Order, from: OrderState, notification: Notified },
    /// The transition was applied, but the notification could not be dispatched
    CommittedNotificationFailed { order: Order, from: OrderState, reason: String },
    /// The gateway re-signalled the current state. The event was recorded; the order is untouched.
    Unchanged { order: Order },
    /// This (transaction, status) pair has been processed before
    AlreadyProcessed { order_id: OrderId },
    /// The event needs manual review. Nothing was changed.
    AnomalyRecorded(Anomaly),
    /// Nothing was changed, and the provider should redeliver later
    RetryLater(String),
    /// Nothing was changed, and redelivery will not help
    PermanentFailure(PermanentFailure),
    Unauthorized,
}

impl ReconciliationResult {
    /// True if the state of the order is final as far as this delivery is concerned, i.e. the provider should not
    /// redeliver it.
    pub fn is_acknowledged(&self) -> bool {
        matches!(
            self,
            Self::Committed { .. } |
                Self::CommittedNotificationFailed { .. } |
                Self::Unchanged { .. } |
                Self::AlreadyProcessed { .. }
        )
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Committed { order, from, .. } => {
                format!("Order {} moved from {from} to {}", order.order_id, order.status)
            },
            Self::CommittedNotificationFailed { order, from, reason } => format!(
                "Order {} moved from {from} to {}, but the notification failed. {reason}",
                order.order_id, order.status
            ),
            Self::Unchanged { order } => format!("Order {} is already {}", order.order_id, order.status),
            Self::AlreadyProcessed { order_id } => format!("Event for order {order_id} was already processed"),
            Self::AnomalyRecorded(a) => format!("{} recorded for review. {}", a.kind, a.detail),
            Self::RetryLater(reason) => format!("Try again later. {reason}"),
            Self::PermanentFailure(f) => f.to_string(),
            Self::Unauthorized => "Unauthorized".to_string(),
        }
    }
}

/// Tallies of a stale-order sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResult {
    pub examined: usize,
    pub committed: usize,
    pub unchanged: usize,
    pub anomalies: usize,
    pub retry_later: usize,
    pub failed: usize,
}

impl SweepResult {
    pub fn tally(&mut self, result: &ReconciliationResult) {
        self.examined += 1;
        match result {
            ReconciliationResult::Committed { .. } | ReconciliationResult::CommittedNotificationFailed { .. } => {
                self.committed += 1
            },
            ReconciliationResult::Unchanged { .. } | ReconciliationResult::AlreadyProcessed { .. } => {
                self.unchanged += 1
            },
            ReconciliationResult::AnomalyRecorded(_) => self.anomalies += 1,
            ReconciliationResult::RetryLater(_) => self.retry_later += 1,
            ReconciliationResult::PermanentFailure(_) | ReconciliationResult::Unauthorized => self.failed += 1,
        }
    }
}

/// Everything the back-office wants to see about one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub movements: Vec<StockMovement>,
    pub payment_events: Vec<PaymentEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaymentStatusQuery {
    ByPaymentId { payment_id: String },
    ByMerchantOrderId { merchant_order_id: OrderId },
}

/// The gateway's current view of a transaction, next to ours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub payment_id: String,
    pub merchant_order_id: Option<OrderId>,
    pub status_code: String,
    pub payment_state: PaymentState,
    pub order_state: Option<OrderState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentAction {
    Capture,
    Void,
}

impl Display for PaymentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capture => f.write_str("Capture"),
            Self::Void => f.write_str("Void"),
        }
    }
}

/// What the gateway said to an operator capture or void, and what reconciling the transaction afterwards did to the
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentActionResult {
    pub action: PaymentAction,
    pub update: GatewayStatusUpdate,
    pub reconciliation: ReconciliationResult,
}
