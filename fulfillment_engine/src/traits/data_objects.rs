use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId, OrderState, StockMovement},
    helpers::OrderLockGuard,
    order_state::StockEffect,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub customer_id: Option<String>,
    pub payment_transaction_id: Option<String>,
    #[serde(default)]
    pub states: Vec<OrderState>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_payment_transaction_id<S: Into<String>>(mut self, payment_id: S) -> Self {
        self.payment_transaction_id = Some(payment_id.into());
        self
    }

    pub fn with_state(mut self, state: OrderState) -> Self {
        self.states.push(state);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.customer_id.is_none() &&
            self.payment_transaction_id.is_none() &&
            self.states.is_empty()
    }
}

/// An order read while holding its per-order lock. The lock is released when this value is dropped.
#[derive(Debug)]
pub struct LockedOrder {
    order: Order,
    _guard: OrderLockGuard,
}

impl LockedOrder {
    pub fn new(order: Order, guard: OrderLockGuard) -> Self {
        Self { order, _guard: guard }
    }

    pub fn order(&self) -> &Order {
        &self.order
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasResult {
    Swapped(Order),
    /// The stored version did not match the expected version. Nothing was written.
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovementResult {
    Applied(StockMovement),
    /// A movement for the same order, product and direction is already in the ledger. It is returned unchanged.
    AlreadyApplied(StockMovement),
}

impl MovementResult {
    pub fn movement(&self) -> &StockMovement {
        match self {
            Self::Applied(m) | Self::AlreadyApplied(m) => m,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertEventResult {
    Inserted(crate::db_types::PaymentEvent),
    AlreadyExists,
}

/// Everything needed to commit one accepted state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCommit {
    pub order_id: OrderId,
    pub expected_version: i64,
    pub new_state: OrderState,
    /// The gateway transaction. It is attached to the order if the order has none yet.
    pub payment_id: String,
    pub provider_status: String,
    pub payload_hash: Option<String>,
    pub stock_effect: StockEffect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { order: Order, movements: Vec<StockMovement> },
    /// The order version moved on. Nothing was written.
    Conflict,
    /// The idempotency record already exists. Nothing was written.
    DuplicateEvent,
}
