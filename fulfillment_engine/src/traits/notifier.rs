use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancellationReason {
    Denied,
    Voided,
    Refunded,
}

impl Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Denied => f.write_str("denied"),
            Self::Voided => f.write_str("voided"),
            Self::Refunded => f.write_str("refunded"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Notification could not be dispatched. {0}")]
pub struct NotificationError(pub String);

/// Customer notification dispatch. Implementations must not block on delivery; the reconciliation engine calls these
/// after the transition has been committed.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn notify_confirmed(&self, order: &Order) -> Result<(), NotificationError>;

    async fn notify_cancelled(&self, order: &Order, reason: CancellationReason) -> Result<(), NotificationError>;
}
