//! Maps the gateway's numeric status vocabulary onto [`PaymentState`].
//!
//! The gateway reports payment status as a small integer, serialized as a number in query responses and sometimes as
//! a string in notifications. [`translate`] is the only place in the crate where those codes are interpreted. It is
//! total: anything it does not recognise becomes [`PaymentState::Unknown`].
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::OrderState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentState {
    NotFinished,
    Authorized,
    Confirmed,
    Denied,
    Voided,
    Refunded,
    Pending,
    Aborted,
    Scheduled,
    Unknown,
}

const STATUS_TABLE: [(&str, PaymentState); 9] = [
    ("0", PaymentState::NotFinished),
    ("1", PaymentState::Authorized),
    ("2", PaymentState::Confirmed),
    ("3", PaymentState::Denied),
    ("10", PaymentState::Voided),
    ("11", PaymentState::Refunded),
    ("12", PaymentState::Pending),
    ("13", PaymentState::Aborted),
    ("20", PaymentState::Scheduled),
];

/// Translates a provider status code. Surrounding whitespace is ignored.
pub fn translate(provider_code: &str) -> PaymentState {
    let code = provider_code.trim();
    STATUS_TABLE.iter().find(|(c, _)| *c == code).map(|(_, s)| *s).unwrap_or(PaymentState::Unknown)
}

pub fn translate_code(code: i64) -> PaymentState {
    translate(&code.to_string())
}

impl PaymentState {
    /// The order state this payment state drives the order towards. `Unknown` has no target.
    pub fn target_order_state(&self) -> Option<OrderState> {
        match self {
            Self::NotFinished | Self::Authorized | Self::Pending | Self::Scheduled => Some(OrderState::Processing),
            Self::Confirmed => Some(OrderState::Confirmed),
            Self::Denied | Self::Aborted => Some(OrderState::Denied),
            Self::Voided => Some(OrderState::Voided),
            Self::Refunded => Some(OrderState::Refunded),
            Self::Unknown => None,
        }
    }
}

impl Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotFinished => "NotFinished",
            Self::Authorized => "Authorized",
            Self::Confirmed => "Confirmed",
            Self::Denied => "Denied",
            Self::Voided => "Voided",
            Self::Refunded => "Refunded",
            Self::Pending => "Pending",
            Self::Aborted => "Aborted",
            Self::Scheduled => "Scheduled",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}
