//! The order state machine.
//!
//! | From \ To  | Processing | Confirmed | Denied | Voided | Refunded |
//! |------------|------------|-----------|--------|--------|----------|
//! | Created    | ✓          | ✓         | ✓      | ✓      | ✗        |
//! | Processing | =          | ✓         | ✓      | ✓      | ✗        |
//! | Confirmed  | ✗          | =         | ✗      | ✓ (R)  | ✓ (R)    |
//! | Denied     | ✗          | ✗         | =      | ✗      | ✗        |
//! | Voided     | ✗          | ✗         | ✗      | =      | ✗        |
//! | Refunded   | ✗          | ✗         | ✗      | ✗      | =        |
//!
//! `=` is a re-signal of the current state and leaves the order untouched. `(R)` edges return the stock that was
//! taken when the order was confirmed.
use crate::db_types::OrderState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The order moves to a new state
    Apply { from: OrderState, to: OrderState },
    /// The order is already in the target state
    Unchanged(OrderState),
    /// The edge is forbidden
    Illegal { from: OrderState, to: OrderState },
}

/// What happens to the stock ledger when a transition is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    None,
    /// Take each ordered quantity out of stock
    Decrement,
    /// Return exactly what was decremented for this order
    Reverse,
}

pub fn evaluate(from: OrderState, to: OrderState) -> Transition {
    use OrderState::*;
    if from == to {
        return Transition::Unchanged(from);
    }
    let legal = match from {
        Created => matches!(to, Processing | Confirmed | Denied | Voided),
        Processing => matches!(to, Confirmed | Denied | Voided),
        Confirmed => matches!(to, Refunded | Voided),
        Denied | Voided | Refunded => false,
    };
    if legal {
        Transition::Apply { from, to }
    } else {
        Transition::Illegal { from, to }
    }
}

pub fn stock_effect(from: OrderState, to: OrderState) -> StockEffect {
    use OrderState::*;
    match (from, to) {
        (Created | Processing, Confirmed) => StockEffect::Decrement,
        (Confirmed, Refunded | Voided) => StockEffect::Reverse,
        _ => StockEffect::None,
    }
}
