//! The public face of the fulfilment engine.
//!
//! * [`reconciliation_api::ReconciliationApi`] turns gateway notifications into order state transitions, stock
//!   movements and customer notifications, exactly once.
//! * [`checkout_api::CheckoutApi`] is the boundary checkout calls to create an order and its gateway transaction.
pub mod checkout_api;
pub mod errors;
pub mod reconciliation_api;
pub mod reconciliation_objects;
