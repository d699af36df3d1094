//! # Cielo tools
//!
//! A thin client for the Cielo e-commerce REST API (API 3.0). Only the calls the fulfillment pipeline needs are
//! implemented:
//!
//! * creating a sale (`POST /1/sales`),
//! * querying a sale by payment id, or the payment ids linked to a merchant order id,
//! * capturing and voiding a sale.
//!
//! Transport and provider faults are folded into three buckets (see [`CieloApiError`]): the provider declined the
//! request, the provider was temporarily unreachable, or the provider answered with something we could not parse.
//! Only the second kind is retried, via [`with_retry`].
mod api;
mod config;
pub mod data_objects;
mod error;
mod retry;

pub use api::CieloApi;
pub use config::CieloConfig;
pub use data_objects::{CieloPayment, CieloTransaction, CieloTransactionRequest};
pub use error::CieloApiError;
pub use retry::{with_retry, RetryPolicy};
