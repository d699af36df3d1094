//! Fulfilment Engine
//!
//! The fulfilment engine keeps local orders and stock in step with what a payment gateway reports. It is
//! provider-agnostic: the gateway, the backing store and the customer notifier are all traits.
//!
//! The library is divided into these sections:
//! 1. Translation of gateway status codes into a closed set of payment states ([`mod@status_translator`]) and the
//!    rules for which order transitions are legal ([`mod@order_state`]).
//! 2. The storage traits ([`mod@traits`]) and their SQLite implementation. You should never need to access the database
//!    directly. The exception is the data types used in the database, which are defined in [`mod@db_types`].
//! 3. The public API ([`mod@fp_api`]). [`ReconciliationApi`] turns webhook deliveries into committed state changes, and
//!    [`CheckoutApi`] creates orders and opens their payments.
//!
//! Customer notifications are dispatched through a small actor framework in [`mod@events`], so that you can hook in
//! e-mail, a webhook relay or anything else without touching the reconciliation flow.
pub mod db_types;
pub mod events;
pub mod fp_api;
pub mod helpers;
pub mod order_state;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod status_translator;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use fp_api::{
    checkout_api::{CheckoutApi, CheckoutResult},
    errors::{CheckoutError, ReconciliationError},
    reconciliation_api::{ReconciliationApi, ReconciliationConfig},
    reconciliation_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
