//! Adapters between the engine's traits and the outside world.
pub mod cielo;
pub mod notifications;

pub use cielo::CieloGateway;
pub use notifications::create_notification_handlers;
