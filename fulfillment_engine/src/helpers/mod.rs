mod bearer;
mod order_locks;
mod payload;

pub use bearer::{bearer_token, constant_time_eq};
pub use order_locks::{OrderLockGuard, OrderLocks};
pub use payload::payload_hash;
