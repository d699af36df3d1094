//! A keyed async mutex. Each order id gets its own lock, so reconciliations of different orders never wait on each
//! other. Map entries are removed as soon as nobody holds or waits for them.
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex},
};

use log::*;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::db_types::OrderId;

type LockTable = Arc<Mutex<HashMap<OrderId, Arc<AsyncMutex<()>>>>>;

#[derive(Clone, Default)]
pub struct OrderLocks {
    locks: LockTable,
}

impl Debug for OrderLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderLocks({} entries)", self.len())
    }
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the lock for `order_id` is free and takes it.
    pub async fn lock(&self, order_id: &OrderId) -> OrderLockGuard {
        let mutex = self.entry(order_id);
        let guard = mutex.lock_owned().await;
        trace!("🔒️ Lock acquired for order {order_id}");
        OrderLockGuard { order_id: order_id.clone(), locks: Arc::clone(&self.locks), guard: Some(guard) }
    }

    /// Takes the lock for `order_id` if it is free right now.
    pub fn try_lock(&self, order_id: &OrderId) -> Option<OrderLockGuard> {
        let mutex = self.entry(order_id);
        let guard = mutex.try_lock_owned().ok();
        match guard {
            Some(guard) => {
                Some(OrderLockGuard { order_id: order_id.clone(), locks: Arc::clone(&self.locks), guard: Some(guard) })
            },
            None => None,
        }
    }

    /// The number of orders that are currently locked or being waited on.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, order_id: &OrderId) -> Arc<AsyncMutex<()>> {
        let mut table = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(table.entry(order_id.clone()).or_default())
    }
}

pub struct OrderLockGuard {
    order_id: OrderId,
    locks: LockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Debug for OrderLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderLockGuard({})", self.order_id)
    }
}

impl Drop for OrderLockGuard {
    fn drop(&mut self) {
        // Release the mutex before inspecting the table, so our own guard does not count as a reference.
        drop(self.guard.take());
        let mut table = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let unused = table.get(&self.order_id).map(|m| Arc::strong_count(m) == 1).unwrap_or(false);
        if unused {
            table.remove(&self.order_id);
        }
        trace!("🔓️ Lock released for order {}", self.order_id);
    }
}
