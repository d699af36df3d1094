//! Bounded event queues between the reconciliation engine and the notification hooks.
//!
//! Each event type gets one [`EventHandler`] owning the receiving end of a bounded channel and any number of
//! [`EventProducer`]s. Hooks only ever see the event itself. Every event is handled in its own task, so a slow
//! delivery does not hold up the queue.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("The event queue is full")]
    QueueFull,
    #[error("The event handler has shut down")]
    Closed,
}

pub struct EventHandler<E: Send + Sync + 'static> {
    queue: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, queue) = mpsc::channel(buffer_size);
        Self { queue, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for the in-flight deliveries to finish.
    pub async fn start_handler(self) {
        let Self { mut queue, sender, handler } = self;
        // Only producers keep the channel open from here on
        drop(sender);
        debug!("📬️ Event handler started");
        let mut deliveries = JoinSet::new();
        while let Some(ev) = queue.recv().await {
            trace!("📬️ Dispatching event");
            deliveries.spawn((handler)(ev));
            // reap finished deliveries so the set does not grow without bound
            while let Some(done) = deliveries.try_join_next() {
                if let Err(e) = done {
                    error!("📬️ An event hook panicked. {e}");
                }
            }
        }
        debug!("📬️ All producers are gone. Waiting for {} deliveries", deliveries.len());
        while let Some(done) = deliveries.join_next().await {
            if let Err(e) = done {
                error!("📬️ An event hook panicked. {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Waits for room in the queue.
    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }

    /// Queues the event without waiting. Fails if the queue is full or the handler has gone away.
    pub fn try_publish_event(&self, event: E) -> Result<(), PublishError> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PublishError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
        })
    }
}
