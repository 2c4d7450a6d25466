//! Named-channel event bus.
//!
//! Producers publish [`LpEvent`]s; components subscribe a handler to a channel
//! at startup. Each delivered event runs on its own task, so events for
//! different keys interleave freely and ordering for one key is left to locks.

mod events;

pub use events::*;

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receives events from one channel.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: LpEvent);
}

pub struct EventBus {
    channels: DashMap<&'static str, broadcast::Sender<LpEvent>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, channel: &'static str) -> broadcast::Sender<LpEvent> {
        self.channels
            .entry(channel)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publishes on the event's channel; returns how many subscribers received it.
    pub fn publish(&self, event: LpEvent) -> usize {
        let channel = event.channel();
        match self.sender(channel).send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(channel, "Event published with no subscribers");
                0
            }
        }
    }

    pub fn receiver(&self, channel: &'static str) -> broadcast::Receiver<LpEvent> {
        self.sender(channel).subscribe()
    }

    /// Dispatches every event on `channel` to `handler` until the bus is dropped.
    pub fn subscribe(
        &self,
        channel: &'static str,
        handler: Arc<dyn EventHandler>,
    ) -> JoinHandle<()> {
        let mut rx = self.receiver(channel);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let handler = handler.clone();
                        tokio::spawn(async move { handler.handle(event).await });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(channel, skipped, "Subscriber lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(channel, "Event channel closed");
        })
    }
}
