//! In-process event bus standing in for the platform notification center.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use mirror_platform::events::{EventCallback, EventSource, MirrorEvent, SubscriptionId};

type SharedCallback = Arc<dyn Fn(MirrorEvent) + Send + Sync>;

#[derive(Default)]
pub struct SimEventBus {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, SharedCallback)>>,
}

impl SimEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every subscriber, in subscription order
    pub fn publish(&self, event: MirrorEvent) {
        // callbacks run without the lock so they may (un)subscribe
        let callbacks: Vec<SharedCallback> = match self.subscribers.lock() {
            Ok(subs) => subs.iter().map(|(_, cb)| cb.clone()).collect(),
            Err(poisoned) => poisoned.into_inner().iter().map(|(_, cb)| cb.clone()).collect(),
        };
        trace!("publishing {:?} to {} subscriber(s)", event, callbacks.len());
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl EventSource for SimEventBus {
    fn subscribe(&self, callback: EventCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push((id, Arc::from(callback)));
        }
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|(sub, _)| *sub != id);
        }
    }
}
