use crate::orientation::DeviceOrientation;

/// Hardware notifications the mirror reacts to. Delivered on the UI-affine context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorEvent {
    DisplayConnected,
    DisplayDisconnected,
    DisplayModeChanged,
    OrientationChanged(DeviceOrientation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

pub type EventCallback = Box<dyn Fn(MirrorEvent) + Send + Sync>;

pub trait EventSource: Send + Sync {
    /// Register a callback for every event kind
    fn subscribe(&self, callback: EventCallback) -> SubscriptionId;

    /// Remove a callback. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}
