use std::sync::{Arc, Mutex};

use tracing::debug;

use mirror_platform::events::MirrorEvent;
use mirror_platform::orientation::{DeviceOrientation, OrientationSensor};

use crate::events::SimEventBus;

/// Orientation sensor driven by the demo; changes are published on the bus
pub struct SimOrientation {
    current: Mutex<DeviceOrientation>,
    bus: Arc<SimEventBus>,
}

impl SimOrientation {
    pub fn new(bus: Arc<SimEventBus>) -> Self {
        Self {
            current: Mutex::new(DeviceOrientation::Portrait),
            bus,
        }
    }

    /// Returns false when the device already had this orientation
    pub fn set(&self, orientation: DeviceOrientation) -> bool {
        {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            if *current == orientation {
                return false;
            }
            debug!("device orientation {:?} -> {:?}", *current, orientation);
            *current = orientation;
        }
        self.bus.publish(MirrorEvent::OrientationChanged(orientation));
        true
    }
}

impl OrientationSensor for SimOrientation {
    fn current(&self) -> DeviceOrientation {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
