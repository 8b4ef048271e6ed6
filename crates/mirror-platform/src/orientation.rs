use serde::{Deserialize, Serialize};

/// Physical orientation of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceOrientation {
    #[default]
    Unknown,
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
}

pub trait OrientationSensor: Send + Sync {
    /// Last orientation reported by the device
    fn current(&self) -> DeviceOrientation;
}
