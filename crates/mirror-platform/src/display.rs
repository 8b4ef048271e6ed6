use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::geometry::Size;

/// Opaque identifier of an attached display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisplayHandle(pub u32);

impl fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "display#{}", self.0)
    }
}

/// A resolution advertised by a display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayMode {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl DisplayMode {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

pub trait DisplayRegistry: Send + Sync {
    /// The display the application draws on
    fn main_display(&self) -> DisplayHandle;

    /// All attached displays, in enumeration order
    fn list_displays(&self) -> Vec<DisplayHandle>;

    /// Logical bounds of a display in points
    fn bounds(&self, display: DisplayHandle) -> Result<Size>;

    /// Advertised modes of a display, in enumeration order
    fn modes_of(&self, display: DisplayHandle) -> Result<Vec<DisplayMode>>;

    /// Switch a display to one of its advertised modes
    fn set_active_mode(&self, display: DisplayHandle, mode: DisplayMode) -> Result<()>;

    /// First attached display that is not the main display
    fn external_display(&self) -> Option<DisplayHandle> {
        let main = self.main_display();
        self.list_displays().into_iter().find(|d| *d != main)
    }
}
