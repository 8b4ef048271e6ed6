//! In-process display backend: a hot-pluggable external display, a synthetic
//! main screen and software-rendered output surfaces.

pub mod display;
pub mod events;
pub mod orientation;
pub mod screen;
pub mod surface;

use std::sync::Arc;

use image::Rgba;

use mirror_core::capture::strategy_for;
use mirror_core::config::MirrorConfig;
use mirror_core::controller::Collaborators;
use mirror_platform::display::{DisplayMode, DisplayRegistry};

use crate::display::SimDisplayRegistry;
use crate::events::SimEventBus;
use crate::orientation::SimOrientation;
use crate::screen::SimScreen;
use crate::surface::SoftwareSurfaceProvider;

/// Main display size of the simulated device
pub const MAIN_DISPLAY: DisplayMode = DisplayMode::new(1024, 768);

/// Every simulated collaborator, sharing one event bus
pub struct SimBackend {
    pub bus: Arc<SimEventBus>,
    pub registry: Arc<SimDisplayRegistry>,
    pub orientation: Arc<SimOrientation>,
    pub screen: Arc<SimScreen>,
    pub surfaces: Arc<SoftwareSurfaceProvider>,
}

impl SimBackend {
    pub fn new(config: &MirrorConfig) -> Self {
        let bus = Arc::new(SimEventBus::new());
        let registry = Arc::new(SimDisplayRegistry::new(MAIN_DISPLAY, bus.clone()));
        Self {
            orientation: Arc::new(SimOrientation::new(bus.clone())),
            screen: Arc::new(SimScreen::new(MAIN_DISPLAY, registry.clone())),
            surfaces: Arc::new(SoftwareSurfaceProvider::new(Rgba(config.background))),
            registry,
            bus,
        }
    }

    /// Collaborators for a controller using the configured capture mode
    pub fn collaborators(&self, config: &MirrorConfig) -> Collaborators {
        Collaborators {
            registry: self.registry.clone(),
            surfaces: self.surfaces.clone(),
            orientation: self.orientation.clone(),
            capture: strategy_for(
                config.capture_mode,
                self.screen.clone(),
                self.screen.clone(),
                self.registry.main_display(),
            ),
        }
    }
}
