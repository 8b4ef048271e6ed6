//! Hot-pluggable display registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use tracing::info;

use mirror_platform::display::{DisplayHandle, DisplayMode, DisplayRegistry};
use mirror_platform::events::MirrorEvent;
use mirror_platform::geometry::Size;

use crate::events::SimEventBus;

const MAIN: DisplayHandle = DisplayHandle(0);

#[derive(Default)]
struct RegistryState {
    /// Attached external display and the modes it advertises
    external: Option<(DisplayHandle, Vec<DisplayMode>)>,
    active: HashMap<DisplayHandle, DisplayMode>,
    next_id: u32,
}

/// Main display plus at most one external display that can be plugged and unplugged
pub struct SimDisplayRegistry {
    main_size: DisplayMode,
    state: Mutex<RegistryState>,
    bus: Arc<SimEventBus>,
}

impl SimDisplayRegistry {
    pub fn new(main_size: DisplayMode, bus: Arc<SimEventBus>) -> Self {
        Self {
            main_size,
            state: Mutex::new(RegistryState {
                next_id: 1,
                ..RegistryState::default()
            }),
            bus,
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach an external display advertising `modes`
    pub fn connect(&self, modes: Vec<DisplayMode>) -> Result<DisplayHandle> {
        let handle = {
            let mut state = self.state();
            if let Some((existing, _)) = &state.external {
                bail!("{} is already connected", existing);
            }
            let handle = DisplayHandle(state.next_id);
            state.next_id += 1;
            info!("{} connected with modes {}", handle, format_modes(&modes));
            state.external = Some((handle, modes));
            handle
        };
        self.bus.publish(MirrorEvent::DisplayConnected);
        Ok(handle)
    }

    /// Detach the external display. Returns whether one was attached.
    pub fn disconnect(&self) -> bool {
        let removed = {
            let mut state = self.state();
            let removed = state.external.take();
            if let Some((handle, _)) = &removed {
                state.active.remove(handle);
                info!("{} disconnected", handle);
            }
            removed.is_some()
        };
        if removed {
            self.bus.publish(MirrorEvent::DisplayDisconnected);
        }
        removed
    }

    /// Replace the modes advertised by the attached external display
    pub fn change_modes(&self, modes: Vec<DisplayMode>) -> Result<()> {
        {
            let mut state = self.state();
            let RegistryState { external, active, .. } = &mut *state;
            let (handle, current) = external.as_mut().context("no external display connected")?;
            info!("{} now advertises {}", handle, format_modes(&modes));
            if active.get(handle).is_some_and(|m| !modes.contains(m)) {
                active.remove(handle);
            }
            *current = modes;
        }
        self.bus.publish(MirrorEvent::DisplayModeChanged);
        Ok(())
    }

    pub fn active_mode(&self, display: DisplayHandle) -> Option<DisplayMode> {
        if display == MAIN {
            return Some(self.main_size);
        }
        self.state().active.get(&display).copied()
    }
}

impl DisplayRegistry for SimDisplayRegistry {
    fn main_display(&self) -> DisplayHandle {
        MAIN
    }

    fn list_displays(&self) -> Vec<DisplayHandle> {
        let mut displays = vec![MAIN];
        if let Some((handle, _)) = &self.state().external {
            displays.push(*handle);
        }
        displays
    }

    fn bounds(&self, display: DisplayHandle) -> Result<Size> {
        if display == MAIN {
            return Ok(self.main_size.size());
        }
        let state = self.state();
        match &state.external {
            Some((handle, modes)) if *handle == display => state
                .active
                .get(handle)
                .or_else(|| modes.first())
                .map(DisplayMode::size)
                .with_context(|| format!("{} advertises no modes", display)),
            _ => bail!("{} is not attached", display),
        }
    }

    fn modes_of(&self, display: DisplayHandle) -> Result<Vec<DisplayMode>> {
        if display == MAIN {
            return Ok(vec![self.main_size]);
        }
        match &self.state().external {
            Some((handle, modes)) if *handle == display => Ok(modes.clone()),
            _ => bail!("{} is not attached", display),
        }
    }

    fn set_active_mode(&self, target: DisplayHandle, mode: DisplayMode) -> Result<()> {
        if target == MAIN {
            bail!("the main display mode is fixed");
        }
        let mut state = self.state();
        match &state.external {
            Some((handle, modes)) if *handle == target => {
                if !modes.contains(&mode) {
                    bail!("{} does not advertise {}", target, mode);
                }
            }
            _ => bail!("{} is not attached", target),
        }
        state.active.insert(target, mode);
        info!("{} switched to {}", target, mode);
        Ok(())
    }
}

fn format_modes(modes: &[DisplayMode]) -> String {
    if modes.is_empty() {
        return "(none)".to_string();
    }
    modes.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
