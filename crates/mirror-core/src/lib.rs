//! Mirroring of the main display onto an attached external display.

pub mod cadence;
pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod layout;
pub mod raster;
pub mod session;
pub mod stats;

#[cfg(test)]
mod testing;

pub use config::{CadencePolicy, CaptureMode, MirrorConfig};
pub use controller::{Collaborators, MirrorController, MirrorState, TickOutcome};
pub use error::MirrorError;
pub use host::{HostHandle, MirrorHost, Notice};
