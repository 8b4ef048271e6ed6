use mirror_platform::display::DisplayHandle;
use thiserror::Error;

/// Failures of the mirror pipeline. None of them are fatal to the host application.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// No secondary display attached when mirroring was requested
    #[error("no external display detected")]
    NoExternalDisplay,

    /// The external display advertised no modes to pick from
    #[error("{0} advertises no display modes")]
    NoDisplayModes(DisplayHandle),

    /// The main display reported empty bounds
    #[error("main display bounds are empty")]
    InvalidSourceBounds,

    /// A display registry or surface call failed
    #[error("display error: {0:#}")]
    Display(#[source] anyhow::Error),

    /// The output surface could not be created or updated
    #[error("surface error: {0:#}")]
    Surface(#[source] anyhow::Error),

    /// A capture tick produced no pixels
    #[error("capture produced no pixels")]
    CaptureUnavailable,

    /// A frame arrived for a session that is no longer active
    #[error("frame for session {session} arrived while {active:?} is active")]
    PresentationRace { session: u64, active: Option<u64> },

    /// The background capture thread could not be spawned
    #[error("failed to spawn capture worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MirrorError>;
