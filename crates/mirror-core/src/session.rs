use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use mirror_platform::display::{DisplayHandle, DisplayMode};
use mirror_platform::screen::PixelBuffer;
use mirror_platform::surface::{MirrorLayout, MirrorTransform, PresentationSurface};

use crate::cadence::{CaptureWorker, FrameHandoff};

/// One active mirror onto one external display
pub(crate) struct MirrorSession {
    pub id: u64,
    pub display: DisplayHandle,
    pub mode: DisplayMode,
    pub layout: MirrorLayout,
    pub transform: MirrorTransform,
    pub fps: u16,
    pub surface: Box<dyn PresentationSurface>,
    /// Most recently presented frame; replaced on every present
    pub frame: Option<PixelBuffer>,
    pub frames_presented: u64,
    pub worker: Option<CaptureWorker>,
    pub handoff_rx: Option<mpsc::Receiver<FrameHandoff>>,
}

impl MirrorSession {
    /// Take ownership of `frame`, dropping the previous one, and show it
    pub fn present(&mut self, frame: PixelBuffer) -> anyhow::Result<()> {
        let frame = self.frame.insert(frame);
        self.surface.present(frame, &self.transform)?;
        self.frames_presented += 1;
        Ok(())
    }

    /// Stop the worker, then release the frame and the surface
    pub fn teardown(mut self, join_timeout: Duration) {
        // dropping the receiver supersedes any frame in flight
        self.handoff_rx = None;
        if let Some(mut worker) = self.worker.take() {
            worker.stop(join_timeout);
        }
        self.frame = None;
        debug!("released surface for session {} on {}", self.id, self.display);
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            display: self.display,
            mode: self.mode,
            scale: self.layout.scale,
            mirror_rect: [
                self.layout.mirror_rect.origin.x,
                self.layout.mirror_rect.origin.y,
                self.layout.mirror_rect.size.width,
                self.layout.mirror_rect.size.height,
            ],
            rotation_degrees: self.transform.rotation.degrees(),
            surface_scale: self.transform.surface_scale,
            fps: self.fps,
            has_frame: self.frame.is_some(),
            frames_presented: self.frames_presented,
        }
    }
}

/// Read-only view of the active session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub id: u64,
    pub display: DisplayHandle,
    pub mode: DisplayMode,
    pub scale: f64,
    /// x, y, width, height on the target surface
    pub mirror_rect: [f64; 4],
    pub rotation_degrees: i32,
    pub surface_scale: f64,
    pub fps: u16,
    pub has_frame: bool,
    pub frames_presented: u64,
}
