//! Capture strategies that turn the main display into a single pixel buffer.

use std::sync::Arc;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use tracing::{debug, trace};

use mirror_platform::display::DisplayHandle;
use mirror_platform::geometry::Affine;
use mirror_platform::screen::{AppWindow, PixelBuffer, ScreenGrabber, WindowSource};

use crate::config::CaptureMode;
use crate::raster;

/// Produces one composited image of the main display's current state.
/// Called from the capture thread or the UI context.
pub trait CaptureStrategy: Send + Sync {
    /// `Ok(None)` when no pixels are available this tick
    fn capture(&self) -> Result<Option<PixelBuffer>>;

    fn name(&self) -> &'static str;
}

/// Samples all visual layers through the platform grabber
pub struct FullScreenCapture {
    grabber: Arc<dyn ScreenGrabber>,
}

impl FullScreenCapture {
    pub fn new(grabber: Arc<dyn ScreenGrabber>) -> Self {
        Self { grabber }
    }
}

impl CaptureStrategy for FullScreenCapture {
    fn capture(&self) -> Result<Option<PixelBuffer>> {
        let frame = self.grabber.capture_screen().context("full screen grab failed")?;
        Ok(frame.filter(|f| !f.is_empty()))
    }

    fn name(&self) -> &'static str {
        "full-screen"
    }
}

/// Composites the application's windows that belong to the main display
pub struct WindowCapture {
    source: Arc<dyn WindowSource>,
    main_display: DisplayHandle,
}

impl WindowCapture {
    pub fn new(source: Arc<dyn WindowSource>, main_display: DisplayHandle) -> Self {
        Self {
            source,
            main_display,
        }
    }

    fn belongs_to_main(&self, window: &AppWindow) -> bool {
        window.screen.map_or(true, |screen| screen == self.main_display)
    }
}

/// Window pixel coordinates → main display coordinates
fn window_affine(window: &AppWindow, content_w: u32, content_h: u32) -> Affine {
    let bounds = window.bounds;
    Affine::scale(
        bounds.width / content_w.max(1) as f64,
        bounds.height / content_h.max(1) as f64,
    )
    .then(&Affine::translation(
        -(bounds.width * window.anchor.x),
        -(bounds.height * window.anchor.y),
    ))
    .then(&window.transform)
    .then(&Affine::translation(window.center.x, window.center.y))
}

impl CaptureStrategy for WindowCapture {
    fn capture(&self) -> Result<Option<PixelBuffer>> {
        let canvas_size = self.source.canvas_size();
        if canvas_size.is_empty() {
            return Ok(None);
        }

        let windows = self.source.windows().context("failed to enumerate windows")?;
        let mut canvas = RgbaImage::from_pixel(
            canvas_size.width.round() as u32,
            canvas_size.height.round() as u32,
            Rgba([0, 0, 0, 255]),
        );

        let mut drawn = 0usize;
        for window in &windows {
            if !self.belongs_to_main(window) {
                trace!("skipping window on {:?}", window.screen);
                continue;
            }
            let Some(content) = raster::to_image(&window.content) else {
                continue;
            };
            let m = window_affine(window, content.width(), content.height());
            raster::draw_transformed(&mut canvas, &content, &m);
            drawn += 1;
        }

        if drawn == 0 {
            debug!("no main display windows to composite ({} listed)", windows.len());
            return Ok(None);
        }

        Ok(Some(raster::from_image(canvas)))
    }

    fn name(&self) -> &'static str {
        "window"
    }
}

/// Build the strategy selected by `mode`
pub fn strategy_for(
    mode: CaptureMode,
    grabber: Arc<dyn ScreenGrabber>,
    windows: Arc<dyn WindowSource>,
    main_display: DisplayHandle,
) -> Arc<dyn CaptureStrategy> {
    match mode {
        CaptureMode::FullScreen => Arc::new(FullScreenCapture::new(grabber)),
        CaptureMode::Window => Arc::new(WindowCapture::new(windows, main_display)),
    }
}
