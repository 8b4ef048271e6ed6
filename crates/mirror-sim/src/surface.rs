//! Software output surfaces that rasterize what the external display would show.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use tracing::{debug, info};

use mirror_core::raster::render_mirror;
use mirror_platform::display::{DisplayHandle, DisplayMode};
use mirror_platform::screen::PixelBuffer;
use mirror_platform::surface::{
    MirrorLayout, MirrorTransform, PresentationSurface, Rotation, SurfaceProvider,
};

#[derive(Default)]
struct Output {
    latest: Mutex<Option<RgbaImage>>,
    presents: AtomicU64,
    live: AtomicUsize,
}

pub struct SoftwareSurfaceProvider {
    background: Rgba<u8>,
    output: Arc<Output>,
}

impl SoftwareSurfaceProvider {
    pub fn new(background: Rgba<u8>) -> Self {
        Self {
            background,
            output: Arc::new(Output::default()),
        }
    }

    /// Last image shown on any live surface
    pub fn latest(&self) -> Option<RgbaImage> {
        self.output
            .latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn presents(&self) -> u64 {
        self.output.presents.load(Ordering::Relaxed)
    }

    pub fn live_surfaces(&self) -> usize {
        self.output.live.load(Ordering::Relaxed)
    }

    /// Write the latest output image as a PNG
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let image = self.latest().context("no surface output to save")?;
        image
            .save(path)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        info!("saved {}x{} snapshot to {}", image.width(), image.height(), path.display());
        Ok(())
    }
}

impl SurfaceProvider for SoftwareSurfaceProvider {
    fn create_surface(
        &self,
        target: DisplayHandle,
        mode: DisplayMode,
        layout: &MirrorLayout,
    ) -> Result<Box<dyn PresentationSurface>> {
        self.output.live.fetch_add(1, Ordering::Relaxed);
        info!("created {} surface on {}", mode, target);
        Ok(Box::new(SoftwareSurface {
            display: target,
            layout: *layout,
            transform: MirrorTransform {
                rotation: Rotation::Identity,
                surface_scale: 1.0,
            },
            background: self.background,
            output: self.output.clone(),
        }))
    }
}

pub struct SoftwareSurface {
    display: DisplayHandle,
    layout: MirrorLayout,
    /// Transform last applied through the setters
    transform: MirrorTransform,
    background: Rgba<u8>,
    output: Arc<Output>,
}

impl PresentationSurface for SoftwareSurface {
    fn present(&mut self, frame: &PixelBuffer, transform: &MirrorTransform) -> Result<()> {
        self.transform = *transform;
        let image = render_mirror(frame, &self.layout, transform, self.background)
            .context("frame has no pixels to present")?;
        *self.output.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(image);
        self.output.presents.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn set_surface_scale(&mut self, scale: f64, animated: bool) {
        if animated {
            info!(
                "{}: animating surface scale {} -> {}",
                self.display, self.transform.surface_scale, scale
            );
        } else {
            debug!("{}: surface scale {}", self.display, scale);
        }
        self.transform.surface_scale = scale;
    }

    fn set_content_rotation(&mut self, rotation: Rotation, animated: bool) {
        if animated {
            info!(
                "{}: animating content rotation {}° -> {}°",
                self.display,
                self.transform.rotation.degrees(),
                rotation.degrees()
            );
        } else {
            debug!("{}: content rotation {}°", self.display, rotation.degrees());
        }
        self.transform.rotation = rotation;
    }
}

impl Drop for SoftwareSurface {
    fn drop(&mut self) {
        self.output.live.fetch_sub(1, Ordering::Relaxed);
        *self.output.latest.lock().unwrap_or_else(|e| e.into_inner()) = None;
        debug!("{}: surface released", self.display);
    }
}
