//! Synthetic main screen.
//!
//! The screen is a stack of layers: an app window showing a moving test
//! pattern, an optional alert window, and a status bar that only the
//! full-screen grabber sees. A second window lives on the external display
//! while one is attached, so window capture has something to exclude.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use image::{imageops, Rgba, RgbaImage};
use tracing::debug;

use mirror_core::raster::from_image;
use mirror_platform::display::{DisplayHandle, DisplayMode, DisplayRegistry};
use mirror_platform::geometry::{Affine, Point, Size};
use mirror_platform::screen::{AppWindow, PixelBuffer, ScreenGrabber, WindowSource};

pub const STATUS_BAR_HEIGHT: u32 = 20;
pub const STATUS_BAR: Rgba<u8> = Rgba([24, 24, 24, 255]);
pub const ALERT_BODY: Rgba<u8> = Rgba([240, 240, 240, 255]);
pub const ALERT_BORDER: Rgba<u8> = Rgba([200, 30, 30, 255]);
/// Fill of the window that lives on the external display
pub const EXTERNAL_WINDOW: Rgba<u8> = Rgba([255, 128, 0, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const SWEEP: Rgba<u8> = Rgba([32, 32, 32, 255]);
const SWEEP_WIDTH: u32 = 6;
/// Sweep speed in pixels per second
const SWEEP_SPEED: u128 = 100;

const BARS: [Rgba<u8>; 7] = [
    Rgba([235, 235, 235, 255]),
    Rgba([235, 235, 16, 255]),
    Rgba([16, 235, 235, 255]),
    Rgba([16, 235, 16, 255]),
    Rgba([235, 16, 235, 255]),
    Rgba([235, 16, 16, 255]),
    Rgba([16, 16, 235, 255]),
];

/// Color bars with a vertical sweep line that advances with `elapsed`
pub fn test_pattern(width: u32, height: u32, elapsed: Duration) -> RgbaImage {
    let sweep_x = if width == 0 {
        0
    } else {
        ((elapsed.as_millis() * SWEEP_SPEED / 1000) % width as u128) as u32
    };
    RgbaImage::from_fn(width, height, |x, _| {
        if x >= sweep_x && x < sweep_x + SWEEP_WIDTH {
            return SWEEP;
        }
        let bar = (x as usize * BARS.len()) / width.max(1) as usize;
        BARS[bar.min(BARS.len() - 1)]
    })
}

struct Layer {
    screen: Option<DisplayHandle>,
    origin: (i64, i64),
    image: RgbaImage,
}

impl Layer {
    fn into_window(self) -> AppWindow {
        let (w, h) = self.image.dimensions();
        AppWindow {
            screen: self.screen,
            center: Point::new(
                self.origin.0 as f64 + w as f64 / 2.0,
                self.origin.1 as f64 + h as f64 / 2.0,
            ),
            bounds: Size::new(w as f64, h as f64),
            anchor: Point::new(0.5, 0.5),
            transform: Affine::IDENTITY,
            content: from_image(self.image),
        }
    }
}

pub struct SimScreen {
    size: DisplayMode,
    registry: Arc<dyn DisplayRegistry>,
    started: Instant,
    alert: AtomicBool,
    /// Fail every Nth capture; 0 never fails
    fail_every: AtomicU64,
    captures: AtomicU64,
}

impl SimScreen {
    pub fn new(size: DisplayMode, registry: Arc<dyn DisplayRegistry>) -> Self {
        Self {
            size,
            registry,
            started: Instant::now(),
            alert: AtomicBool::new(false),
            fail_every: AtomicU64::new(0),
            captures: AtomicU64::new(0),
        }
    }

    pub fn set_alert(&self, visible: bool) {
        self.alert.store(visible, Ordering::Relaxed);
    }

    pub fn set_fail_every(&self, n: u64) {
        self.fail_every.store(n, Ordering::Relaxed);
    }

    fn tick(&self) -> Result<()> {
        let n = self.captures.fetch_add(1, Ordering::Relaxed) + 1;
        let every = self.fail_every.load(Ordering::Relaxed);
        if every > 0 && n % every == 0 {
            debug!("simulated capture failure on capture {}", n);
            bail!("simulated capture failure (capture {})", n);
        }
        Ok(())
    }

    /// Layers on the main display, back to front
    fn main_layers(&self) -> Vec<Layer> {
        let DisplayMode { width, height } = self.size;
        let main = self.registry.main_display();
        let app_height = height.saturating_sub(STATUS_BAR_HEIGHT);

        let mut layers = vec![Layer {
            screen: Some(main),
            origin: (0, STATUS_BAR_HEIGHT as i64),
            image: test_pattern(width, app_height, self.started.elapsed()),
        }];

        if self.alert.load(Ordering::Relaxed) {
            let (w, h) = (width * 2 / 5, height / 4);
            layers.push(Layer {
                // alerts do not report a screen
                screen: None,
                origin: (((width - w) / 2) as i64, ((height - h) / 2) as i64),
                image: alert_window(w, h),
            });
        }
        layers
    }

    fn external_layer(&self) -> Option<Layer> {
        let display = self.registry.external_display()?;
        Some(Layer {
            screen: Some(display),
            origin: (0, 0),
            image: RgbaImage::from_pixel(200, 100, EXTERNAL_WINDOW),
        })
    }
}

fn alert_window(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let edge = x < 3 || y < 3 || x + 3 >= width || y + 3 >= height;
        if edge {
            ALERT_BORDER
        } else {
            ALERT_BODY
        }
    })
}

impl ScreenGrabber for SimScreen {
    fn capture_screen(&self) -> Result<Option<PixelBuffer>> {
        self.tick()?;
        let DisplayMode { width, height } = self.size;
        if width == 0 || height == 0 {
            return Ok(None);
        }

        let mut canvas = RgbaImage::from_pixel(width, height, BLACK);
        for layer in self.main_layers() {
            imageops::replace(&mut canvas, &layer.image, layer.origin.0, layer.origin.1);
        }
        let bar = RgbaImage::from_pixel(width, STATUS_BAR_HEIGHT.min(height), STATUS_BAR);
        imageops::replace(&mut canvas, &bar, 0, 0);

        Ok(Some(from_image(canvas)))
    }
}

impl WindowSource for SimScreen {
    fn windows(&self) -> Result<Vec<AppWindow>> {
        self.tick()?;
        let mut windows: Vec<AppWindow> = self
            .main_layers()
            .into_iter()
            .map(Layer::into_window)
            .collect();
        if let Some(external) = self.external_layer() {
            windows.insert(0, external.into_window());
        }
        Ok(windows)
    }

    fn canvas_size(&self) -> Size {
        self.size.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::SimDisplayRegistry;
    use crate::events::SimEventBus;
    use mirror_core::capture::{CaptureStrategy, FullScreenCapture, WindowCapture};
    use mirror_core::raster::to_image;

    fn screen() -> (Arc<SimDisplayRegistry>, Arc<SimScreen>) {
        let main = DisplayMode::new(1024, 768);
        let registry = Arc::new(SimDisplayRegistry::new(main, Arc::new(SimEventBus::new())));
        let screen = Arc::new(SimScreen::new(main, registry.clone()));
        (registry, screen)
    }

    fn capture(strategy: &dyn CaptureStrategy) -> RgbaImage {
        let frame = strategy.capture().unwrap().unwrap();
        to_image(&frame).unwrap()
    }

    #[test]
    fn test_pattern_sweep_advances() {
        let at = |ms| {
            let img = test_pattern(700, 10, Duration::from_millis(ms));
            (0..700).find(|&x| *img.get_pixel(x, 5) == SWEEP)
        };
        assert_eq!(at(0), Some(0));
        assert_eq!(at(1000), Some(100));
        assert_eq!(at(7500), Some(50));
    }

    #[test]
    fn test_status_bar_only_in_full_screen_capture() {
        let (registry, screen) = screen();
        let full = capture(&FullScreenCapture::new(screen.clone()));
        assert_eq!(full.dimensions(), (1024, 768));
        assert_eq!(*full.get_pixel(5, 5), STATUS_BAR);

        let windowed = capture(&WindowCapture::new(screen, registry.main_display()));
        assert_eq!(*windowed.get_pixel(5, 5), BLACK);
        assert_ne!(*windowed.get_pixel(5, 100), BLACK);
    }

    #[test]
    fn test_window_capture_excludes_external_window() {
        let (registry, screen) = screen();
        registry.connect(vec![DisplayMode::new(1920, 1080)]).unwrap();

        let windows = screen.windows().unwrap();
        assert_eq!(windows.len(), 2);
        assert_ne!(windows[0].screen, Some(registry.main_display()));

        let windowed = capture(&WindowCapture::new(screen, registry.main_display()));
        assert!(windowed.pixels().all(|p| *p != EXTERNAL_WINDOW));
    }

    #[test]
    fn test_alert_visible_to_both_strategies() {
        let (registry, screen) = screen();
        screen.set_alert(true);

        let full = capture(&FullScreenCapture::new(screen.clone()));
        assert_eq!(*full.get_pixel(512, 384), ALERT_BODY);
        let windowed = capture(&WindowCapture::new(screen.clone(), registry.main_display()));
        assert_eq!(*windowed.get_pixel(512, 384), ALERT_BODY);

        screen.set_alert(false);
        let full = capture(&FullScreenCapture::new(screen));
        assert_ne!(*full.get_pixel(512, 384), ALERT_BODY);
    }

    #[test]
    fn test_fail_every_nth_capture() {
        let (_, screen) = screen();
        screen.set_fail_every(3);
        let results: Vec<bool> = (0..6).map(|_| screen.capture_screen().is_ok()).collect();
        assert_eq!(results, vec![true, true, false, true, true, false]);
    }
}
