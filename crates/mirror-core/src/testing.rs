//! In-crate fakes of the platform collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};

use mirror_platform::display::{DisplayHandle, DisplayMode, DisplayRegistry};
use mirror_platform::events::{EventCallback, EventSource, MirrorEvent, SubscriptionId};
use mirror_platform::geometry::Size;
use mirror_platform::orientation::{DeviceOrientation, OrientationSensor};
use mirror_platform::screen::PixelBuffer;
use mirror_platform::surface::{
    MirrorLayout, MirrorTransform, PresentationSurface, Rotation, SurfaceProvider,
};

use crate::capture::CaptureStrategy;
use crate::config::MirrorConfig;
use crate::controller::{Collaborators, MirrorController};

pub const MAIN: DisplayHandle = DisplayHandle(0);
pub const EXTERNAL: DisplayHandle = DisplayHandle(1);

pub fn solid_frame() -> PixelBuffer {
    PixelBuffer::new(2, 2, vec![200; 16])
}

#[derive(Default)]
pub struct FakeRegistry {
    external: Mutex<Option<Vec<DisplayMode>>>,
    active: Mutex<Option<DisplayMode>>,
}

impl FakeRegistry {
    pub fn attach(&self, modes: Vec<DisplayMode>) {
        *self.external.lock().unwrap() = Some(modes);
    }

    pub fn detach(&self) {
        *self.external.lock().unwrap() = None;
    }

    pub fn active_mode(&self) -> Option<DisplayMode> {
        *self.active.lock().unwrap()
    }
}

impl DisplayRegistry for FakeRegistry {
    fn main_display(&self) -> DisplayHandle {
        MAIN
    }

    fn list_displays(&self) -> Vec<DisplayHandle> {
        let mut displays = vec![MAIN];
        if self.external.lock().unwrap().is_some() {
            displays.push(EXTERNAL);
        }
        displays
    }

    fn bounds(&self, display: DisplayHandle) -> Result<Size> {
        if display != MAIN {
            bail!("only main bounds are known");
        }
        Ok(Size::new(1024.0, 768.0))
    }

    fn modes_of(&self, display: DisplayHandle) -> Result<Vec<DisplayMode>> {
        match (display, self.external.lock().unwrap().as_ref()) {
            (EXTERNAL, Some(modes)) => Ok(modes.clone()),
            _ => bail!("{} is not attached", display),
        }
    }

    fn set_active_mode(&self, _display: DisplayHandle, mode: DisplayMode) -> Result<()> {
        *self.active.lock().unwrap() = Some(mode);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeOrientation(Mutex<DeviceOrientation>);

impl FakeOrientation {
    pub fn set(&self, orientation: DeviceOrientation) {
        *self.0.lock().unwrap() = orientation;
    }
}

impl OrientationSensor for FakeOrientation {
    fn current(&self) -> DeviceOrientation {
        *self.0.lock().unwrap()
    }
}

/// Capture that always succeeds, or alternates frame / nothing
#[derive(Default)]
pub struct FakeCapture {
    calls: AtomicUsize,
    alternate: AtomicBool,
    threads: Mutex<Vec<String>>,
}

impl FakeCapture {
    pub fn alternate(&self) {
        self.alternate.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Name of the thread behind each capture, in call order
    pub fn threads(&self) -> Vec<String> {
        self.threads.lock().unwrap().clone()
    }
}

impl CaptureStrategy for FakeCapture {
    fn capture(&self) -> Result<Option<PixelBuffer>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let name = std::thread::current().name().unwrap_or("").to_string();
        self.threads.lock().unwrap().push(name);
        if self.alternate.load(Ordering::SeqCst) && n % 2 == 1 {
            return Ok(None);
        }
        Ok(Some(solid_frame()))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Debug, Clone, Default)]
pub struct SurfaceRecord {
    pub layout: Option<MirrorLayout>,
    pub scale: f64,
    pub rotation: Rotation,
    pub scale_animations: Vec<f64>,
    pub last_transform: Option<MirrorTransform>,
}

#[derive(Default)]
pub struct FakeSurfaces {
    created: AtomicUsize,
    live: Arc<AtomicUsize>,
    presents: Arc<AtomicUsize>,
    last: Mutex<Option<Arc<Mutex<SurfaceRecord>>>>,
}

impl FakeSurfaces {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn presents(&self) -> usize {
        self.presents.load(Ordering::SeqCst)
    }

    pub fn last_surface(&self) -> Option<SurfaceRecord> {
        let last = self.last.lock().unwrap();
        last.as_ref().map(|r| r.lock().unwrap().clone())
    }
}

struct FakeSurface {
    record: Arc<Mutex<SurfaceRecord>>,
    live: Arc<AtomicUsize>,
    presents: Arc<AtomicUsize>,
}

impl PresentationSurface for FakeSurface {
    fn present(&mut self, _frame: &PixelBuffer, transform: &MirrorTransform) -> Result<()> {
        self.presents.fetch_add(1, Ordering::SeqCst);
        self.record.lock().unwrap().last_transform = Some(*transform);
        Ok(())
    }

    fn set_surface_scale(&mut self, scale: f64, animated: bool) {
        let mut record = self.record.lock().unwrap();
        record.scale = scale;
        if animated {
            record.scale_animations.push(scale);
        }
    }

    fn set_content_rotation(&mut self, rotation: Rotation, _animated: bool) {
        self.record.lock().unwrap().rotation = rotation;
    }
}

impl Drop for FakeSurface {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SurfaceProvider for FakeSurfaces {
    fn create_surface(
        &self,
        _display: DisplayHandle,
        _mode: DisplayMode,
        layout: &MirrorLayout,
    ) -> Result<Box<dyn PresentationSurface>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        let record = Arc::new(Mutex::new(SurfaceRecord {
            layout: Some(*layout),
            ..SurfaceRecord::default()
        }));
        *self.last.lock().unwrap() = Some(record.clone());
        Ok(Box::new(FakeSurface {
            record,
            live: self.live.clone(),
            presents: self.presents.clone(),
        }))
    }
}

#[derive(Default)]
pub struct FakeEvents {
    next: AtomicUsize,
    callbacks: Mutex<Vec<(SubscriptionId, EventCallback)>>,
}

impl FakeEvents {
    pub fn publish(&self, event: MirrorEvent) {
        for (_, callback) in self.callbacks.lock().unwrap().iter() {
            callback(event);
        }
    }

    pub fn subscribers(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }
}

impl EventSource for FakeEvents {
    fn subscribe(&self, callback: EventCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next.fetch_add(1, Ordering::SeqCst) as u64);
        self.callbacks.lock().unwrap().push((id, callback));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.callbacks.lock().unwrap().retain(|(i, _)| *i != id);
    }
}

/// A full set of fakes with one external display attached
pub struct Rig {
    pub registry: Arc<FakeRegistry>,
    pub surfaces: Arc<FakeSurfaces>,
    pub orientation: Arc<FakeOrientation>,
    pub capture: Arc<FakeCapture>,
    pub events: Arc<FakeEvents>,
}

impl Rig {
    /// An empty `modes` list means no external display
    pub fn new(modes: Vec<DisplayMode>) -> Self {
        let registry = Arc::new(FakeRegistry::default());
        if !modes.is_empty() {
            registry.attach(modes);
        }
        Self {
            registry,
            surfaces: Arc::new(FakeSurfaces::default()),
            orientation: Arc::new(FakeOrientation::default()),
            capture: Arc::new(FakeCapture::default()),
            events: Arc::new(FakeEvents::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            registry: self.registry.clone(),
            surfaces: self.surfaces.clone(),
            orientation: self.orientation.clone(),
            capture: self.capture.clone(),
        }
    }

    pub fn controller(&self, config: MirrorConfig) -> MirrorController {
        MirrorController::new(self.collaborators(), config)
    }
}
