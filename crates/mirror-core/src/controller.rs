//! Mirror loop controller. Owns the single mirror session and drives the
//! capture, transform and present cycle.
//!
//! Every method here is expected to be called from the UI-affine context.
//! The only work that leaves that context is frame capture on the
//! background worker, which never touches session state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mirror_platform::display::{DisplayHandle, DisplayRegistry};
use mirror_platform::events::MirrorEvent;
use mirror_platform::orientation::{DeviceOrientation, OrientationSensor};
use mirror_platform::screen::PixelBuffer;
use mirror_platform::surface::SurfaceProvider;

use crate::cadence::{CaptureWorker, FrameHandoff, WorkerParams};
use crate::capture::CaptureStrategy;
use crate::config::{CadencePolicy, MirrorConfig};
use crate::error::{MirrorError, Result};
use crate::layout;
use crate::session::{MirrorSession, SessionInfo};
use crate::stats::{MirrorStats, StatsCounters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorState {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Result of one capture tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Presented,
    /// No pixels this tick; the next tick retries
    Skipped,
    /// The frame belonged to a session that has ended
    Discarded,
    /// No session is running
    Inactive,
}

/// External services the controller is built against
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn DisplayRegistry>,
    pub surfaces: Arc<dyn SurfaceProvider>,
    pub orientation: Arc<dyn OrientationSensor>,
    pub capture: Arc<dyn CaptureStrategy>,
}

pub struct MirrorController {
    deps: Collaborators,
    config: MirrorConfig,
    safe_mode: bool,
    state: MirrorState,
    session: Option<MirrorSession>,
    next_session_id: u64,
    stats: Arc<StatsCounters>,
}

impl MirrorController {
    pub fn new(deps: Collaborators, config: MirrorConfig) -> Self {
        Self {
            deps,
            safe_mode: config.safe_mode,
            config,
            state: MirrorState::Idle,
            session: None,
            next_session_id: 1,
            stats: Arc::new(StatsCounters::default()),
        }
    }

    /// Build a fresh session on the external display, replacing any active one
    pub fn start(&mut self) -> Result<()> {
        let Some(target) = self.deps.registry.external_display() else {
            warn!("mirroring requested but no external display is attached");
            return Err(MirrorError::NoExternalDisplay);
        };

        if self.session.is_some() {
            // reconnected cable or mode change
            info!("mirror already active, restarting on {}", target);
            self.stop();
        }

        self.state = MirrorState::Starting;
        let session = match self.build_session(target) {
            Ok(s) => s,
            Err(e) => {
                self.state = MirrorState::Idle;
                return Err(e);
            }
        };

        info!(
            "mirror session {} on {} at {} (scale {:.5}, rect {:?}, surface {}, rotation {}°)",
            session.id,
            target,
            session.mode,
            session.layout.scale,
            session.layout.mirror_rect,
            session.transform.surface_scale,
            session.transform.rotation.degrees()
        );

        self.session = Some(session);
        self.state = MirrorState::Running;
        self.stats.session_started();

        self.capture_and_present_once();

        if let Err(e) = self.launch_cadence() {
            self.stop();
            return Err(e);
        }

        Ok(())
    }

    fn build_session(&mut self, display: DisplayHandle) -> Result<MirrorSession> {
        let registry = &self.deps.registry;

        let modes = registry.modes_of(display).map_err(MirrorError::Display)?;
        let mode = layout::select_mode(&modes).ok_or(MirrorError::NoDisplayModes(display))?;
        registry
            .set_active_mode(display, mode)
            .map_err(MirrorError::Display)?;

        let source = registry
            .bounds(registry.main_display())
            .map_err(MirrorError::Display)?;
        let mirror_layout =
            layout::compute_layout(source, mode.size()).ok_or(MirrorError::InvalidSourceBounds)?;

        let transform = layout::initial_transform(self.safe_mode, self.deps.orientation.current());

        let mut surface = self
            .deps
            .surfaces
            .create_surface(display, mode, &mirror_layout)
            .map_err(MirrorError::Surface)?;
        surface.set_surface_scale(transform.surface_scale, false);
        surface.set_content_rotation(transform.rotation, false);

        let id = self.next_session_id;
        self.next_session_id += 1;

        Ok(MirrorSession {
            id,
            display,
            mode,
            layout: mirror_layout,
            transform,
            fps: self.config.fps.max(1),
            surface,
            frame: None,
            frames_presented: 0,
            worker: None,
            handoff_rx: None,
        })
    }

    fn launch_cadence(&mut self) -> Result<()> {
        if self.config.cadence != CadencePolicy::BackgroundThread {
            return Ok(());
        }
        let interval = self.config.frame_interval();
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        // single slot: at most one frame waits for presentation
        let (tx, rx) = mpsc::channel(1);
        let worker = CaptureWorker::spawn(WorkerParams {
            session: session.id,
            strategy: self.deps.capture.clone(),
            interval,
            handoff: tx,
            stats: self.stats.clone(),
        })
        .map_err(MirrorError::WorkerSpawn)?;

        session.worker = Some(worker);
        session.handoff_rx = Some(rx);
        Ok(())
    }

    /// Halt the cadence and release the surface and frame. Safe to repeat.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            self.state = MirrorState::Idle;
            return;
        };

        self.state = MirrorState::Stopping;
        let id = session.id;
        session.teardown(self.config.join_timeout());
        self.state = MirrorState::Idle;
        info!("mirror session {} stopped", id);
    }

    /// Switch between the TV-safe inset and the overscan zoom
    pub fn set_safe_mode(&mut self, enabled: bool) {
        let changed = self.safe_mode != enabled;
        self.safe_mode = enabled;

        if !changed {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            let scale = layout::surface_scale(enabled);
            session.transform.surface_scale = scale;
            session.surface.set_surface_scale(scale, true);
            debug!("safe mode {} → surface scale {}", enabled, scale);
        }
    }

    /// Rotate mirrored content to follow the device
    pub fn on_orientation_changed(&mut self, orientation: DeviceOrientation) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let rotation = layout::rotation_for(orientation);
        if session.transform.rotation == rotation {
            return;
        }
        session.transform.rotation = rotation;
        session.surface.set_content_rotation(rotation, true);
        debug!("orientation {:?} → rotation {}°", orientation, rotation.degrees());
    }

    /// One cadence tick on the UI context: capture, replace the held frame, present
    pub fn capture_and_present_once(&mut self) -> TickOutcome {
        if self.state != MirrorState::Running || self.session.is_none() {
            return TickOutcome::Inactive;
        }

        let frame = match self.deps.capture.capture() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("{}", MirrorError::CaptureUnavailable);
                self.stats.tick_skipped();
                return TickOutcome::Skipped;
            }
            Err(e) => {
                debug!("capture failed: {:#}", e);
                self.stats.tick_skipped();
                return TickOutcome::Skipped;
            }
        };

        self.present(frame)
    }

    /// Present a frame captured by the background worker, unless its session has ended
    pub fn present_handoff(&mut self, handoff: FrameHandoff) -> TickOutcome {
        let (session_id, frame, done) = handoff.into_parts();

        let active = self.session.as_ref().map(|s| s.id);
        if self.state != MirrorState::Running || active != Some(session_id) {
            debug!(
                "{}",
                MirrorError::PresentationRace {
                    session: session_id,
                    active
                }
            );
            self.stats.frame_discarded();
            return TickOutcome::Discarded;
        }

        let outcome = self.present(frame);
        let _ = done.send(());
        outcome
    }

    fn present(&mut self, frame: PixelBuffer) -> TickOutcome {
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Inactive;
        };
        match session.present(frame) {
            Ok(()) => {
                self.stats.frame_presented();
                TickOutcome::Presented
            }
            Err(e) => {
                warn!("{}", MirrorError::Surface(e));
                self.stats.tick_skipped();
                TickOutcome::Skipped
            }
        }
    }

    /// Next frame from the background worker. Pending while nothing can arrive.
    pub async fn next_handoff(&mut self) -> FrameHandoff {
        let rx = self.session.as_mut().and_then(|s| s.handoff_rx.as_mut());
        match rx {
            Some(rx) => match rx.recv().await {
                Some(handoff) => handoff,
                None => std::future::pending().await,
            },
            None => std::future::pending().await,
        }
    }

    /// Typed dispatch of platform events
    pub fn handle_event(&mut self, event: MirrorEvent) -> Result<()> {
        match event {
            MirrorEvent::DisplayConnected | MirrorEvent::DisplayModeChanged => self.start(),
            MirrorEvent::DisplayDisconnected => {
                self.stop();
                Ok(())
            }
            MirrorEvent::OrientationChanged(orientation) => {
                self.on_orientation_changed(orientation);
                Ok(())
            }
        }
    }

    pub fn state(&self) -> MirrorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == MirrorState::Running
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }

    pub fn cadence(&self) -> CadencePolicy {
        self.config.cadence
    }

    pub fn frame_interval(&self) -> Duration {
        self.config.frame_interval()
    }

    pub fn active_session_count(&self) -> usize {
        usize::from(self.session.is_some())
    }

    pub fn session(&self) -> Option<SessionInfo> {
        self.session.as_ref().map(MirrorSession::info)
    }

    pub fn stats(&self) -> MirrorStats {
        self.stats.snapshot()
    }
}

impl Drop for MirrorController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use mirror_platform::display::DisplayMode;
    use mirror_platform::geometry::Rect;
    use mirror_platform::surface::Rotation;

    fn timer_config() -> MirrorConfig {
        MirrorConfig {
            cadence: CadencePolicy::UiTimer,
            ..MirrorConfig::default()
        }
    }

    #[test]
    fn test_start_without_external_display_fails() {
        let rig = Rig::new(vec![]);
        let mut ctl = rig.controller(timer_config());

        assert!(matches!(ctl.start(), Err(MirrorError::NoExternalDisplay)));
        assert_eq!(ctl.state(), MirrorState::Idle);
        assert_eq!(ctl.active_session_count(), 0);
        assert_eq!(rig.surfaces.created(), 0);
        assert_eq!(ctl.stats().sessions_started, 0);
    }

    #[test]
    fn test_start_builds_session() {
        let rig = Rig::new(vec![
            DisplayMode::new(640, 480),
            DisplayMode::new(1920, 1080),
            DisplayMode::new(1280, 720),
        ]);
        let mut ctl = rig.controller(timer_config());
        ctl.start().unwrap();

        assert_eq!(ctl.state(), MirrorState::Running);
        let info = ctl.session().unwrap();
        assert_eq!(info.display, EXTERNAL);
        assert_eq!(info.mode, DisplayMode::new(1920, 1080));
        assert_eq!(rig.registry.active_mode(), Some(DisplayMode::new(1920, 1080)));
        assert_eq!(info.scale, 1.40625);
        assert_eq!(info.mirror_rect, [240.0, 0.0, 1440.0, 1080.0]);
        assert_eq!(info.surface_scale, 1.25);
        assert_eq!(info.rotation_degrees, 0);
        // initial frame is presented right away
        assert!(info.has_frame);
        assert_eq!(rig.surfaces.presents(), 1);
    }

    #[test]
    fn test_start_uses_safe_mode_and_orientation() {
        let rig = Rig::new(vec![DisplayMode::new(720, 480)]);
        rig.orientation.set(DeviceOrientation::LandscapeLeft);
        let mut ctl = rig.controller(MirrorConfig {
            safe_mode: true,
            ..timer_config()
        });
        ctl.start().unwrap();

        let last = rig.surfaces.last_surface().unwrap();
        assert_eq!(last.scale, 0.8);
        assert_eq!(last.rotation, Rotation::Clockwise90);
        assert_eq!(last.layout.unwrap().mirror_rect, Rect::new(40.0, 0.0, 640.0, 480.0));
    }

    #[test]
    fn test_restart_disposes_old_session_first() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(timer_config());

        ctl.start().unwrap();
        let first = ctl.session().unwrap().id;
        ctl.start().unwrap();
        let second = ctl.session().unwrap().id;

        assert_ne!(first, second);
        assert_eq!(rig.surfaces.created(), 2);
        assert_eq!(rig.surfaces.live(), 1);
        assert_eq!(ctl.active_session_count(), 1);
    }

    #[test]
    fn test_at_most_one_session_for_any_start_stop_sequence() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(timer_config());

        let ops = [1u8, 1, 0, 0, 1, 0, 1, 1, 1, 0, 1];
        for op in ops {
            if op == 1 {
                ctl.start().unwrap();
            } else {
                ctl.stop();
            }
            assert!(ctl.active_session_count() <= 1);
            assert!(rig.surfaces.live() <= 1);
            assert_eq!(rig.surfaces.live(), ctl.active_session_count());
        }
        assert_eq!(ctl.stats().sessions_started, 7);
    }

    #[test]
    fn test_failed_start_keeps_running_session() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(timer_config());
        ctl.start().unwrap();
        let id = ctl.session().unwrap().id;

        rig.registry.detach();
        assert!(matches!(ctl.start(), Err(MirrorError::NoExternalDisplay)));
        assert_eq!(ctl.session().unwrap().id, id);
        assert!(ctl.is_running());
    }

    #[test]
    fn test_start_with_no_modes() {
        let rig = Rig::new(vec![]);
        rig.registry.attach(vec![]);
        let mut ctl = rig.controller(timer_config());
        assert!(matches!(ctl.start(), Err(MirrorError::NoDisplayModes(EXTERNAL))));
        assert_eq!(ctl.state(), MirrorState::Idle);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(timer_config());

        ctl.stop();
        assert_eq!(ctl.state(), MirrorState::Idle);

        ctl.start().unwrap();
        ctl.stop();
        let after_first = (ctl.state(), ctl.stats(), rig.surfaces.live());
        ctl.stop();
        assert_eq!((ctl.state(), ctl.stats(), rig.surfaces.live()), after_first);
        assert_eq!(ctl.state(), MirrorState::Idle);
        assert!(ctl.session().is_none());
    }

    #[test]
    fn test_safe_mode_toggle_rescales_without_recapture() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        rig.orientation.set(DeviceOrientation::LandscapeRight);
        let mut ctl = rig.controller(timer_config());
        ctl.start().unwrap();
        let captures = rig.capture.calls();
        let presents = rig.surfaces.presents();

        ctl.set_safe_mode(true);
        let info = ctl.session().unwrap();
        assert_eq!(info.surface_scale, 0.8);
        assert_eq!(info.rotation_degrees, -90);
        assert_eq!(rig.surfaces.last_surface().unwrap().scale_animations, vec![0.8]);

        ctl.set_safe_mode(false);
        assert_eq!(ctl.session().unwrap().surface_scale, 1.25);
        assert_eq!(ctl.session().unwrap().rotation_degrees, -90);

        assert_eq!(rig.capture.calls(), captures);
        assert_eq!(rig.surfaces.presents(), presents);
        assert_eq!(rig.surfaces.created(), 1);
    }

    #[test]
    fn test_safe_mode_without_session_is_state_only() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(timer_config());
        ctl.set_safe_mode(true);
        assert!(ctl.safe_mode());
        assert_eq!(rig.surfaces.created(), 0);

        ctl.start().unwrap();
        assert_eq!(ctl.session().unwrap().surface_scale, 0.8);
    }

    #[test]
    fn test_orientation_changes_rotation() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(timer_config());
        ctl.start().unwrap();

        ctl.on_orientation_changed(DeviceOrientation::LandscapeLeft);
        assert_eq!(ctl.session().unwrap().rotation_degrees, 90);
        assert_eq!(
            rig.surfaces.last_surface().unwrap().rotation,
            Rotation::Clockwise90
        );

        ctl.on_orientation_changed(DeviceOrientation::Portrait);
        assert_eq!(ctl.session().unwrap().rotation_degrees, 0);
        assert_eq!(rig.surfaces.last_surface().unwrap().rotation, Rotation::Identity);
    }

    #[test]
    fn test_orientation_without_session_is_ignored() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(timer_config());
        ctl.on_orientation_changed(DeviceOrientation::LandscapeLeft);
        assert!(ctl.session().is_none());
    }

    #[test]
    fn test_disconnect_then_connect_builds_fresh_session() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(timer_config());
        ctl.handle_event(MirrorEvent::DisplayConnected).unwrap();
        assert!(ctl.session().unwrap().has_frame);

        rig.registry.detach();
        ctl.handle_event(MirrorEvent::DisplayDisconnected).unwrap();
        assert_eq!(ctl.state(), MirrorState::Idle);
        assert!(ctl.session().is_none());
        assert_eq!(rig.surfaces.live(), 0);

        rig.registry.attach(vec![DisplayMode::new(800, 600), DisplayMode::new(1024, 768)]);
        ctl.handle_event(MirrorEvent::DisplayConnected).unwrap();
        let info = ctl.session().unwrap();
        assert_eq!(info.mode, DisplayMode::new(1024, 768));
        assert_eq!(rig.registry.active_mode(), Some(DisplayMode::new(1024, 768)));
    }

    #[test]
    fn test_mode_change_restarts() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(timer_config());
        ctl.start().unwrap();

        rig.registry.attach(vec![DisplayMode::new(1920, 1080)]);
        ctl.handle_event(MirrorEvent::DisplayModeChanged).unwrap();
        assert_eq!(ctl.session().unwrap().mode, DisplayMode::new(1920, 1080));
        assert_eq!(ctl.session().unwrap().id, 2);
        assert_eq!(rig.surfaces.live(), 1);
    }

    #[test]
    fn test_alternating_capture_skips_empty_ticks() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        rig.capture.alternate();
        let mut ctl = rig.controller(timer_config());
        ctl.start().unwrap(); // tick 0 presents

        let outcomes: Vec<TickOutcome> = (0..4).map(|_| ctl.capture_and_present_once()).collect();
        assert_eq!(
            outcomes,
            vec![
                TickOutcome::Skipped,
                TickOutcome::Presented,
                TickOutcome::Skipped,
                TickOutcome::Presented
            ]
        );
        assert!(ctl.is_running());
        let stats = ctl.stats();
        assert_eq!(stats.frames_presented, 3);
        assert_eq!(stats.ticks_skipped, 2);
    }

    #[test]
    fn test_tick_without_session_is_inactive() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(timer_config());
        assert_eq!(ctl.capture_and_present_once(), TickOutcome::Inactive);
        assert_eq!(rig.capture.calls(), 0);
    }

    #[test]
    fn test_stale_handoff_is_discarded() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(timer_config());
        ctl.start().unwrap();
        let old = ctl.session().unwrap().id;
        ctl.start().unwrap();
        let presents = rig.surfaces.presents();

        let (handoff, mut done) = FrameHandoff::new(old, solid_frame());
        assert_eq!(ctl.present_handoff(handoff), TickOutcome::Discarded);
        assert_eq!(rig.surfaces.presents(), presents);
        assert_eq!(ctl.stats().frames_discarded, 1);
        // superseded frames never signal completion
        assert!(done.try_recv().is_err());

        let current = ctl.session().unwrap().id;
        let (handoff, mut done) = FrameHandoff::new(current, solid_frame());
        assert_eq!(ctl.present_handoff(handoff), TickOutcome::Presented);
        assert!(done.try_recv().is_ok());
    }

    #[test]
    fn test_handoff_after_stop_is_discarded() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(timer_config());
        ctl.start().unwrap();
        let id = ctl.session().unwrap().id;
        ctl.stop();

        let (handoff, _done) = FrameHandoff::new(id, solid_frame());
        assert_eq!(ctl.present_handoff(handoff), TickOutcome::Discarded);
    }

    #[test]
    fn test_background_cadence_delivers_frames() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(MirrorConfig {
            fps: 100,
            cadence: CadencePolicy::BackgroundThread,
            ..MirrorConfig::default()
        });
        ctl.start().unwrap();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            for _ in 0..3 {
                let handoff = tokio::time::timeout(Duration::from_secs(5), ctl.next_handoff())
                    .await
                    .unwrap();
                assert_eq!(ctl.present_handoff(handoff), TickOutcome::Presented);
            }
        });

        assert!(ctl.stats().frames_presented >= 4);
        ctl.stop();
        assert_eq!(ctl.state(), MirrorState::Idle);
        assert_eq!(rig.surfaces.live(), 0);
    }

    fn background_config() -> MirrorConfig {
        MirrorConfig {
            fps: 100,
            cadence: CadencePolicy::BackgroundThread,
            ..MirrorConfig::default()
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
    }

    /// Captures made on the worker thread of `session`
    fn captures_for(rig: &Rig, session: u64) -> usize {
        let name = format!("mirror-capture-{}", session);
        rig.capture.threads().iter().filter(|t| **t == name).count()
    }

    fn present_from_worker(rt: &tokio::runtime::Runtime, ctl: &mut MirrorController, n: usize) {
        let expected = ctl.session().unwrap().id;
        rt.block_on(async {
            for _ in 0..n {
                let handoff = tokio::time::timeout(Duration::from_secs(5), ctl.next_handoff())
                    .await
                    .unwrap();
                assert_eq!(handoff.session, expected);
                assert_eq!(ctl.present_handoff(handoff), TickOutcome::Presented);
            }
        });
    }

    #[test]
    fn test_background_restart_joins_old_worker_first() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(background_config());
        let rt = runtime();

        ctl.start().unwrap();
        let first = ctl.session().unwrap().id;
        let handoff = rt.block_on(async {
            tokio::time::timeout(Duration::from_secs(5), ctl.next_handoff())
                .await
                .unwrap()
        });
        // keep the frame but release the worker
        let (held_for, held, done) = handoff.into_parts();
        assert_eq!(held_for, first);
        drop(done);

        ctl.start().unwrap();
        let second = ctl.session().unwrap().id;
        assert_ne!(first, second);
        assert_eq!(ctl.active_session_count(), 1);
        assert_eq!(rig.surfaces.live(), 1);

        // the old worker is joined once start returns
        let old_captures = captures_for(&rig, first);
        assert!(old_captures >= 1);

        let (late, _done) = FrameHandoff::new(first, held);
        assert_eq!(ctl.present_handoff(late), TickOutcome::Discarded);
        assert_eq!(ctl.stats().frames_discarded, 1);

        present_from_worker(&rt, &mut ctl, 3);
        assert_eq!(captures_for(&rig, first), old_captures);
        assert!(captures_for(&rig, second) >= 3);

        ctl.stop();
        assert_eq!(rig.surfaces.live(), 0);
    }

    #[test]
    fn test_background_at_most_one_session_for_any_start_stop_sequence() {
        let rig = Rig::new(vec![DisplayMode::new(1280, 720)]);
        let mut ctl = rig.controller(background_config());
        let rt = runtime();

        // (session, captures when it ended)
        let mut ended: Vec<(u64, usize)> = Vec::new();
        let ops = [1u8, 1, 0, 0, 1, 0, 1, 1, 1, 0, 1];
        for op in ops {
            let before = ctl.session().map(|s| s.id);
            if op == 1 {
                ctl.start().unwrap();
            } else {
                ctl.stop();
            }
            let after = ctl.session().map(|s| s.id);

            assert!(ctl.active_session_count() <= 1);
            assert_eq!(rig.surfaces.live(), ctl.active_session_count());
            if let Some(id) = before.filter(|id| Some(*id) != after) {
                ended.push((id, captures_for(&rig, id)));
            }

            if after.is_some() {
                present_from_worker(&rt, &mut ctl, 2);
            }
            for (id, captures) in &ended {
                assert_eq!(captures_for(&rig, *id), *captures, "session {} still capturing", id);
            }
        }
        assert_eq!(ctl.stats().sessions_started, 7);
        assert_eq!(ended.len(), 6);

        ctl.stop();
        assert_eq!(rig.surfaces.live(), 0);
    }
}
