//! UI-affine event loop that owns the mirror controller.
//!
//! Platform events, user toggles, frames from the capture worker and the UI
//! timer are all funnelled into one `select!` loop, so controller state has
//! a single writer.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use mirror_platform::display::{DisplayHandle, DisplayMode};
use mirror_platform::events::{EventSource, MirrorEvent, SubscriptionId};

use crate::config::CadencePolicy;
use crate::controller::{MirrorController, MirrorState};
use crate::error::MirrorError;
use crate::session::SessionInfo;
use crate::stats::MirrorStats;

/// Requests from the user-facing controls
#[derive(Debug)]
pub enum UserControl {
    /// "enable mirroring" toggle
    SetMirroring(bool),
    /// "safe mode" toggle
    SetSafeMode(bool),
    Status(oneshot::Sender<HostStatus>),
    Shutdown,
}

/// User-visible outcomes
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    DisplayConnected,
    DisplayDisconnected,
    DisplayModeChanged,
    MirroringStarted { display: DisplayHandle, mode: DisplayMode },
    MirroringStopped,
    StartFailed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct HostStatus {
    pub running: bool,
    pub safe_mode: bool,
    pub session: Option<SessionInfo>,
    pub stats: MirrorStats,
}

/// Callback registration on an event source, removed on drop
pub struct Subscription {
    source: Arc<dyn EventSource>,
    id: SubscriptionId,
}

impl Subscription {
    /// Forward every event from `source` into `tx`
    pub fn forward(source: Arc<dyn EventSource>, tx: mpsc::UnboundedSender<MirrorEvent>) -> Self {
        let id = source.subscribe(Box::new(move |event| {
            let _ = tx.send(event);
        }));
        debug!("subscribed to platform events ({:?})", id);
        Self { source, id }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.source.unsubscribe(self.id);
        debug!("unsubscribed from platform events ({:?})", self.id);
    }
}

/// Cloneable handle for driving a running host
#[derive(Clone)]
pub struct HostHandle {
    controls: mpsc::Sender<UserControl>,
}

impl HostHandle {
    pub async fn set_mirroring(&self, enabled: bool) -> Result<()> {
        self.send(UserControl::SetMirroring(enabled)).await
    }

    pub async fn set_safe_mode(&self, enabled: bool) -> Result<()> {
        self.send(UserControl::SetSafeMode(enabled)).await
    }

    pub async fn status(&self) -> Result<HostStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(UserControl::Status(tx)).await?;
        Ok(rx.await?)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(UserControl::Shutdown).await
    }

    async fn send(&self, control: UserControl) -> Result<()> {
        self.controls
            .send(control)
            .await
            .map_err(|_| anyhow::anyhow!("mirror host has shut down"))
    }
}

pub struct MirrorHost {
    controller: MirrorController,
    events: mpsc::UnboundedReceiver<MirrorEvent>,
    controls: mpsc::Receiver<UserControl>,
    notices: mpsc::UnboundedSender<Notice>,
    auto_start: bool,
    _subscription: Subscription,
}

impl MirrorHost {
    pub fn new(
        controller: MirrorController,
        source: Arc<dyn EventSource>,
        auto_start: bool,
    ) -> (Self, HostHandle, mpsc::UnboundedReceiver<Notice>) {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (control_tx, controls) = mpsc::channel(32);
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let subscription = Subscription::forward(source, event_tx);

        let host = Self {
            controller,
            events,
            controls,
            notices,
            auto_start,
            _subscription: subscription,
        };
        (
            host,
            HostHandle {
                controls: control_tx,
            },
            notice_rx,
        )
    }

    /// Run until shutdown is requested or every handle is dropped
    pub async fn run(mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.controller.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("mirror host running ({:?} cadence)", self.controller.cadence());

        loop {
            let timer_active =
                self.controller.is_running() && self.controller.cadence() == CadencePolicy::UiTimer;

            tokio::select! {
                Some(event) = self.events.recv() => {
                    self.on_event(event);
                }
                control = self.controls.recv() => {
                    match control {
                        Some(UserControl::Shutdown) | None => break,
                        Some(control) => self.on_control(control),
                    }
                }
                handoff = self.controller.next_handoff() => {
                    self.controller.present_handoff(handoff);
                }
                _ = ticker.tick(), if timer_active => {
                    self.controller.capture_and_present_once();
                }
            }
        }

        info!("mirror host shutting down");
        if self.controller.is_running() {
            self.controller.stop();
            self.notify(Notice::MirroringStopped);
        }
        Ok(())
    }

    fn on_event(&mut self, event: MirrorEvent) {
        debug!("platform event: {:?}", event);
        let was_active = self.controller.state() != MirrorState::Idle;

        let dispatch = match event {
            MirrorEvent::DisplayConnected => {
                self.notify(Notice::DisplayConnected);
                self.auto_start
            }
            MirrorEvent::DisplayModeChanged => {
                self.notify(Notice::DisplayModeChanged);
                self.auto_start || was_active
            }
            MirrorEvent::DisplayDisconnected => {
                self.notify(Notice::DisplayDisconnected);
                true
            }
            MirrorEvent::OrientationChanged(_) => true,
        };
        if !dispatch {
            return;
        }

        let result = self.controller.handle_event(event);
        match event {
            MirrorEvent::DisplayConnected | MirrorEvent::DisplayModeChanged => {
                self.report_start(result);
            }
            MirrorEvent::DisplayDisconnected if was_active => {
                self.notify(Notice::MirroringStopped);
            }
            _ => {}
        }
    }

    fn on_control(&mut self, control: UserControl) {
        match control {
            UserControl::SetMirroring(true) => self.start_mirroring(),
            UserControl::SetMirroring(false) => self.stop_mirroring(),
            UserControl::SetSafeMode(enabled) => self.controller.set_safe_mode(enabled),
            UserControl::Status(reply) => {
                let _ = reply.send(self.status());
            }
            UserControl::Shutdown => {}
        }
    }

    fn start_mirroring(&mut self) {
        let result = self.controller.start();
        self.report_start(result);
    }

    fn report_start(&self, result: Result<(), MirrorError>) {
        match result {
            Ok(()) => {
                if let Some(session) = self.controller.session() {
                    self.notify(Notice::MirroringStarted {
                        display: session.display,
                        mode: session.mode,
                    });
                }
            }
            Err(e) => {
                warn!("start failed: {}", e);
                self.notify(Notice::StartFailed(e.to_string()));
            }
        }
    }

    fn stop_mirroring(&mut self) {
        let was_running = self.controller.state() != MirrorState::Idle;
        self.controller.stop();
        if was_running {
            self.notify(Notice::MirroringStopped);
        }
    }

    fn status(&self) -> HostStatus {
        HostStatus {
            running: self.controller.is_running(),
            safe_mode: self.controller.safe_mode(),
            session: self.controller.session(),
            stats: self.controller.stats(),
        }
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }
}
