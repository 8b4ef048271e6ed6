//! Background capture thread. Samples frames off the UI context and hands
//! them over one at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use mirror_platform::screen::PixelBuffer;

use crate::capture::CaptureStrategy;
use crate::stats::StatsCounters;

/// A frame captured by the worker, waiting to be presented on the UI context
#[derive(Debug)]
pub struct FrameHandoff {
    /// Session the frame was captured for
    pub session: u64,
    pub frame: PixelBuffer,
    /// Signalled once presented; dropping it means the frame was superseded
    done: oneshot::Sender<()>,
}

impl FrameHandoff {
    pub fn new(session: u64, frame: PixelBuffer) -> (Self, oneshot::Receiver<()>) {
        let (done, done_rx) = oneshot::channel();
        (
            Self {
                session,
                frame,
                done,
            },
            done_rx,
        )
    }

    /// Split into the frame and its completion signal
    pub fn into_parts(self) -> (u64, PixelBuffer, oneshot::Sender<()>) {
        (self.session, self.frame, self.done)
    }
}

pub struct WorkerParams {
    pub session: u64,
    pub strategy: Arc<dyn CaptureStrategy>,
    pub interval: Duration,
    pub handoff: mpsc::Sender<FrameHandoff>,
    pub stats: Arc<StatsCounters>,
}

/// Dedicated capture thread with a cooperative stop flag
pub struct CaptureWorker {
    session: u64,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    exited: std_mpsc::Receiver<()>,
    joined: bool,
}

/// Signals thread exit on drop, so an unwinding capture still counts as exited
struct ExitGuard(std_mpsc::Sender<()>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

impl CaptureWorker {
    pub fn spawn(params: WorkerParams) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (exit_tx, exited) = std_mpsc::channel();
        let session = params.session;

        let thread = thread::Builder::new()
            .name(format!("mirror-capture-{}", session))
            .spawn({
                let stop = stop.clone();
                move || {
                    let _guard = ExitGuard(exit_tx);
                    run_capture_loop(params, &stop);
                }
            })?;

        debug!("capture worker started for session {}", session);

        Ok(Self {
            session,
            stop,
            thread: Some(thread),
            exited,
            joined: false,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(self.joined, |t| t.is_finished())
    }

    /// Ask the thread to exit and wait at most `timeout` for it.
    /// A thread that misses the deadline is detached, never killed.
    pub fn stop(&mut self, timeout: Duration) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.stop.store(true, Ordering::Release);
        thread.thread().unpark();

        match self.exited.recv_timeout(timeout) {
            Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                if thread.join().is_err() {
                    warn!("capture worker for session {} panicked", self.session);
                }
                self.joined = true;
                debug!("capture worker for session {} joined", self.session);
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    "capture worker for session {} did not exit within {:?}, detaching",
                    self.session, timeout
                );
            }
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop(Duration::ZERO);
        }
    }
}

fn run_capture_loop(params: WorkerParams, stop: &AtomicBool) {
    let WorkerParams {
        session,
        strategy,
        interval,
        handoff,
        stats,
    } = params;

    info!(
        "capture loop running for session {} ({} capture, {:?} interval)",
        session,
        strategy.name(),
        interval
    );

    while !stop.load(Ordering::Acquire) {
        match strategy.capture() {
            Ok(Some(frame)) => {
                let (msg, done) = FrameHandoff::new(session, frame);
                if handoff.blocking_send(msg).is_err() {
                    debug!("handoff channel closed for session {}", session);
                    break;
                }
                // presented or superseded, either way the slot is free again
                let _ = done.blocking_recv();
            }
            Ok(None) => {
                trace!("capture tick skipped: no pixels");
                stats.tick_skipped();
            }
            Err(e) => {
                debug!("capture tick failed: {:#}", e);
                stats.tick_skipped();
            }
        }

        wait_unless_stopped(stop, interval);
    }

    debug!("capture loop for session {} exiting", session);
}

fn wait_unless_stopped(stop: &AtomicBool, interval: Duration) {
    let deadline = Instant::now() + interval;
    while !stop.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::park_timeout(deadline - now);
    }
}
