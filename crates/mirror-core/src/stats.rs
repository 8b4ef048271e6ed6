use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared between the controller and its capture worker
#[derive(Debug, Default)]
pub struct StatsCounters {
    sessions_started: AtomicU64,
    frames_presented: AtomicU64,
    ticks_skipped: AtomicU64,
    frames_discarded: AtomicU64,
}

impl StatsCounters {
    pub fn session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_presented(&self) {
        self.frames_presented.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_skipped(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_discarded(&self) {
        self.frames_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MirrorStats {
        MirrorStats {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            frames_presented: self.frames_presented.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MirrorStats {
    pub sessions_started: u64,
    pub frames_presented: u64,
    /// Capture ticks that produced no pixels
    pub ticks_skipped: u64,
    /// Frames dropped because their session had ended
    pub frames_discarded: u64,
}
