//! Startup/shutdown timestamps and report finalization.

use tracing::info;

use tickprof_core::{ProfilerMode, Timestamp};

use crate::events::ProfileReport;
use crate::tracker::FrameTracker;

/// Holds the profiled lifetime and, in TRACE mode, the frame tracker.
///
/// Finalizes exactly once; later calls leave the report untouched.
#[derive(Debug)]
pub struct TimestampStore {
    mode: ProfilerMode,
    startup: Timestamp,
    tracker: Option<FrameTracker>,
    report: Option<ProfileReport>,
}

impl TimestampStore {
    /// Start a store at `startup`, tracking frames with `tracker` if given.
    #[must_use]
    pub const fn new(mode: ProfilerMode, startup: Timestamp, tracker: Option<FrameTracker>) -> Self {
        Self {
            mode,
            startup,
            tracker,
            report: None,
        }
    }

    #[must_use]
    pub const fn startup(&self) -> Timestamp {
        self.startup
    }

    /// The live tracker. `None` when frames are not tracked or after finalization.
    pub fn tracker_mut(&mut self) -> Option<&mut FrameTracker> {
        self.tracker.as_mut()
    }

    #[must_use]
    pub const fn tracker(&self) -> Option<&FrameTracker> {
        self.tracker.as_ref()
    }

    /// Finalize at `now`. Returns `true` only for the call that finalized.
    pub fn finalize(&mut self, now: Timestamp) -> bool {
        if self.report.is_some() {
            return false;
        }

        let (func_execution_time_ns, frames) = match self.tracker.take() {
            Some(mut tracker) => {
                tracker.close_last(now);
                (Some(tracker.total_ns()), tracker.into_frames())
            }
            None => (None, Vec::new()),
        };

        let report = ProfileReport {
            mode: self.mode,
            startup: self.startup,
            shutdown: now,
            execution_time_ns: now.nanos_since(self.startup),
            func_execution_time_ns,
            frames,
        };

        info!(
            mode = %report.mode,
            execution_time_ms = report.execution_time().as_secs_f64() * 1000.0,
            frames = report.frames.len(),
            "Profile finalized"
        );

        self.report = Some(report);
        true
    }

    /// The finalized report, if any.
    #[must_use]
    pub const fn report(&self) -> Option<&ProfileReport> {
        self.report.as_ref()
    }

    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.report.is_some()
    }
}
