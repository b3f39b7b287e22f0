//! Per-request profiler controller.
//!
//! A [`Profiler`] resolves its mode once, receives tick samples for the
//! lifetime of one request or process, and on shutdown finalizes the
//! timestamps and hands the report to its sink. Each logical request gets
//! its own instance; nothing is shared between instances.

use std::fmt;

use tracing::{debug, warn};

use tickprof_core::{Clock, ProfilerConfig, ProfilerMode, Result, SystemClock, Timestamp};

use crate::events::{CallFrameRecord, CallSite, ProfileReport};
use crate::probe;
use crate::resolver::resolve_mode;
use crate::sink::{NullSink, ReportSink};
use crate::store::TimestampStore;
use crate::tracker::FrameTracker;

/// Builder for [`Profiler`].
pub struct ProfilerBuilder<C> {
    config: ProfilerConfig,
    clock: C,
    request_uri: Option<String>,
    startup: Option<Timestamp>,
    sink: Option<Box<dyn ReportSink>>,
}

impl ProfilerBuilder<SystemClock> {
    /// Start building a profiler with `config` and the system clock.
    #[must_use]
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config,
            clock: SystemClock::new(),
            request_uri: None,
            startup: None,
            sink: None,
        }
    }
}

impl<C: Clock> ProfilerBuilder<C> {
    /// Use a different clock.
    pub fn clock<C2: Clock>(self, clock: C2) -> ProfilerBuilder<C2> {
        ProfilerBuilder {
            config: self.config,
            clock,
            request_uri: self.request_uri,
            startup: self.startup,
            sink: self.sink,
        }
    }

    /// URL of the current request, checked for a signed activation link.
    #[must_use]
    pub fn request_uri(mut self, uri: impl Into<String>) -> Self {
        self.request_uri = Some(uri.into());
        self
    }

    /// Start time of the request, if known earlier than construction.
    #[must_use]
    pub const fn startup_at(mut self, startup: Timestamp) -> Self {
        self.startup = Some(startup);
        self
    }

    /// Where the finalized report goes. Defaults to discarding it.
    #[must_use]
    pub fn sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Resolve the mode and start profiling.
    pub fn build(self) -> Result<Profiler<C>> {
        let now = self.clock.now();
        let mode = resolve_mode(&self.config, self.request_uri.as_deref(), now)?;

        let store = mode.is_enabled().then(|| {
            let tracker = mode
                .tracks_frames()
                .then(|| FrameTracker::new(self.config.capture_args, self.config.stack_depth));
            TimestampStore::new(mode, self.startup.unwrap_or(now), tracker)
        });

        debug!(%mode, "Profiler started");

        Ok(Profiler {
            mode,
            clock: self.clock,
            store,
            sink: self.sink.unwrap_or_else(|| Box::new(NullSink)),
        })
    }
}

/// Profiler for one request or process.
///
/// Dropping an unfinished profiler finalizes it, so the report is delivered
/// even when the request unwinds.
pub struct Profiler<C: Clock = SystemClock> {
    mode: ProfilerMode,
    clock: C,
    /// `None` when the mode is OFF.
    store: Option<TimestampStore>,
    sink: Box<dyn ReportSink>,
}

impl Profiler<SystemClock> {
    /// Start building a profiler.
    #[must_use]
    pub fn builder(config: ProfilerConfig) -> ProfilerBuilder<SystemClock> {
        ProfilerBuilder::new(config)
    }

    /// Start a profiler configured from the environment for `request_uri`.
    pub fn from_env(request_uri: Option<&str>) -> Result<Self> {
        let mut builder = Self::builder(ProfilerConfig::from_env()?);
        if let Some(uri) = request_uri {
            builder = builder.request_uri(uri);
        }
        builder.build()
    }
}

impl<C: Clock> Profiler<C> {
    #[must_use]
    pub const fn mode(&self) -> ProfilerMode {
        self.mode
    }

    /// Whether ticks are being recorded.
    #[must_use]
    pub fn is_tracing(&self) -> bool {
        self.store.as_ref().and_then(TimestampStore::tracker).is_some()
    }

    /// Sample the calling thread's probe stack.
    pub fn tick(&mut self) {
        if !self.is_tracing() {
            return;
        }
        probe::with_stack(|stack| self.tick_with(stack));
    }

    /// Feed an explicit sample: the call stack at this instant, outermost
    /// first, empty when no instrumented caller is executing.
    pub fn tick_with(&mut self, stack: &[CallSite]) {
        let now = self.clock.now();
        if let Some(tracker) = self.store.as_mut().and_then(TimestampStore::tracker_mut) {
            tracker.tick(now, stack);
        }
    }

    /// Frames recorded so far; the finalized frames after shutdown.
    #[must_use]
    pub fn frames(&self) -> &[CallFrameRecord] {
        let Some(store) = &self.store else {
            return &[];
        };
        match (store.tracker(), store.report()) {
            (Some(tracker), _) => tracker.frames(),
            (None, Some(report)) => report.frames.as_slice(),
            (None, None) => &[],
        }
    }

    /// Finalize and deliver the report.
    ///
    /// Only the first call records the shutdown time and delivers; later
    /// calls return the same report. Returns `None` when the mode is OFF.
    pub fn shutdown(&mut self) -> Option<&ProfileReport> {
        let now = self.clock.now();
        let store = self.store.as_mut()?;

        if store.finalize(now) {
            if let Some(report) = store.report() {
                if let Err(e) = self.sink.deliver(report) {
                    warn!("Failed to deliver profile report: {e}");
                }
            }
        }

        store.report()
    }

    /// The finalized report, if shutdown has happened.
    #[must_use]
    pub fn report(&self) -> Option<&ProfileReport> {
        self.store.as_ref().and_then(TimestampStore::report)
    }
}

impl<C: Clock> Drop for Profiler<C> {
    fn drop(&mut self) {
        if self.store.as_ref().is_some_and(|s| !s.is_finalized()) {
            self.shutdown();
        }
    }
}

impl<C: Clock> fmt::Debug for Profiler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profiler")
            .field("mode", &self.mode)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
