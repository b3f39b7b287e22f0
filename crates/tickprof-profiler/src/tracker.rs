//! Tick-driven call-frame tracking.
//!
//! Every tick reports the immediate caller at that instant, or nothing when
//! execution is outside instrumented code. Consecutive ticks with the same
//! caller extend one frame; a change of caller closes the open frame and
//! opens the next. A tick with no caller closes the open frame and starts a
//! gap, and the next frame is backdated to the start of that gap.

use tracing::trace;

use tickprof_core::constants::DEFAULT_STACK_DEPTH;
use tickprof_core::Timestamp;

use crate::events::{CallFrameRecord, CallSite};

/// Reconstructs a timeline of call frames from tick samples.
///
/// At most one frame is open at any time, and only the last one.
#[derive(Debug, Clone)]
pub struct FrameTracker {
    /// Frames in chronological order.
    frames: Vec<CallFrameRecord>,
    /// Start of a period in which no instrumented caller was observed.
    pending_gap: Option<Timestamp>,
    /// Keep argument values in caller and stack snapshots.
    capture_args: bool,
    /// Maximum number of frames kept in a stack snapshot.
    stack_depth: usize,
}

impl Default for FrameTracker {
    fn default() -> Self {
        Self::new(false, DEFAULT_STACK_DEPTH)
    }
}

impl FrameTracker {
    /// Create an empty tracker.
    #[must_use]
    pub const fn new(capture_args: bool, stack_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            pending_gap: None,
            capture_args,
            stack_depth,
        }
    }

    /// Process one tick sample taken at `now`.
    ///
    /// `stack` is the call stack at this instant, outermost first; its last
    /// element is the immediate caller. An empty stack means no instrumented
    /// caller was executing.
    pub fn tick(&mut self, now: Timestamp, stack: &[CallSite]) {
        let Some(caller) = stack.last() else {
            self.close_last(now);
            self.pending_gap = Some(now);
            return;
        };

        if self.is_current(caller) {
            return;
        }

        self.close_last(now);

        let started_at = self.pending_gap.take().unwrap_or(now);
        let snapshot = stack
            .iter()
            .rev()
            .take(self.stack_depth)
            .map(|site| self.snapshot(site))
            .collect();
        let record = CallFrameRecord::open(started_at, self.snapshot(caller), snapshot);

        trace!(identity = record.identity(), "Frame opened");
        self.frames.push(record);
    }

    /// Whether `caller` matches the open frame's caller snapshot.
    fn is_current(&self, caller: &CallSite) -> bool {
        match self.frames.last() {
            Some(open) if !open.is_closed() => {
                if self.capture_args {
                    open.caller() == caller
                } else {
                    open.caller().same_function(caller)
                }
            }
            _ => false,
        }
    }

    fn snapshot(&self, site: &CallSite) -> CallSite {
        if self.capture_args {
            site.clone()
        } else {
            site.without_args()
        }
    }

    /// Close the open frame at `now`, if there is one.
    ///
    /// Returns `false` when there are no frames or the last one is already closed.
    pub fn close_last(&mut self, now: Timestamp) -> bool {
        let Some(record) = self.frames.last_mut() else {
            return false;
        };
        let closed = record.close(now);
        if closed {
            trace!(
                identity = record.identity(),
                duration_ns = record.duration_ns(),
                "Frame closed"
            );
        }
        closed
    }

    /// Frames recorded so far, in chronological order.
    #[must_use]
    pub fn frames(&self) -> &[CallFrameRecord] {
        &self.frames
    }

    /// The open frame, if any.
    #[must_use]
    pub fn open_frame(&self) -> Option<&CallFrameRecord> {
        self.frames.last().filter(|record| !record.is_closed())
    }

    /// Start of the current gap, if one is pending.
    #[must_use]
    pub const fn pending_gap(&self) -> Option<Timestamp> {
        self.pending_gap
    }

    /// Sum of all closed frame durations in nanoseconds.
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.frames
            .iter()
            .map(CallFrameRecord::duration_ns)
            .fold(0, u64::saturating_add)
    }

    /// Consume the tracker, yielding its frames.
    #[must_use]
    pub fn into_frames(self) -> Vec<CallFrameRecord> {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_nanos(ms * 1_000_000)
    }

    fn a() -> CallSite {
        CallSite::associated("MyClass", "test1")
    }

    fn b() -> CallSite {
        CallSite::associated("MyClass", "test2")
    }

    #[test]
    fn scripted_sequence_produces_three_frames() {
        let mut tracker = FrameTracker::default();
        let mut ms = 0;
        let mut tick = |tracker: &mut FrameTracker, stack: &[CallSite]| {
            tracker.tick(at(ms), stack);
            ms += 10;
        };

        for _ in 0..3 {
            tick(&mut tracker, &[a()]);
        }
        for _ in 0..2 {
            tick(&mut tracker, &[b()]);
        }
        tick(&mut tracker, &[]);
        for _ in 0..2 {
            tick(&mut tracker, &[a()]);
        }
        tracker.close_last(at(80));

        let frames = tracker.frames();
        let ids: Vec<_> = frames.iter().map(CallFrameRecord::identity).collect();
        assert_eq!(ids, ["MyClass::test1", "MyClass::test2", "MyClass::test1"]);
        assert!(frames.iter().all(CallFrameRecord::is_closed));

        // A: 0..30, B: 30..50, gap at 50, A backdated to 50..80
        assert_eq!(frames[0].duration_ns(), 30_000_000);
        assert_eq!(frames[1].duration_ns(), 20_000_000);
        assert_eq!(frames[2].started_at(), at(50));
        assert_eq!(frames[2].duration_ns(), 30_000_000);
        assert_eq!(tracker.total_ns(), 80_000_000);
    }

    #[test]
    fn same_caller_keeps_frame_open() {
        let mut tracker = FrameTracker::default();
        tracker.tick(at(0), &[a()]);
        tracker.tick(at(5), &[a()]);
        tracker.tick(at(9), &[a()]);

        assert_eq!(tracker.frames().len(), 1);
        let open = tracker.open_frame().unwrap();
        assert_eq!(open.duration_ns(), 0);
        assert_eq!(open.started_at(), at(0));
    }

    #[test]
    fn gap_without_open_frame_only_records_gap() {
        let mut tracker = FrameTracker::default();
        tracker.tick(at(3), &[]);
        assert!(tracker.frames().is_empty());
        assert_eq!(tracker.pending_gap(), Some(at(3)));

        tracker.tick(at(7), &[]);
        assert_eq!(tracker.pending_gap(), Some(at(7)));

        tracker.tick(at(10), &[b()]);
        assert_eq!(tracker.frames()[0].started_at(), at(7));
        assert_eq!(tracker.pending_gap(), None);
    }

    #[test]
    fn same_caller_after_gap_opens_new_frame() {
        let mut tracker = FrameTracker::default();
        tracker.tick(at(0), &[a()]);
        tracker.tick(at(10), &[]);
        tracker.tick(at(20), &[a()]);

        assert_eq!(tracker.frames().len(), 2);
        assert!(tracker.frames()[0].is_closed());
        assert_eq!(tracker.frames()[1].started_at(), at(10));
    }

    #[test]
    fn close_last_is_idempotent() {
        let mut tracker = FrameTracker::default();
        assert!(!tracker.close_last(at(1)));

        tracker.tick(at(0), &[a()]);
        assert!(tracker.close_last(at(4)));
        assert!(!tracker.close_last(at(9)));
        assert_eq!(tracker.frames()[0].duration_ns(), 4_000_000);
    }

    #[test]
    fn args_are_ignored_unless_captured() {
        let call = |n: &str| CallSite::function("work").with_args(vec![n.to_string()]);

        let mut tracker = FrameTracker::new(false, 4);
        tracker.tick(at(0), &[call("1")]);
        tracker.tick(at(1), &[call("2")]);
        assert_eq!(tracker.frames().len(), 1);
        assert_eq!(tracker.frames()[0].caller().args, None);

        let mut tracker = FrameTracker::new(true, 4);
        tracker.tick(at(0), &[call("1")]);
        tracker.tick(at(1), &[call("2")]);
        assert_eq!(tracker.frames().len(), 2);
        assert_eq!(tracker.frames()[1].caller().args, Some(vec!["2".to_string()]));
    }

    #[test]
    fn stack_snapshot_is_bounded_and_innermost_first() {
        let stack: Vec<CallSite> = (0..6)
            .map(|i| CallSite::function(format!("f{i}")))
            .collect();

        let mut tracker = FrameTracker::new(false, 3);
        tracker.tick(at(0), &stack);

        let snapshot: Vec<_> = tracker.frames()[0]
            .stack()
            .iter()
            .map(CallSite::identity)
            .collect();
        assert_eq!(snapshot, ["f5", "f4", "f3"]);
        assert_eq!(tracker.frames()[0].identity(), "f5");
    }

    #[test]
    fn deeper_call_changes_frame() {
        let mut tracker = FrameTracker::default();
        tracker.tick(at(0), &[a()]);
        tracker.tick(at(2), &[a(), b()]);
        tracker.tick(at(4), &[a()]);

        let ids: Vec<_> = tracker.frames().iter().map(CallFrameRecord::identity).collect();
        assert_eq!(ids, ["MyClass::test1", "MyClass::test2", "MyClass::test1"]);
        assert_eq!(tracker.open_frame().unwrap().started_at(), at(4));
    }
}
