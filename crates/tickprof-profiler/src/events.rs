//! Call sites, frame records and the finalized report.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tickprof_core::{ProfilerMode, Timestamp};

/// How a function was reached from its owning type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallType {
    /// Associated function, `Type::function`.
    Associated,
    /// Method on a value, `Type.method`.
    Method,
}

impl CallType {
    /// Separator placed between type and function in frame identities.
    #[must_use]
    pub const fn separator(self) -> &'static str {
        match self {
            Self::Associated => "::",
            Self::Method => ".",
        }
    }
}

/// Identity of one function activation on the call stack.
///
/// Equality is structural over every field, arguments included.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSite {
    /// Owning type, if any.
    pub class: Option<Cow<'static, str>>,
    /// How the function was reached from `class`.
    pub call_type: Option<CallType>,
    /// Function name.
    pub function: Cow<'static, str>,
    /// Rendered argument values, when captured.
    pub args: Option<Vec<String>>,
}

impl CallSite {
    /// A free function.
    pub fn function(function: impl Into<Cow<'static, str>>) -> Self {
        Self {
            class: None,
            call_type: None,
            function: function.into(),
            args: None,
        }
    }

    /// An associated function `class::function`.
    pub fn associated(
        class: impl Into<Cow<'static, str>>,
        function: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            class: Some(class.into()),
            call_type: Some(CallType::Associated),
            function: function.into(),
            args: None,
        }
    }

    /// A method `class.function`.
    pub fn method(
        class: impl Into<Cow<'static, str>>,
        function: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            class: Some(class.into()),
            call_type: Some(CallType::Method),
            function: function.into(),
            args: None,
        }
    }

    /// Attach rendered argument values.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = Some(args);
        self
    }

    /// Copy without argument values.
    #[must_use]
    pub fn without_args(&self) -> Self {
        Self {
            class: self.class.clone(),
            call_type: self.call_type,
            function: self.function.clone(),
            args: None,
        }
    }

    /// Equality ignoring argument values.
    #[must_use]
    pub fn same_function(&self, other: &Self) -> bool {
        self.function == other.function
            && self.class == other.class
            && self.call_type == other.call_type
    }

    /// Frame identity: type, separator and function concatenated.
    #[must_use]
    pub fn identity(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(class) = &self.class {
            f.write_str(class)?;
        }
        if let Some(call_type) = self.call_type {
            f.write_str(call_type.separator())?;
        }
        f.write_str(&self.function)
    }
}

/// One contiguous interval during which a single call site was current.
///
/// Records are opened and closed only by the frame tracker. Once closed,
/// the duration never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFrameRecord {
    identity: String,
    started_at: Timestamp,
    duration_ns: u64,
    caller: CallSite,
    stack: Vec<CallSite>,
    closed: bool,
}

impl CallFrameRecord {
    pub(crate) fn open(started_at: Timestamp, caller: CallSite, stack: Vec<CallSite>) -> Self {
        Self {
            identity: caller.identity(),
            started_at,
            duration_ns: 0,
            caller,
            stack,
            closed: false,
        }
    }

    /// Close the record at `now`. Returns `false` if it was already closed.
    pub(crate) fn close(&mut self, now: Timestamp) -> bool {
        if self.closed {
            return false;
        }
        self.duration_ns = now.nanos_since(self.started_at);
        self.closed = true;
        true
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub const fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Duration in nanoseconds; zero while open.
    #[must_use]
    pub const fn duration_ns(&self) -> u64 {
        self.duration_ns
    }

    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_nanos(self.duration_ns)
    }

    /// Caller snapshot used for change detection.
    #[must_use]
    pub const fn caller(&self) -> &CallSite {
        &self.caller
    }

    /// Call stack captured when the frame opened, innermost first.
    #[must_use]
    pub fn stack(&self) -> &[CallSite] {
        &self.stack
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Finalized timings for one profiled process or request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileReport {
    /// Mode the profiler ran in.
    pub mode: ProfilerMode,
    /// Start of the profiled lifetime.
    pub startup: Timestamp,
    /// End of the profiled lifetime.
    pub shutdown: Timestamp,
    /// `shutdown - startup` in nanoseconds.
    pub execution_time_ns: u64,
    /// Sum of all frame durations, when frames were tracked.
    pub func_execution_time_ns: Option<u64>,
    /// Closed frames in chronological order.
    pub frames: Vec<CallFrameRecord>,
}

impl ProfileReport {
    #[must_use]
    pub const fn execution_time(&self) -> Duration {
        Duration::from_nanos(self.execution_time_ns)
    }

    #[must_use]
    pub fn func_execution_time(&self) -> Option<Duration> {
        self.func_execution_time_ns.map(Duration::from_nanos)
    }

    /// Compact JSON encoding.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Indented JSON encoding.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
