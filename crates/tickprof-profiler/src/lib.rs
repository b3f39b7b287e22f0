//! Tick-driven call-frame profiler for the tickprof toolkit.
//!
//! A [`Profiler`] measures the wall-clock lifetime of one request or process
//! and, in TRACE mode, reconstructs which function was executing at each
//! tick. A process configured with profiling off can still be switched into
//! TRACE for a single request by a signed activation link.
//!
//! # Feature Flags
//!
//! - `profiling`: Enable the [`probe!`] and [`tick!`] instrumentation macros.
//!   When disabled, they expand to no-ops for zero overhead.
//!
//! # Usage
//!
//! Start a profiler per request:
//!
//! ```ignore
//! let mut profiler = tickprof_profiler::Profiler::from_env(Some(request_uri))?;
//! ```
//!
//! Instrument functions and deliver ticks:
//!
//! ```ignore
//! use tickprof_profiler::{probe, tick};
//!
//! fn handle(profiler: &mut Profiler) {
//!     probe!("Service", "handle");
//!     tick!(profiler);
//!     // ...
//! }
//! ```
//!
//! Finish the request to deliver the report to the configured sink:
//!
//! ```ignore
//! profiler.shutdown();
//! ```

mod controller;
mod events;
pub mod ipc;
mod macros;
pub mod probe;
mod resolver;
mod sink;
mod store;
mod tracker;

// Re-export public API
pub use controller::{Profiler, ProfilerBuilder};
pub use events::{CallFrameRecord, CallSite, CallType, ProfileReport};
pub use resolver::resolve_mode;
pub use sink::{CallbackSink, JsonSink, MemorySink, NullSink, ReportSink};
pub use store::TimestampStore;
pub use tracker::FrameTracker;

pub use ipc::protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
pub use ipc::server::{ReportServer, ServerSink};

pub use tickprof_core::{
    Clock, Error, ManualClock, ProfilerConfig, ProfilerMode, Result, SystemClock, Timestamp,
};
pub use tickprof_link::LinkSigner;

/// Default TCP port for the report server.
pub const DEFAULT_PORT: u16 = 4343;
