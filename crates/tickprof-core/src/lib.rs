//! Core types, clock and configuration for the tickprof profiler.
//!
//! This crate provides the foundational pieces shared by the link signer and
//! the profiler itself:
//! - Wall-clock timestamps and the [`Clock`] source
//! - The [`ProfilerMode`] selector
//! - Process configuration read from the environment
//! - The error taxonomy

pub mod clock;
pub mod config;
pub mod error;
pub mod mode;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::ProfilerConfig;
pub use error::{Error, Result};
pub use mode::ProfilerMode;

/// Names of the environment variables and query parameters the profiler reads.
pub mod constants {
    /// Static mode selector.
    pub const ENV_MODE: &str = "PROFILER_MODE";
    /// Shared secret used to sign and verify activation links.
    pub const ENV_WEB_KEY: &str = "PROFILER_WEB_KEY";
    /// Enables capture of call argument values in stack snapshots.
    pub const ENV_TRACE_ARGS: &str = "PROFILE_TRACE_ARGS";
    /// Maximum depth of captured call stacks.
    pub const ENV_STACK_DEPTH: &str = "PROFILER_STACK_DEPTH";
    /// Maximum age, in seconds, of an activation link nonce.
    pub const ENV_LINK_MAX_AGE: &str = "PROFILER_LINK_MAX_AGE";

    /// Query parameter carrying the activation nonce.
    pub const QUERY_KEY: &str = "PROFILER_KEY";
    /// Query parameter carrying the activation signature.
    pub const QUERY_TOKEN: &str = "PROFILER_TOKEN";

    /// Default depth of captured call stacks.
    pub const DEFAULT_STACK_DEPTH: usize = 10;
}
