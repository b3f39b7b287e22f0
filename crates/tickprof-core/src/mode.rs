//! Profiler mode selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// What the profiler records for a process or request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProfilerMode {
    /// Nothing is recorded.
    #[default]
    Off,
    /// Startup and shutdown timestamps only.
    Timing,
    /// Timestamps plus per-frame call tracking.
    Trace,
}

impl ProfilerMode {
    /// Canonical upper-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Timing => "TIMING",
            Self::Trace => "TRACE",
        }
    }

    /// Whether startup/shutdown timing is recorded.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Whether call frames are tracked.
    #[must_use]
    pub const fn tracks_frames(self) -> bool {
        matches!(self, Self::Trace)
    }
}

impl fmt::Display for ProfilerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProfilerMode {
    type Err = Error;

    /// Case-insensitive; the empty string means [`ProfilerMode::Off`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::Off);
        }
        [Self::Off, Self::Timing, Self::Trace]
            .into_iter()
            .find(|mode| s.eq_ignore_ascii_case(mode.name()))
            .ok_or_else(|| Error::UnknownMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_off() {
        assert_eq!("".parse::<ProfilerMode>().unwrap(), ProfilerMode::Off);
    }

    #[test]
    fn parse_is_case_insensitive() {
        for (input, expected) in [
            ("off", ProfilerMode::Off),
            ("Off", ProfilerMode::Off),
            ("timing", ProfilerMode::Timing),
            ("TiMiNg", ProfilerMode::Timing),
            ("TRACE", ProfilerMode::Trace),
            ("trace", ProfilerMode::Trace),
        ] {
            assert_eq!(input.parse::<ProfilerMode>().unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn unknown_mode_carries_input() {
        for input in ["verbose", " trace", "TRACE ", "0"] {
            match input.parse::<ProfilerMode>() {
                Err(Error::UnknownMode(s)) => assert_eq!(s, input),
                other => panic!("expected UnknownMode for {input:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn flags() {
        assert!(!ProfilerMode::Off.is_enabled());
        assert!(ProfilerMode::Timing.is_enabled());
        assert!(!ProfilerMode::Timing.tracks_frames());
        assert!(ProfilerMode::Trace.tracks_frames());
        assert_eq!(ProfilerMode::Trace.to_string(), "TRACE");
    }
}
