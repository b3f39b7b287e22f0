//! Profiler configuration.

use std::time::Duration;

use tracing::debug;

use crate::constants::{
    DEFAULT_STACK_DEPTH, ENV_LINK_MAX_AGE, ENV_MODE, ENV_STACK_DEPTH, ENV_TRACE_ARGS, ENV_WEB_KEY,
};
use crate::error::{Error, Result};
use crate::mode::ProfilerMode;

/// Profiler configuration, read once when a profiler is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilerConfig {
    /// Raw mode selector. Parsed at resolution time so a bad value is fatal there.
    pub mode: String,
    /// Shared secret for activation links. `None` disables remote activation.
    pub web_key: Option<String>,
    /// Capture call argument values in caller and stack snapshots.
    pub capture_args: bool,
    /// Maximum number of frames kept in a stack snapshot.
    pub stack_depth: usize,
    /// Maximum accepted age of an activation link nonce. `None` never expires.
    pub link_max_age: Option<Duration>,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            mode: String::new(),
            web_key: None,
            capture_args: false,
            stack_depth: DEFAULT_STACK_DEPTH,
            link_max_age: None,
        }
    }
}

impl ProfilerConfig {
    /// Create a config with the given mode selector.
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            ..Default::default()
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::new(lookup(ENV_MODE).unwrap_or_default());

        config.web_key = lookup(ENV_WEB_KEY).filter(|key| !key.is_empty());
        config.capture_args = lookup(ENV_TRACE_ARGS).is_some_and(|v| is_truthy(&v));

        if let Some(depth) = lookup(ENV_STACK_DEPTH).filter(|v| !v.is_empty()) {
            config.stack_depth = depth.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("{ENV_STACK_DEPTH} must be an integer, got '{depth}'"))
            })?;
        }

        if let Some(age) = lookup(ENV_LINK_MAX_AGE).filter(|v| !v.is_empty()) {
            let secs: u64 = age.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!(
                    "{ENV_LINK_MAX_AGE} must be a number of seconds, got '{age}'"
                ))
            })?;
            config.link_max_age = Some(Duration::from_secs(secs));
        }

        debug!(
            mode = %config.mode,
            remote_activation = config.web_key.is_some(),
            capture_args = config.capture_args,
            "Profiler configuration loaded"
        );

        Ok(config)
    }

    /// Set the mode selector.
    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Set the shared secret for activation links.
    #[must_use]
    pub fn with_web_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.web_key = (!key.is_empty()).then_some(key);
        self
    }

    /// Enable or disable argument capture.
    #[must_use]
    pub const fn with_capture_args(mut self, capture: bool) -> Self {
        self.capture_args = capture;
        self
    }

    /// Set the stack snapshot depth.
    #[must_use]
    pub const fn with_stack_depth(mut self, depth: usize) -> Self {
        self.stack_depth = depth;
        self
    }

    /// Set the maximum accepted activation link age.
    #[must_use]
    pub const fn with_link_max_age(mut self, max_age: Duration) -> Self {
        self.link_max_age = Some(max_age);
        self
    }

    /// Parse the static mode selector.
    pub fn static_mode(&self) -> Result<ProfilerMode> {
        self.mode.parse()
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.trim(), "" | "0") && !value.trim().eq_ignore_ascii_case("false")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_is_off() {
        let config = ProfilerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ProfilerConfig::default());
        assert_eq!(config.static_mode().unwrap(), ProfilerMode::Off);
    }

    #[test]
    fn reads_all_variables() {
        let config = ProfilerConfig::from_lookup(lookup(&[
            ("PROFILER_MODE", "timing"),
            ("PROFILER_WEB_KEY", "abc"),
            ("PROFILE_TRACE_ARGS", "1"),
            ("PROFILER_STACK_DEPTH", "4"),
            ("PROFILER_LINK_MAX_AGE", "600"),
        ]))
        .unwrap();

        assert_eq!(config.static_mode().unwrap(), ProfilerMode::Timing);
        assert_eq!(config.web_key.as_deref(), Some("abc"));
        assert!(config.capture_args);
        assert_eq!(config.stack_depth, 4);
        assert_eq!(config.link_max_age, Some(Duration::from_secs(600)));
    }

    #[test]
    fn empty_secret_disables_activation() {
        let config = ProfilerConfig::from_lookup(lookup(&[("PROFILER_WEB_KEY", "")])).unwrap();
        assert!(config.web_key.is_none());
        assert!(ProfilerConfig::default().with_web_key("").web_key.is_none());
    }

    #[test]
    fn trace_args_falsy_values() {
        for value in ["", "0", "false", "FALSE"] {
            let config =
                ProfilerConfig::from_lookup(lookup(&[("PROFILE_TRACE_ARGS", value)])).unwrap();
            assert!(!config.capture_args, "{value:?}");
        }
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = ProfilerConfig::from_lookup(lookup(&[("PROFILER_STACK_DEPTH", "deep")]));
        assert!(matches!(err, Err(Error::InvalidConfig(_))));

        let err = ProfilerConfig::from_lookup(lookup(&[("PROFILER_LINK_MAX_AGE", "-1")]));
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn unknown_mode_surfaces_on_parse() {
        let config = ProfilerConfig::new("loud");
        assert!(matches!(config.static_mode(), Err(Error::UnknownMode(m)) if m == "loud"));
    }
}
