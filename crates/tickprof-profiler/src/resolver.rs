//! Mode resolution.

use tracing::{debug, info};

use tickprof_core::{ProfilerConfig, ProfilerMode, Result, Timestamp};
use tickprof_link::LinkSigner;

/// Resolve the effective mode for one process or request.
///
/// A correctly signed activation link in `request_uri` selects TRACE whatever
/// the static mode says, provided a secret is configured. Otherwise the static
/// selector is parsed, and an unrecognized value is an error.
pub fn resolve_mode(
    config: &ProfilerConfig,
    request_uri: Option<&str>,
    now: Timestamp,
) -> Result<ProfilerMode> {
    if config.web_key.is_some() {
        let signer = LinkSigner::from_config(config)?;
        if signer.verify_at(request_uri.unwrap_or_default(), now) {
            info!("Trace activated by signed link");
            return Ok(ProfilerMode::Trace);
        }
    }

    let mode = config.static_mode()?;
    debug!(%mode, "Profiler mode resolved");
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tickprof_core::Error;
    use tickprof_link::Nonce;

    use super::*;

    const NOW: Timestamp = Timestamp::from_secs(1_700_000_000);

    fn link(secret: &str, url: &str) -> String {
        LinkSigner::new(secret)
            .unwrap()
            .sign_with(url, &Nonce::at(NOW))
            .unwrap()
    }

    #[test]
    fn static_mode_without_link() {
        let config = ProfilerConfig::new("timing");
        assert_eq!(resolve_mode(&config, None, NOW).unwrap(), ProfilerMode::Timing);

        let config = ProfilerConfig::default();
        assert_eq!(resolve_mode(&config, Some("/x"), NOW).unwrap(), ProfilerMode::Off);
    }

    #[test]
    fn signed_link_upgrades_to_trace() {
        let config = ProfilerConfig::new("off").with_web_key("abc");
        let uri = link("abc", "/orders?id=7");
        assert_eq!(resolve_mode(&config, Some(&uri), NOW).unwrap(), ProfilerMode::Trace);
    }

    #[test]
    fn link_overrides_unknown_static_mode() {
        let config = ProfilerConfig::new("bogus").with_web_key("abc");
        let uri = link("abc", "/orders");
        assert_eq!(resolve_mode(&config, Some(&uri), NOW).unwrap(), ProfilerMode::Trace);
    }

    #[test]
    fn link_ignored_without_secret() {
        let config = ProfilerConfig::new("timing");
        let uri = link("abc", "/orders");
        assert_eq!(resolve_mode(&config, Some(&uri), NOW).unwrap(), ProfilerMode::Timing);
    }

    #[test]
    fn bad_link_falls_back_to_static_mode() {
        let config = ProfilerConfig::new("").with_web_key("abc");
        let uri = link("other", "/orders");
        assert_eq!(resolve_mode(&config, Some(&uri), NOW).unwrap(), ProfilerMode::Off);
        assert_eq!(resolve_mode(&config, Some("http:///bad"), NOW).unwrap(), ProfilerMode::Off);
    }

    #[test]
    fn expired_link_falls_back() {
        let config = ProfilerConfig::new("off")
            .with_web_key("abc")
            .with_link_max_age(Duration::from_secs(30));
        let uri = link("abc", "/orders");
        let later = Timestamp::from_secs(NOW.as_secs() + 31);
        assert_eq!(resolve_mode(&config, Some(&uri), later).unwrap(), ProfilerMode::Off);
    }

    #[test]
    fn unknown_mode_is_fatal() {
        let config = ProfilerConfig::new("everything");
        assert!(matches!(
            resolve_mode(&config, None, NOW),
            Err(Error::UnknownMode(m)) if m == "everything"
        ));
    }
}
