//! Signing and verification of trace-activation links.

use std::fmt;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use tickprof_core::constants::{QUERY_KEY, QUERY_TOKEN};
use tickprof_core::{Clock, Error, ProfilerConfig, Result, SystemClock, Timestamp};

use crate::query;
use crate::url::UrlParts;

type HmacSha256 = Hmac<Sha256>;

/// Per-link nonce. Conventionally the signing time in Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    /// Nonce for a link signed at `time`.
    #[must_use]
    pub fn at(time: Timestamp) -> Self {
        Self(time.as_secs().to_string())
    }

    /// Nonce with an arbitrary value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Signing time, if the nonce is a Unix timestamp.
    #[must_use]
    pub fn issued_at(&self) -> Option<Timestamp> {
        self.0.parse().ok().map(Timestamp::from_secs)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Activation credentials extracted from a request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLink {
    /// The `PROFILER_KEY` parameter.
    pub nonce: Nonce,
    /// The `PROFILER_TOKEN` parameter.
    pub token: String,
    /// Canonical form of the URL the token must cover.
    pub canonical: String,
}

impl SignedLink {
    /// Extract credentials from `url`.
    ///
    /// Returns `Ok(None)` when either parameter is missing, and an error only
    /// when the URL itself cannot be parsed.
    pub fn parse(url: &str) -> Result<Option<Self>> {
        let mut parts = UrlParts::parse(url)?;
        let Some(raw_query) = parts.query.take() else {
            return Ok(None);
        };

        let mut pairs = query::parse(&raw_query);
        let nonce = query::take(&mut pairs, QUERY_KEY);
        let token = query::take(&mut pairs, QUERY_TOKEN);
        let (Some(nonce), Some(token)) = (nonce, token) else {
            return Ok(None);
        };

        parts.query = (!pairs.is_empty()).then(|| query::build(pairs));
        Ok(Some(Self {
            nonce: Nonce::new(nonce),
            token,
            canonical: parts.without_origin().serialize(),
        }))
    }
}

/// Canonical signing input for `url`: origin removed, activation parameters
/// removed and the remaining query re-encoded.
pub(crate) fn canonical(mut parts: UrlParts) -> String {
    if let Some(raw_query) = parts.query.take() {
        let mut pairs = query::parse(&raw_query);
        query::take(&mut pairs, QUERY_KEY);
        query::take(&mut pairs, QUERY_TOKEN);
        parts.query = (!pairs.is_empty()).then(|| query::build(pairs));
    }
    parts.without_origin().serialize()
}

/// Signs and verifies activation links with a shared secret.
#[derive(Clone)]
pub struct LinkSigner {
    mac: HmacSha256,
    max_age: Option<Duration>,
}

impl fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkSigner")
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl LinkSigner {
    /// Create a signer. An empty secret is [`Error::MissingSecret`].
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(Error::MissingSecret);
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| Error::InvalidConfig(format!("unusable link secret: {e}")))?;
        Ok(Self { mac, max_age: None })
    }

    /// Create a signer from the configured secret and link max age.
    pub fn from_config(config: &ProfilerConfig) -> Result<Self> {
        let signer = Self::new(config.web_key.as_deref().ok_or(Error::MissingSecret)?)?;
        Ok(match config.link_max_age {
            Some(max_age) => signer.with_max_age(max_age),
            None => signer,
        })
    }

    /// Reject links whose nonce is older than `max_age`.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Sign `url` with a nonce taken from the system clock.
    pub fn sign(&self, url: &str) -> Result<String> {
        self.sign_with(url, &Nonce::at(SystemClock::new().now()))
    }

    /// Sign `url` with an explicit nonce.
    ///
    /// The activation parameters are appended to the query, before any
    /// fragment, so the original URL is otherwise unchanged.
    pub fn sign_with(&self, url: &str, nonce: &Nonce) -> Result<String> {
        let parts = UrlParts::parse(url)?;
        let token = self.token(nonce, &canonical(parts));

        let (base, fragment) = match url.split_once('#') {
            Some((base, fragment)) => (base, Some(fragment)),
            None => (url, None),
        };
        let separator = match base.find('?') {
            None => "?",
            Some(_) if base.ends_with('?') || base.ends_with('&') => "",
            Some(_) => "&",
        };

        let mut link = String::with_capacity(url.len() + 96);
        link.push_str(base);
        link.push_str(separator);
        link.push_str(&query::build([
            (QUERY_KEY, nonce.as_str()),
            (QUERY_TOKEN, token.as_str()),
        ]));
        if let Some(fragment) = fragment {
            link.push('#');
            link.push_str(fragment);
        }

        debug!(nonce = %nonce, "Signed activation link");
        Ok(link)
    }

    /// Hex-encoded signature over a nonce and a canonical URL.
    #[must_use]
    pub fn token(&self, nonce: &Nonce, canonical: &str) -> String {
        hex::encode(self.digest(nonce, canonical).finalize().into_bytes())
    }

    fn digest(&self, nonce: &Nonce, canonical: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        // Length prefix keeps (nonce, canonical) boundaries unambiguous.
        mac.update(&(nonce.as_str().len() as u64).to_be_bytes());
        mac.update(nonce.as_str().as_bytes());
        mac.update(canonical.as_bytes());
        mac
    }

    /// Whether `url` is a correctly signed activation link right now.
    ///
    /// Never fails: a malformed URL or missing parameters are simply not an
    /// activation link.
    #[must_use]
    pub fn verify(&self, url: &str) -> bool {
        self.verify_at(url, SystemClock::new().now())
    }

    /// Like [`LinkSigner::verify`], judging nonce age against `now`.
    #[must_use]
    pub fn verify_at(&self, url: &str, now: Timestamp) -> bool {
        match SignedLink::parse(url) {
            Ok(Some(link)) => self.check(&link, now),
            Ok(None) => false,
            Err(e) => {
                debug!("Not an activation link: {e}");
                false
            }
        }
    }

    /// Check extracted credentials.
    #[must_use]
    pub fn check(&self, link: &SignedLink, now: Timestamp) -> bool {
        if let Some(max_age) = self.max_age {
            let Some(issued) = link.nonce.issued_at() else {
                debug!(nonce = %link.nonce, "Rejecting activation link with non-timestamp nonce");
                return false;
            };
            if now.saturating_duration_since(issued) > max_age {
                debug!(nonce = %link.nonce, "Rejecting expired activation link");
                return false;
            }
        }

        // Tokens are issued as lowercase hex; any other spelling is not ours.
        if !is_lower_hex(&link.token) {
            return false;
        }
        let Ok(token) = hex::decode(&link.token) else {
            return false;
        };
        self.digest(&link.nonce, &link.canonical)
            .verify_slice(&token)
            .is_ok()
    }
}

fn is_lower_hex(token: &str) -> bool {
    token
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
