//! Request policy: the literal headers, timeout and retry settings shared by
//! every fetch in a run.
//!
//! Callers describe what they want with [`RequestOptions`], a typed struct with
//! named fields. [`RequestPolicy::from_options`] translates those options into
//! final header values once, before dispatch. The only per-request behavior
//! left is the dynamic referer, which is carried as an explicit flag and
//! resolved by [`RequestPolicy::referer_for`].

use std::time::Duration;

use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT,
};
use tracing::debug;
use url::Url;

use super::constants::{DEFAULT_BACKOFF_BASE, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS};
use super::error::ConfigError;
use super::retry::RetryPolicy;
use crate::user_agent::UserAgentPreset;

/// Accept header sent when the caller supplies none.
pub const DEFAULT_ACCEPT: &str = "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8";

/// Which User-Agent to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAgentChoice {
    /// One of the built-in presets.
    Preset(UserAgentPreset),
    /// A caller-supplied literal value.
    Custom(String),
}

impl Default for UserAgentChoice {
    fn default() -> Self {
        Self::Preset(UserAgentPreset::default())
    }
}

/// How the Referer header is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RefererMode {
    /// No Referer header.
    #[default]
    None,
    /// The same literal Referer on every request.
    Fixed(String),
    /// The parent directory of each request URL.
    Dynamic,
}

/// User-facing request options, before translation into headers.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub user_agent: UserAgentChoice,
    pub referer: RefererMode,
    /// Send `Accept-Encoding: identity` instead of negotiating compression.
    pub identity_encoding: bool,
    /// Send `Connection: close` so connections are never reused.
    pub connection_close: bool,
    /// Accept header override; [`DEFAULT_ACCEPT`] when `None`.
    pub accept: Option<String>,
    /// Additional static headers as (name, value) pairs.
    pub extra_headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Backoff base in seconds.
    pub backoff_base: f64,
    /// Random delay of up to this much is added to every computed backoff.
    pub retry_jitter: Duration,
    /// Retryable statuses; the default set when `None`.
    pub retryable_statuses: Option<Vec<u16>>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            user_agent: UserAgentChoice::default(),
            referer: RefererMode::default(),
            identity_encoding: false,
            connection_close: false,
            accept: None,
            extra_headers: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            retry_jitter: Duration::ZERO,
            retryable_statuses: None,
        }
    }
}

/// Immutable per-run request configuration, shared read-only by all slots.
#[derive(Debug, Clone)]
pub struct RequestPolicy {
    headers: HeaderMap,
    timeout: Duration,
    retry: RetryPolicy,
    dynamic_referer: bool,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        if let Ok(ua) = HeaderValue::from_str(&UserAgentPreset::Tool.header_value()) {
            headers.insert(USER_AGENT, ua);
        }
        Self {
            headers,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            dynamic_referer: false,
        }
    }
}

impl RequestPolicy {
    /// Builds the policy from user options.
    ///
    /// Header precedence, lowest to highest: default Accept and User-Agent,
    /// extra headers, then the named options (accept override, fixed referer,
    /// identity encoding, connection close).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero timeout, an unparseable header or a
    /// fixed referer that is not an absolute URL.
    pub fn from_options(options: &RequestOptions) -> Result<Self, ConfigError> {
        if options.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));

        let user_agent = match &options.user_agent {
            UserAgentChoice::Preset(preset) => preset.header_value(),
            UserAgentChoice::Custom(value) => value.clone(),
        };
        headers.insert(USER_AGENT, header_value("User-Agent", &user_agent)?);

        for (name, value) in &options.extra_headers {
            let parsed_name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| {
                ConfigError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(parsed_name, header_value(name, value.trim())?);
        }

        if let Some(accept) = &options.accept {
            headers.insert(ACCEPT, header_value("Accept", accept)?);
        }

        if let RefererMode::Fixed(referer) = &options.referer {
            Url::parse(referer).map_err(|_| ConfigError::InvalidReferer {
                url: referer.clone(),
            })?;
            headers.insert(REFERER, header_value("Referer", referer)?);
        }

        if options.identity_encoding {
            headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        }

        if options.connection_close {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }

        let dynamic_referer =
            options.referer == RefererMode::Dynamic && !headers.contains_key(REFERER);

        let mut retry = RetryPolicy::new(options.max_retries, options.backoff_base)
            .with_jitter(options.retry_jitter);
        if let Some(statuses) = &options.retryable_statuses {
            retry = retry.with_retryable_statuses(statuses.iter().copied());
        }

        debug!(
            header_count = headers.len(),
            timeout_ms = options.timeout.as_millis(),
            max_retries = retry.max_retries(),
            jitter_ms = options.retry_jitter.as_millis(),
            dynamic_referer,
            "built request policy"
        );

        Ok(Self {
            headers,
            timeout: options.timeout,
            retry,
            dynamic_referer,
        })
    }

    /// Final, literal headers sent with every request.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Connect and per-read timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retry budget, backoff curve and retryable statuses.
    #[must_use]
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.retry.max_retries()
    }

    #[must_use]
    pub fn backoff_base(&self) -> f64 {
        self.retry.backoff_base()
    }

    /// Whether each request derives its own Referer from its URL.
    #[must_use]
    pub fn dynamic_referer(&self) -> bool {
        self.dynamic_referer
    }

    /// Per-request Referer for `url`, when dynamic referer is in effect.
    ///
    /// Does not touch the shared header map.
    #[must_use]
    pub fn referer_for(&self, url: &Url) -> Option<HeaderValue> {
        if !self.dynamic_referer {
            return None;
        }
        let parent = derive_parent_referer(url)?;
        HeaderValue::from_str(parent.as_str()).ok()
    }
}

/// The URL's directory: same scheme and host, last path segment removed,
/// query and fragment dropped.
///
/// `https://host/a/b/c.png` becomes `https://host/a/b/`.
#[must_use]
pub fn derive_parent_referer(url: &Url) -> Option<Url> {
    if url.cannot_be_a_base() {
        return None;
    }
    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);
    base.join("./").ok()
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
