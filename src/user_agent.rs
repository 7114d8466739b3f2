//! User-Agent presets for mirror requests.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/sitemirror";

const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const FIREFOX_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0";

const SAFARI_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15";

/// Default User-Agent identifying the tool.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("sitemirror/{version} (+{PROJECT_UA_URL})")
}

/// Built-in User-Agent choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAgentPreset {
    /// Identifies the tool and its version.
    #[default]
    Tool,
    /// Desktop Chrome.
    Chrome,
    /// Desktop Firefox.
    Firefox,
    /// Desktop Safari.
    Safari,
}

impl UserAgentPreset {
    /// The literal header value for this preset.
    #[must_use]
    pub fn header_value(self) -> String {
        match self {
            Self::Tool => default_user_agent(),
            Self::Chrome => CHROME_USER_AGENT.to_string(),
            Self::Firefox => FIREFOX_USER_AGENT.to_string(),
            Self::Safari => SAFARI_USER_AGENT.to_string(),
        }
    }

    /// Stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Safari => "safari",
        }
    }
}

impl fmt::Display for UserAgentPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserAgentPreset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tool" => Ok(Self::Tool),
            "chrome" => Ok(Self::Chrome),
            "firefox" => Ok(Self::Firefox),
            "safari" => Ok(Self::Safari),
            other => Err(format!(
                "unknown user agent preset '{other}' (expected tool, chrome, firefox or safari)"
            )),
        }
    }
}
