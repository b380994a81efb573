//! Configuration types for moex-harvest

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote endpoint configuration
///
/// Everything the fetch layer needs to build one request: URL, headers, the
/// form-body template, and the per-request timeout. Deserializable so a run
/// can point at a mirror or a local fixture server without code changes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Endpoint URL (default: the MOEX open-positions CSV endpoint)
    #[serde(default = "default_url")]
    pub url: String,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Form-body template with `{date}`, `{day}`, `{month}` and `{year}`
    /// placeholders
    ///
    /// `{date}` is the requested key in `YYYYMMDD` form; the other three are
    /// the *previous* calendar day's components, per the endpoint's form
    /// convention.
    #[serde(default = "default_body_template")]
    pub body_template: String,

    /// Per-request timeout in seconds (default: 30)
    ///
    /// A fetch that exceeds this is abandoned and counted as a failure for
    /// that date; there is no retry.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl EndpointConfig {
    /// Per-request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            user_agent: default_user_agent(),
            body_template: default_body_template(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_url() -> String {
    "https://www.moex.com/ru/derivatives/open-positions-new.aspx/open-positions-csv.aspx"
        .to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36 Edg/135.0.0.0"
        .to_string()
}

fn default_body_template() -> String {
    "date={date}&day={day}&month={month}&year={year}".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}
