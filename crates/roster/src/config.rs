//! Configuration for the roster client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.clashofclans.com/v1";

/// Configuration for the [`RosterClient`](crate::RosterClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Base URL of the roster API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Tag of the group whose roster is watched.
    #[serde(default)]
    pub group_tag: String,

    /// Bearer credential sent with every request.
    #[serde(default, skip_serializing)]
    pub token: String,

    /// Timeout for a single request.
    #[serde(with = "duration_secs", default = "default_timeout", rename = "timeout_secs")]
    pub timeout: Duration,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            group_tag: String::new(),
            token: String::new(),
            timeout: default_timeout(),
        }
    }
}

impl RosterConfig {
    /// Create a config for the given group and credential.
    pub fn new(group_tag: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            group_tag: group_tag.into(),
            token: token.into(),
            ..Default::default()
        }
    }

    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
