use std::time::Duration;

/// Connection settings for the HTTP backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the things/channels management API.
    pub store_url: String,
    /// Full URL of the browse gateway endpoint.
    pub browse_url: String,
    /// Sent verbatim in the `Authorization` header when present.
    pub token: Option<String>,
    /// Per-request timeout applied by the HTTP client.
    pub timeout: Duration,
}

fn default_store_url() -> String {
    std::env::var("OPCUA_STORE_URL").unwrap_or_else(|_| "http://localhost".to_string())
}

fn default_browse_url() -> String {
    std::env::var("OPCUA_BROWSE_URL").unwrap_or_else(|_| "http://localhost:8188/browse".to_string())
}

fn default_token() -> Option<String> {
    std::env::var("OPCUA_STORE_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
}

fn default_timeout() -> Duration {
    let secs = std::env::var("OPCUA_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);
    Duration::from_secs(secs)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            browse_url: default_browse_url(),
            token: default_token(),
            timeout: default_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config pointing both backends at explicit URLs, without a token.
    pub fn new(store_url: impl Into<String>, browse_url: impl Into<String>) -> Self {
        Self {
            store_url: store_url.into(),
            browse_url: browse_url.into(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `store_url` joined with `path`, tolerating trailing slashes.
    #[cfg_attr(not(feature = "http-backend"), allow(dead_code))]
    pub(crate) fn store_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.store_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
