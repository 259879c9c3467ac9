//! Client runtime configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";

/// Default timeout for ordinary API requests (30 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on a token refresh call (15 seconds).
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration for a [`crate::CoveraClient`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Backend base URL; endpoint paths are appended to it.
    pub api_url: String,
    /// Per-request timeout applied by the transport.
    pub request_timeout: Duration,
    /// Upper bound on a single refresh operation.
    pub refresh_timeout: Duration,
    /// Where the durable credential document lives. `None` keeps credentials
    /// in memory only.
    pub credentials_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                      | Default                                  |
    /// |-------------------------------|------------------------------------------|
    /// | `COVERA_API_URL`              | `http://127.0.0.1:8080/api`              |
    /// | `COVERA_REQUEST_TIMEOUT_SECS` | `30`                                     |
    /// | `COVERA_REFRESH_TIMEOUT_SECS` | `15`                                     |
    /// | `COVERA_CREDENTIALS_PATH`     | `<data dir>/covera/credentials.json`     |
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("COVERA_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into()),
            request_timeout: secs_from_env("COVERA_REQUEST_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            refresh_timeout: secs_from_env("COVERA_REFRESH_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_REFRESH_TIMEOUT),
            credentials_path: std::env::var("COVERA_CREDENTIALS_PATH")
                .ok()
                .map(PathBuf::from)
                .or_else(default_credentials_path),
        }
    }

    /// Config pointing at `api_url` with in-memory credentials.
    pub fn in_memory(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            credentials_path: None,
        }
    }

    #[must_use]
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::in_memory(DEFAULT_API_URL)
    }
}

/// `<data dir>/covera/credentials.json`, if the platform has a data dir.
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("covera").join("credentials.json"))
}

fn secs_from_env(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_has_no_credentials_path() {
        let config = ClientConfig::in_memory("http://localhost:9000");
        assert_eq!(config.api_url, "http://localhost:9000");
        assert!(config.credentials_path.is_none());
        assert_eq!(config.refresh_timeout, DEFAULT_REFRESH_TIMEOUT);
    }

    #[test]
    fn refresh_timeout_default_is_bounded() {
        let t = ClientConfig::default().refresh_timeout;
        assert!(t >= Duration::from_secs(10) && t <= Duration::from_secs(30));
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::default()
            .with_refresh_timeout(Duration::from_secs(3))
            .with_credentials_path("/tmp/creds.json");
        assert_eq!(config.refresh_timeout, Duration::from_secs(3));
        assert_eq!(
            config.credentials_path.as_deref(),
            Some(std::path::Path::new("/tmp/creds.json"))
        );
    }
}
