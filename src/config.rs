//! Configuration options for the Sample Exchange client

use std::path::PathBuf;
use std::time::Duration;

use log::warn;

use crate::error::Error;
use crate::window::WindowOverride;

/// Environment variable holding the API base URL
pub const ENV_API_URL: &str = "SAMPLE_EXCHANGE_API_URL";
/// Environment variable holding the developer window override
pub const ENV_WINDOW_OVERRIDE: &str = "SAMPLE_EXCHANGE_WINDOW_OVERRIDE";
/// Environment variable holding the token file location
pub const ENV_TOKEN_FILE: &str = "SAMPLE_EXCHANGE_TOKEN_FILE";
/// Environment variable holding the request timeout in seconds
pub const ENV_TIMEOUT_SECS: &str = "SAMPLE_EXCHANGE_TIMEOUT_SECS";

/// Storage key under which the bearer token is persisted
pub const TOKEN_STORAGE_KEY: &str = "access_token";

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Configuration options for the Sample Exchange client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of the server; API routes live under `<api_url>/api`
    pub api_url: String,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Whether the bearer token survives process restarts
    pub persist_session: bool,

    /// Where the persisted token lives when `persist_session` is set
    pub token_file: Option<PathBuf>,

    /// Developer bypass for access windows, fixed for the client's lifetime
    pub window_override: WindowOverride,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Some(Duration::from_secs(30)),
            persist_session: true,
            token_file: None,
            window_override: WindowOverride::Defer,
        }
    }
}

impl ClientOptions {
    /// Load options from the process environment
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load options through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            options.api_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::config(format!("{} must be a number of seconds, got {:?}", ENV_TIMEOUT_SECS, raw))
            })?;
            options.request_timeout = if secs == 0 {
                None
            } else {
                Some(Duration::from_secs(secs))
            };
        }

        if let Some(path) = lookup(ENV_TOKEN_FILE).filter(|v| !v.trim().is_empty()) {
            options.token_file = Some(PathBuf::from(path));
        }

        options.window_override = match lookup(ENV_WINDOW_OVERRIDE) {
            Some(raw) => WindowOverride::parse(&raw).unwrap_or_else(|| {
                warn!(
                    "Ignoring ambiguous {} value {:?}; access windows follow the clock",
                    ENV_WINDOW_OVERRIDE, raw
                );
                WindowOverride::Defer
            }),
            None => WindowOverride::Defer,
        };

        Ok(options)
    }

    /// Root of the JSON API
    pub fn api_root(&self) -> String {
        format!("{}/api", self.api_url.trim_end_matches('/'))
    }

    /// Resolved location of the token file
    pub fn resolved_token_file(&self) -> Option<PathBuf> {
        self.token_file.clone().or_else(|| {
            dirs::data_dir().map(|dir| dir.join("sample-exchange").join(TOKEN_STORAGE_KEY))
        })
    }

    /// Set the API base URL
    pub fn with_api_url(mut self, value: &str) -> Self {
        self.api_url = value.trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set whether to persist the session
    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }

    /// Set the token file location
    pub fn with_token_file(mut self, value: PathBuf) -> Self {
        self.token_file = Some(value);
        self
    }

    /// Set the window override
    pub fn with_window_override(mut self, value: WindowOverride) -> Self {
        self.window_override = value;
        self
    }
}
