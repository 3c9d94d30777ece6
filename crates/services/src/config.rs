use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Deployment the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Dev,
    #[default]
    Staging,
    Prod,
}

impl Environment {
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Dev => "Development",
            Self::Staging => "Staging",
            Self::Prod => "Production",
        }
    }

    #[must_use]
    pub fn default_server_url(self) -> &'static str {
        match self {
            Self::Dev => "http://localhost:8080/api/",
            Self::Staging => "https://staging.progress.example.com/api/",
            Self::Prod => "https://progress.example.com/api/",
        }
    }

    /// Response header that carries the session token after login.
    #[must_use]
    pub fn auth_header_key(self) -> &'static str {
        match self {
            Self::Dev | Self::Staging => "Authentication-Info",
            Self::Prod => "X-Auth",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
        };
        f.write_str(name)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Dev),
            "staging" => Ok(Self::Staging),
            "prod" | "production" => Ok(Self::Prod),
            _ => Err(ConfigError::UnknownEnvironment(s.to_string())),
        }
    }
}

/// Where and how to reach the remote progress store.
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub environment: Environment,
    pub base_url: Url,
    pub auth_header_key: String,
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Defaults for `environment`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the built-in server url does not parse.
    pub fn for_environment(environment: Environment) -> Result<Self, ConfigError> {
        Ok(Self {
            environment,
            base_url: parse_base_url(environment.default_server_url())?,
            auth_header_key: environment.auth_header_key().to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Read `PROGRESS_ENV`, `PROGRESS_SERVER_URL` and `PROGRESS_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("PROGRESS_ENV") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => Environment::default(),
        };
        let mut config = Self::for_environment(environment)?;

        if let Ok(raw) = env::var("PROGRESS_SERVER_URL") {
            if !raw.trim().is_empty() {
                config = config.with_base_url(&raw)?;
            }
        }
        if let Ok(raw) = env::var("PROGRESS_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Point at a different server, keeping the rest.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `raw` is not an absolute url.
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.base_url = parse_base_url(raw)?;
        Ok(self)
    }

    /// Resolve an endpoint relative to the api root.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if `endpoint` cannot be joined.
    pub fn endpoint(&self, endpoint: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(endpoint.trim_start_matches('/'))
    }
}

// `Url::join` replaces the last segment unless the base ends with a slash.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&normalized).map_err(|source| ConfigError::InvalidUrl {
        raw: raw.to_string(),
        source,
    })
}
