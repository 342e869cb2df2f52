//! Connection configuration.
//!
//! A [`ClientConfig`] describes how to reach the GraphQL endpoint. Clients
//! built without an explicit configuration use the process-level default
//! installed with [`configure`], or read it from the environment:
//!
//! - `HASURA_URL`: endpoint URL (required)
//! - `HASURA_ADMIN_SECRET`: sent as `X-Hasura-Admin-Secret`
//! - `HASURA_ROLE`: sent as `X-Hasura-Role`

use indexmap::IndexMap;
use std::env;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::retry::{ExponentialBackoff, RetryPolicy};

pub const URL_ENV: &str = "HASURA_URL";
pub const ADMIN_SECRET_ENV: &str = "HASURA_ADMIN_SECRET";
pub const ROLE_ENV: &str = "HASURA_ROLE";

pub const ADMIN_SECRET_HEADER: &str = "X-Hasura-Admin-Secret";
pub const ROLE_HEADER: &str = "X-Hasura-Role";

static DEFAULT_CONFIG: RwLock<Option<ClientConfig>> = RwLock::new(None);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// URL of the GraphQL endpoint.
    pub url: String,
    /// Timeout of each connect, write and read step.
    pub timeout: Duration,
    /// Headers sent with every request.
    pub headers: IndexMap<String, String>,
    /// Policy deciding whether failed requests are repeated.
    pub retry_policy: Arc<dyn RetryPolicy>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(30),
            headers: IndexMap::new(),
            retry_policy: Arc::new(ExponentialBackoff::default()),
        }
    }
}

impl ClientConfig {
    /// Creates a new config with a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Reads the configuration from `HASURA_*` environment variables.
    pub fn from_env() -> SdkResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SdkResult<Self> {
        let url = lookup(URL_ENV).filter(|url| !url.is_empty()).ok_or_else(|| {
            SdkError::new(ErrorCode::InvalidUrl, format!("{URL_ENV} is not set"))
        })?;

        let mut config = Self::new(url);
        if let Some(secret) = lookup(ADMIN_SECRET_ENV) {
            config = config.admin_secret(secret);
        }
        if let Some(role) = lookup(ROLE_ENV) {
            config = config.role(role);
        }
        Ok(config)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a header sent with every request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn admin_secret(self, secret: impl Into<String>) -> Self {
        self.header(ADMIN_SECRET_HEADER, secret)
    }

    pub fn role(self, role: impl Into<String>) -> Self {
        self.header(ROLE_HEADER, role)
    }

    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }
}

/// Installs the process-level default configuration.
pub fn configure(config: ClientConfig) {
    *DEFAULT_CONFIG
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(config);
}

/// Returns the process-level default configuration, falling back to the
/// environment when none was installed.
pub fn default_config() -> SdkResult<ClientConfig> {
    let installed = DEFAULT_CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    match installed {
        Some(config) => Ok(config),
        None => ClientConfig::from_env(),
    }
}
