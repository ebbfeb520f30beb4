//! Client configuration

use crate::error::{ClientError, Result};
use crate::transport::Credentials;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root URL of the gpodder.net API
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Account name for authenticated endpoints
    #[serde(default)]
    pub username: Option<String>,

    /// Account password
    #[serde(default)]
    pub password: Option<String>,

    /// Default device for device-scoped endpoints
    #[serde(default)]
    pub device_id: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_server_url() -> String {
    "https://gpodder.net".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("mygpo-client/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            username: None,
            password: None,
            device_id: None,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Config for an account on the default server
    pub fn with_account(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    /// Load config from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the config can be used to build a client
    pub fn validate(&self) -> Result<()> {
        let server = self.server()?;
        if !matches!(server.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "server_url must use http or https, got {}",
                server.scheme()
            )));
        }

        if self.username.is_some() != self.password.is_some() {
            return Err(ClientError::Config(
                "username and password must be set together".into(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ClientError::Config("timeout_secs must be positive".into()));
        }

        Ok(())
    }

    /// Parsed server root, without a trailing slash in its path
    pub fn server(&self) -> Result<Url> {
        Ok(Url::parse(self.server_url.trim_end_matches('/'))?)
    }

    /// Account credentials, if both username and password are configured
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials::new(username, password)),
            _ => None,
        }
    }
}
