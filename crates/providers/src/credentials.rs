//! Credential loading for vendor provider clients
//!
//! Supports loading credentials from:
//! - JSON files (`{"token": "..."}` or `{"api_key": "...", "api_secret": "..."}`)
//! - Environment variables
//! - Plain text files (entire content is the token)

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use certsync_core::ConfigError;

/// Provider API credentials
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Single bearer/API token
    Token(String),
    /// Key + secret pair for vendors that sign requests
    KeySecret { api_key: String, api_secret: String },
}

impl Credentials {
    /// The token, for token-authenticated vendors
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Token(token) => Some(token),
            Self::KeySecret { .. } => None,
        }
    }

    /// Value usable as a bearer token (key/secret pairs join with `:`)
    pub fn as_bearer_token(&self) -> String {
        match self {
            Self::Token(token) => token.clone(),
            Self::KeySecret {
                api_key,
                api_secret,
            } => format!("{}:{}", api_key, api_secret),
        }
    }
}

/// Credential loader for provider authentication
#[derive(Debug, Default)]
pub struct CredentialLoader;

impl CredentialLoader {
    /// Load credentials from a file
    ///
    /// # Security
    ///
    /// Warns when the file is readable by group/other on Unix (should be
    /// 0600 or 0400).
    pub fn load_from_file(path: &Path) -> Result<Credentials, ConfigError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let metadata = fs::metadata(path).map_err(|e| {
                ConfigError::Credentials(format!(
                    "Failed to read credentials file '{}': {}",
                    path.display(),
                    e
                ))
            })?;

            let file_mode = metadata.permissions().mode() & 0o777;
            if file_mode & 0o077 != 0 {
                warn!(
                    path = %path.display(),
                    mode = format!("{:o}", file_mode),
                    "Credentials file has overly permissive permissions (should be 0600 or 0400)"
                );
            }
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::Credentials(format!(
                "Failed to read credentials file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::parse_credentials(&content, &path.display().to_string())
    }

    /// Load credentials from an environment variable
    pub fn load_from_env(var_name: &str) -> Result<Credentials, ConfigError> {
        let value = std::env::var(var_name).map_err(|_| {
            ConfigError::Credentials(format!("Environment variable '{}' not set", var_name))
        })?;
        Self::parse_credentials(&value, var_name)
    }

    fn parse_credentials(content: &str, source: &str) -> Result<Credentials, ConfigError> {
        let trimmed = content.trim();

        if trimmed.starts_with('{') {
            return Self::parse_json_credentials(trimmed);
        }

        if trimmed.is_empty() {
            return Err(ConfigError::Credentials(format!(
                "Credentials source '{}' is empty",
                source
            )));
        }

        debug!(source = %source, "Loaded credentials as plain text token");
        Ok(Credentials::Token(trimmed.to_string()))
    }

    fn parse_json_credentials(json: &str) -> Result<Credentials, ConfigError> {
        #[derive(Deserialize)]
        struct TokenFormat {
            token: Option<String>,
            api_token: Option<String>,
        }

        #[derive(Deserialize)]
        struct KeySecretFormat {
            api_key: String,
            api_secret: String,
        }

        if let Ok(parsed) = serde_json::from_str::<KeySecretFormat>(json) {
            return Ok(Credentials::KeySecret {
                api_key: parsed.api_key,
                api_secret: parsed.api_secret,
            });
        }

        if let Ok(parsed) = serde_json::from_str::<TokenFormat>(json) {
            if let Some(token) = parsed.token.or(parsed.api_token) {
                if !token.is_empty() {
                    return Ok(Credentials::Token(token));
                }
            }
        }

        Err(ConfigError::Credentials(
            "JSON credentials must contain 'token', 'api_token', or 'api_key'+'api_secret'"
                .to_string(),
        ))
    }
}
