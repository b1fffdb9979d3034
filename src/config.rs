use std::fs;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: "imap.example.com".to_string(),
            port: 993,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS on `port` is the primary connection strategy.
    pub ssl: bool,
    /// Permit falling back to STARTTLS on the standard submission port.
    #[serde(default)]
    pub starttls_fallback: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.example.com".to_string(),
            port: 465,
            ssl: true,
            starttls_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub user: String,
    pub password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user: "user@example.com".to_string(),
            password: String::new(),
        }
    }
}

/// Server-side names of the well-known folder roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderRoles {
    pub inbox: String,
    pub sent: String,
    pub trash: String,
    pub spam: String,
}

impl Default for FolderRoles {
    fn default() -> Self {
        Self {
            inbox: "INBOX".to_string(),
            sent: "INBOX.Sent".to_string(),
            trash: "INBOX.Trash".to_string(),
            spam: "INBOX.Junk".to_string(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub imap: ImapConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub folders: FolderRoles,
    /// Overall per-operation network timeout in seconds; 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}
