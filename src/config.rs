//! Configuration loading and management
//!
//! Handles parsing of `gitsave.toml`, which lives inside the git directory
//! (`.git/gitsave.toml`, or at the root of a bare repository) so it is never
//! committed into the store it configures.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// File name of the configuration inside the git directory.
pub const CONFIG_FILENAME: &str = "gitsave.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name of the shared mainline branch
    #[serde(default = "default_mainline")]
    pub mainline: String,

    /// Move the mainline straight to a candidate that already descends from it
    /// instead of writing a merge commit
    #[serde(default = "default_true")]
    pub fast_forward: bool,

    /// Default author identity
    #[serde(default)]
    pub author: AuthorConfig,

    /// Lock token configuration
    #[serde(default)]
    pub lock: LockConfig,

    /// Remote publication configuration
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mainline: default_mainline(),
            fast_forward: true,
            author: AuthorConfig::default(),
            lock: LockConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

fn default_mainline() -> String {
    "master".to_string()
}

fn default_true() -> bool {
    true
}

/// Author identity used when nothing more specific is available
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Lock token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Reference created while a writer holds the critical section
    #[serde(default = "default_lock_ref")]
    pub ref_name: String,

    /// Sleep between acquisition attempts
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Give up after this many attempts (unset: wait forever)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

fn default_lock_ref() -> String {
    "refs/gitsave/lock".to_string()
}

fn default_retry_interval_ms() -> u64 {
    50
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ref_name: default_lock_ref(),
            retry_interval_ms: default_retry_interval_ms(),
            max_attempts: None,
        }
    }
}

/// Remote publication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Remote to fetch from and push to
    #[serde(default = "default_remote_name")]
    pub name: String,

    /// Credentials presented to the remote
    #[serde(default)]
    pub credentials: Credentials,

    /// Verify the remote's TLS certificate
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Give up publishing after this many rejected pushes (unset: retry forever)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_push_attempts: Option<u32>,
}

fn default_remote_name() -> String {
    "origin".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            name: default_remote_name(),
            credentials: Credentials::default(),
            verify_tls: true,
            max_push_attempts: None,
        }
    }
}

/// Stored credentials for the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
    /// ssh-agent for ssh remotes, git credential helpers otherwise
    #[default]
    Default,
    /// Plain username and password
    Userpass { username: String, password: String },
    /// Access token sent as the password of an https login
    Token {
        token: String,
        #[serde(default = "default_token_user")]
        username: String,
    },
}

fn default_token_user() -> String {
    "x-access-token".to_string()
}

impl Config {
    /// Load configuration from a `gitsave.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a git directory, or return defaults when the
    /// file is absent. A present but invalid file is an error.
    pub fn load_from_repo(git_dir: &Path) -> Result<Self> {
        let config_path = git_dir.join(CONFIG_FILENAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Full reference name of the mainline branch.
    pub fn mainline_ref(&self) -> String {
        format!("refs/heads/{}", self.mainline)
    }

    /// Remote-tracking reference the mainline is fetched into.
    pub fn remote_tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote.name, self.mainline)
    }

    fn validate(&self) -> Result<()> {
        let mainline = self.mainline.trim();
        if mainline.is_empty() {
            return Err(Error::InvalidConfig("mainline cannot be empty".to_string()));
        }
        if !git2::Reference::is_valid_name(&self.mainline_ref()) {
            return Err(Error::InvalidConfig(format!(
                "mainline: '{}' is not a valid branch name",
                self.mainline
            )));
        }
        if !self.lock.ref_name.starts_with("refs/")
            || !git2::Reference::is_valid_name(&self.lock.ref_name)
        {
            return Err(Error::InvalidConfig(format!(
                "lock.ref_name: '{}' is not a valid reference name",
                self.lock.ref_name
            )));
        }
        if self.lock.ref_name == self.mainline_ref() {
            return Err(Error::InvalidConfig(
                "lock.ref_name cannot be the mainline reference".to_string(),
            ));
        }
        if self.lock.max_attempts == Some(0) {
            return Err(Error::InvalidConfig(
                "lock.max_attempts must be >= 1".to_string(),
            ));
        }
        if self.remote.name.trim().is_empty() {
            return Err(Error::InvalidConfig("remote.name cannot be empty".to_string()));
        }
        if self.remote.max_push_attempts == Some(0) {
            return Err(Error::InvalidConfig(
                "remote.max_push_attempts must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
