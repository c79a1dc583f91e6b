//! Configuration loading and management.
//!
//! Sources, lowest to highest priority: built-in defaults, a YAML file
//! (`--config`, `TASKDECK_CONFIG_PATH`, `./taskdeck.yaml`, `~/.taskdeck/config.yaml`),
//! `TASKDECK_*` environment variables, then CLI flags applied by the binary.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub policy: PolicyConfig,
}

/// HTTP listener and storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory for uploaded profile images.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    /// Base URL used when building image links. Defaults to `http://{bind}:{port}`.
    #[serde(default)]
    pub public_url: Option<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            db_path: default_db_path(),
            uploads_dir: default_uploads_dir(),
            public_url: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".taskdeck/taskdeck.db")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

/// Token signing, password hashing and the admin invite secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Required.
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: u32,

    /// Registration with this exact value creates an admin account.
    #[serde(default)]
    pub admin_invite_token: Option<String>,

    /// Argon2id memory cost in KiB.
    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,

    /// Argon2id pass count.
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_days: default_token_ttl_days(),
            admin_invite_token: None,
            hash_memory_kib: default_hash_memory_kib(),
            hash_iterations: default_hash_iterations(),
        }
    }
}

fn default_token_ttl_days() -> u32 {
    7
}

fn default_hash_memory_kib() -> u32 {
    19 * 1024
}

fn default_hash_iterations() -> u32 {
    2
}

/// Access policy switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Restrict general task edits (`PUT /api/tasks/{id}`) to admins.
    /// Off by default: any authenticated caller may edit.
    #[serde(default)]
    pub admin_only_task_updates: bool,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Locate and load the config file (if any), then apply environment overrides.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match Self::config_file(explicit) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn config_file(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var("TASKDECK_CONFIG_PATH") {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from("taskdeck.yaml");
        if local.exists() {
            return Some(local);
        }
        dirs::home_dir()
            .map(|home| home.join(".taskdeck").join("config.yaml"))
            .filter(|path| path.exists())
    }

    /// Apply `TASKDECK_*` overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("TASKDECK_BIND") {
            self.server.bind = bind;
        }

        if let Some(port) = lookup("TASKDECK_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid TASKDECK_PORT: {}", port),
            }
        }

        if let Some(db_path) = lookup("TASKDECK_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }

        if let Some(dir) = lookup("TASKDECK_UPLOADS_DIR") {
            self.server.uploads_dir = PathBuf::from(dir);
        }

        if let Some(url) = lookup("TASKDECK_PUBLIC_URL") {
            self.server.public_url = Some(url);
        }

        if let Some(secret) = lookup("TASKDECK_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Some(token) = lookup("TASKDECK_ADMIN_INVITE_TOKEN") {
            self.auth.admin_invite_token = Some(token);
        }
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            bail!("auth.jwt_secret must be set (or TASKDECK_JWT_SECRET)");
        }
        if self.auth.token_ttl_days == 0 {
            bail!("auth.token_ttl_days must be at least 1");
        }
        Ok(())
    }

    /// Base URL for links to uploaded files, without a trailing slash.
    pub fn public_url(&self) -> String {
        match &self.server.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.server.bind, self.server.port),
        }
    }

    /// Ensure the database and uploads directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&self.server.uploads_dir)?;
        Ok(())
    }
}
