//! Service configuration.
//!
//! Loaded from a TOML file when one exists, otherwise built from defaults.
//! `FILEGATE_SECRET_KEY` and `FILEGATE_UPLOADS_DIR` override the file.

use crate::auth::credentials::DEFAULT_HASH_ROUNDS;
use crate::auth::session::DEFAULT_SESSION_TTL_SECS;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the session signing secret.
pub const SECRET_KEY_ENV: &str = "FILEGATE_SECRET_KEY";

/// Environment variable overriding the upload directory.
pub const UPLOADS_DIR_ENV: &str = "FILEGATE_UPLOADS_DIR";

/// Default upload cap: 10 MiB per request.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 << 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on an upload request body, multipart framing included.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// PBKDF2 rounds for new password hashes.
    #[serde(default = "default_hash_rounds")]
    pub hash_rounds: u32,
    /// HMAC secret for session tokens. A random per-process key is generated
    /// when unset, which invalidates all sessions on restart.
    #[serde(default, skip_serializing)]
    pub secret_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("hash_rounds", &self.hash_rounds)
            .field(
                "secret_key",
                &self.secret_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl_secs(),
            hash_rounds: default_hash_rounds(),
            secret_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one blob per uploaded filename.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
        }
    }
}

impl Config {
    /// Load `path` if it exists, fall back to defaults otherwise, then apply
    /// environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            Self::from_toml(&raw)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Per-user default config path, e.g. `~/.config/filegate/config.toml` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "filegate", "filegate")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Some(secret) = non_empty_env(SECRET_KEY_ENV) {
            self.auth.secret_key = Some(secret);
        }
        if let Some(dir) = non_empty_env(UPLOADS_DIR_ENV) {
            self.storage.uploads_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.session_ttl_secs == 0 {
            bail!("auth.session_ttl_secs must be greater than zero");
        }
        if self.auth.hash_rounds == 0 {
            bail!("auth.hash_rounds must be greater than zero");
        }
        if self.gateway.max_upload_bytes == 0 {
            bail!("gateway.max_upload_bytes must be greater than zero");
        }
        if self.gateway.request_timeout_secs == 0 {
            bail!("gateway.request_timeout_secs must be greater than zero");
        }
        if matches!(&self.auth.secret_key, Some(s) if s.trim().is_empty()) {
            bail!("auth.secret_key must not be blank");
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_owned())
    })
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_hash_rounds() -> u32 {
    DEFAULT_HASH_ROUNDS
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_service_contract() {
        let config = Config::default();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.auth.session_ttl_secs, 300);
        assert_eq!(config.storage.uploads_dir, PathBuf::from("uploads"));
        assert!(config.auth.secret_key.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [gateway]
            port = 9000

            [auth]
            secret_key = "from-file"
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.auth.secret_key.as_deref(), Some("from-file"));
        assert_eq!(config.auth.hash_rounds, DEFAULT_HASH_ROUNDS);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.gateway.port, 8080);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "[gateway\nport = ").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn zero_values_fail_validation() {
        let mut config = Config::default();
        config.auth.session_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.gateway.max_upload_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.secret_key = Some("   ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn secret_is_redacted_and_not_serialized() {
        let mut config = Config::default();
        config.auth.secret_key = Some("hunter2".into());
        assert!(!format!("{config:?}").contains("hunter2"));
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("hunter2"));
    }
}
