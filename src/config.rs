use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Lifetime of a cached result set, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Upper bound on any single cache operation. Elapsed means the
    /// operation failed and the caller falls through to the store.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_op_timeout_ms() -> u64 {
    250
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Secret for HMAC token signing.
    pub token_secret: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
}

fn default_token_ttl_secs() -> i64 {
    7 * 24 * 3600
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }

    if config.cache.op_timeout_ms == 0 {
        anyhow::bail!("cache.op_timeout_ms must be > 0");
    }

    if config.auth.token_secret.len() < 16 {
        anyhow::bail!("auth.token_secret must be at least 16 characters");
    }

    if config.auth.token_ttl_secs < 1 {
        anyhow::bail!("auth.token_ttl_secs must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("shelf.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"[db]
path = "data/shelf.sqlite"

[server]
bind = "127.0.0.1:7410"

[auth]
token_secret = "0123456789abcdef0123456789abcdef"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.cache.ttl_secs, 3600);
        assert_eq!(cfg.cache.op_timeout_ms, 250);
        assert_eq!(cfg.auth.token_ttl_secs, 7 * 24 * 3600);
        assert_eq!(cfg.db.acquire_timeout_secs, 5);
    }

    #[test]
    fn test_reject_short_secret() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"[db]
path = "data/shelf.sqlite"

[server]
bind = "127.0.0.1:7410"

[auth]
token_secret = "short"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_reject_zero_ttl() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"[db]
path = "data/shelf.sqlite"

[server]
bind = "127.0.0.1:7410"

[cache]
ttl_secs = 0

[auth]
token_secret = "0123456789abcdef0123456789abcdef"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
