use std::path::PathBuf;

use anyhow::{Context, Result};

/// Engine configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub content_pack_dir: PathBuf,
    pub content_pack_version: String,
    /// Pre-production content validation: missing content is an error instead of synthesized.
    pub strict_content: bool,
    pub capture_explain: bool,
    pub catalog_cache_ttl_secs: i64,
    pub explain_items_max: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            content_pack_dir: PathBuf::from(require_env("CONTENT_PACK_DIR")?),
            content_pack_version: require_env("CONTENT_PACK_VERSION")?,
            strict_content: parse_bool(optional_env("STRICT_CONTENT").as_deref())
                .context("STRICT_CONTENT must be a boolean")?,
            capture_explain: parse_bool(optional_env("CAPTURE_EXPLAIN").as_deref())
                .context("CAPTURE_EXPLAIN must be a boolean")?,
            catalog_cache_ttl_secs: optional_env("CATALOG_CACHE_TTL_SECS")
                .unwrap_or_else(|| "300".to_string())
                .parse::<i64>()
                .context("CATALOG_CACHE_TTL_SECS must be an integer")?,
            explain_items_max: optional_env("EXPLAIN_ITEMS_MAX")
                .unwrap_or_else(|| "60".to_string())
                .parse::<usize>()
                .context("EXPLAIN_ITEMS_MAX must be a non-negative integer")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Directory holding the documents of the configured pack version.
    pub fn pack_root(&self) -> PathBuf {
        self.content_pack_dir.join(&self.content_pack_version)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(raw: Option<&str>) -> Result<bool> {
    match raw.map(|s| s.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("unrecognized boolean '{other}'"),
        },
    }
}
