//! Pipeline configuration: `config/pipeline.toml` plus env overrides.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::banner::BannerTimings;
use crate::scoring::ScoreWeights;

pub const DEFAULT_PIPELINE_CONFIG_PATH: &str = "config/pipeline.toml";
pub const ENV_PIPELINE_CONFIG: &str = "FEED_PIPELINE_CONFIG";
pub const ENV_STORAGE_DIR: &str = "FEED_STORAGE_DIR";
pub const ENV_BANNER_AUTO_DISMISS_MS: &str = "FEED_BANNER_AUTO_DISMISS_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingLimits {
    /// Persistent notification list cap.
    pub notifications: usize,
    /// Critical-alerts list cap.
    pub critical: usize,
}

impl Default for RoutingLimits {
    fn default() -> Self {
        Self {
            notifications: 50,
            critical: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub scoring: ScoreWeights,
    pub banner: BannerTimings,
    pub routing: RoutingLimits,
    pub storage: StorageConfig,
}

impl PipelineConfig {
    /// Resolve the path (env or default), read it if present, apply env
    /// overrides. A missing file means defaults; a malformed one is an error.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_PIPELINE_CONFIG)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_PIPELINE_CONFIG_PATH));

        let mut cfg = Self::from_path(&path)?;
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(s) => Self::from_toml_str(&s)
                .with_context(|| format!("pipeline config at {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    target: "feed::config",
                    path = %path.display(),
                    "no pipeline config, using defaults"
                );
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(ENV_STORAGE_DIR) {
            if !dir.trim().is_empty() {
                self.storage.dir = PathBuf::from(dir);
            }
        }
        if let Some(ms) = parse_ms_env(std::env::var(ENV_BANNER_AUTO_DISMISS_MS).ok()) {
            self.banner.auto_dismiss_ms = ms;
        }
    }
}

/// Positive integer milliseconds; anything else is ignored.
fn parse_ms_env(raw: Option<String>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok().filter(|ms| *ms > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            [scoring]
            reliability = 0.5

            [routing]
            critical = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.scoring.reliability, 0.5);
        assert_eq!(cfg.scoring.freshness, 0.22);
        assert_eq!(cfg.routing.critical, 5);
        assert_eq!(cfg.routing.notifications, 50);
        assert_eq!(cfg.banner, BannerTimings::default());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(PipelineConfig::from_toml_str("[banner]\nstagger_ms = \"soon\"").is_err());
    }

    #[test]
    fn ms_env_parsing() {
        assert_eq!(parse_ms_env(Some("1500".into())), Some(1500));
        assert_eq!(parse_ms_env(Some("0".into())), None);
        assert_eq!(parse_ms_env(Some("fast".into())), None);
        assert_eq!(parse_ms_env(None), None);
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "[banner]\nauto_dismiss_ms = 9000\n").unwrap();

        std::env::set_var(ENV_PIPELINE_CONFIG, &path);
        std::env::set_var(ENV_STORAGE_DIR, "/tmp/feed-state");
        std::env::set_var(ENV_BANNER_AUTO_DISMISS_MS, "1200");
        let cfg = PipelineConfig::load().unwrap();
        std::env::remove_var(ENV_PIPELINE_CONFIG);
        std::env::remove_var(ENV_STORAGE_DIR);
        std::env::remove_var(ENV_BANNER_AUTO_DISMISS_MS);

        assert_eq!(cfg.banner.auto_dismiss_ms, 1200);
        assert_eq!(cfg.storage.dir, PathBuf::from("/tmp/feed-state"));
    }

    #[test]
    #[serial]
    fn missing_file_means_defaults() {
        std::env::set_var(ENV_PIPELINE_CONFIG, "/nonexistent/pipeline.toml");
        let cfg = PipelineConfig::load().unwrap();
        std::env::remove_var(ENV_PIPELINE_CONFIG);
        assert_eq!(cfg.routing, RoutingLimits::default());
    }
}
