use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Patch the usual automation fingerprints before any page script runs.
    #[serde(default = "default_stealth")]
    pub stealth: bool,
    /// Explicit Chrome/Chromium binary. Auto-detected when unset.
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub downloads_dir: Option<String>,
    /// How long to wait for the DevTools endpoint after spawning the browser.
    #[serde(default = "default_launch_timeout_ms")]
    pub launch_timeout_ms: u64,
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    720
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_stealth() -> bool {
    true
}

fn default_launch_timeout_ms() -> u64 {
    15_000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            locale: default_locale(),
            timezone: default_timezone(),
            stealth: default_stealth(),
            executable: None,
            extra_args: Vec::new(),
            downloads_dir: None,
            launch_timeout_ms: default_launch_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputerConfig {
    /// Upper bound for the post-action settle wait. `None` waits forever.
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: Option<u64>,
    /// Quiet window required before the network counts as idle.
    #[serde(default = "default_network_idle_ms")]
    pub network_idle_ms: u64,
}

fn default_settle_timeout_ms() -> Option<u64> {
    Some(30_000)
}

fn default_network_idle_ms() -> u64 {
    500
}

impl Default for ComputerConfig {
    fn default() -> Self {
        Self {
            settle_timeout_ms: default_settle_timeout_ms(),
            network_idle_ms: default_network_idle_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub computer: ComputerConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            debug!(path = %config_path.display(), "Loading config");
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_browser_profile() {
        let cfg = Config::default();
        assert_eq!(cfg.browser.viewport_width, 1280);
        assert_eq!(cfg.browser.viewport_height, 720);
        assert_eq!(cfg.browser.locale, "en-US");
        assert_eq!(cfg.browser.timezone, "America/New_York");
        assert!(!cfg.browser.headless);
        assert!(cfg.browser.stealth);
        assert_eq!(cfg.browser.launch_timeout_ms, 15_000);
        assert_eq!(cfg.computer.settle_timeout_ms, Some(30_000));
        assert_eq!(cfg.computer.network_idle_ms, 500);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let raw = r#"{ "browser": { "headless": true, "viewportWidth": 800 } }"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert!(cfg.browser.headless);
        assert_eq!(cfg.browser.viewport_width, 800);
        assert_eq!(cfg.browser.viewport_height, 720);
        assert_eq!(cfg.computer.network_idle_ms, 500);
    }

    #[test]
    fn test_null_settle_timeout_means_unbounded() {
        let raw = r#"{ "computer": { "settleTimeoutMs": null } }"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.computer.settle_timeout_ms, None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        let mut cfg = Config::default();
        cfg.browser.headless = true;
        cfg.browser.extra_args = vec!["--mute-audio".into()];
        cfg.save(&paths.config_file()).unwrap();

        let loaded = Config::load_or_default(&paths).unwrap();
        assert!(loaded.browser.headless);
        assert_eq!(loaded.browser.extra_args, vec!["--mute-audio".to_string()]);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ \"browser\": ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().join("missing"));
        let cfg = Config::load_or_default(&paths).unwrap();
        assert_eq!(cfg.browser.viewport_width, 1280);
    }
}
