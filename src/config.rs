use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::system::cache::BrightnessCache;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache_dir: Option<PathBuf>,
    /// Run ddcutil through `sudo -n`.
    pub use_sudo: bool,
    pub writer_interval_ms: u64,
    pub debounce_ms: u64,
    pub flush_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: None,
            use_sudo: false,
            writer_interval_ms: 50,
            debounce_ms: 300,
            flush_timeout_ms: 5_000,
        }
    }
}

impl Settings {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(BrightnessCache::default_dir)
    }

    pub fn writer_interval(&self) -> Duration {
        Duration::from_millis(self.writer_interval_ms.max(1))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }
}

/// Loads the first settings file found, or `None` when there is none.
pub fn load_settings() -> Result<Option<(PathBuf, Settings)>> {
    for candidate in default_config_paths() {
        if !candidate.exists() {
            continue;
        }
        let contents = fs::read_to_string(&candidate).with_context(|| {
            format!(
                "failed to read lumonitor configuration at {}",
                candidate.display()
            )
        })?;
        let settings = parse_settings(&contents).with_context(|| {
            format!(
                "failed to parse lumonitor configuration at {}",
                candidate.display()
            )
        })?;
        return Ok(Some((candidate, settings)));
    }
    Ok(None)
}

fn parse_settings(contents: &str) -> Result<Settings> {
    serde_json::from_str(contents).context("configuration file is not valid JSON")
}

pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(explicit) = env::var_os("LUMONITOR_CONFIG") {
        paths.push(PathBuf::from(explicit));
    }

    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("lumonitor/config.json"));
    }

    if let Some(home) = env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".config/lumonitor/config.json"));
    }

    paths.push(PathBuf::from("lumonitor.json"));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn parses_full_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "cache_dir": "/tmp/lumonitor-cache",
                "use_sudo": true,
                "writer_interval_ms": 20,
                "debounce_ms": 450,
                "flush_timeout_ms": 1000
            }"#,
        )
        .unwrap();

        let settings = parse_settings(
            &fs::read_to_string(&path).expect("failed to read written config"),
        )
        .unwrap();

        assert_eq!(settings.cache_dir(), PathBuf::from("/tmp/lumonitor-cache"));
        assert!(settings.use_sudo);
        assert_eq!(settings.writer_interval(), Duration::from_millis(20));
        assert_eq!(settings.debounce(), Duration::from_millis(450));
        assert_eq!(settings.flush_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings = parse_settings(r#"{ "debounce_ms": 500 }"#).unwrap();
        assert_eq!(
            settings,
            Settings {
                debounce_ms: 500,
                ..Settings::default()
            }
        );
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(parse_settings("debounce_ms = 5").is_err());
    }

    #[test]
    fn zero_interval_is_bumped() {
        let settings = Settings {
            writer_interval_ms: 0,
            ..Settings::default()
        };
        assert_eq!(settings.writer_interval(), Duration::from_millis(1));
    }
}
