//! `~/.parcelrc` loader.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::BaseDirs;
use parcel_index::Bounds;
use serde::{Deserialize, Serialize};
use tracing::Level;

/// How query results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bplus_order: usize,
    pub spatial_bounds: Bounds,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub output: OutputFormat,
    /// Rows printed per query; 0 prints everything.
    pub result_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bplus_order: 64,
            spatial_bounds: Bounds::default(),
            log_level: "info".to_string(),
            log_dir: None,
            output: OutputFormat::Text,
            result_limit: 20,
        }
    }
}

impl Config {
    /// `$HOME/.parcelrc`, if a home directory can be found.
    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|b| b.home_dir().join(".parcelrc"))
    }

    /// Read `path`. A missing or empty file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    fn from_yaml(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn level(&self) -> anyhow::Result<Level> {
        self.log_level
            .parse()
            .with_context(|| format!("invalid log_level {:?}", self.log_level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg = Config::from_yaml("bplus_order: 8\noutput: json\n").unwrap();
        assert_eq!(cfg.bplus_order, 8);
        assert_eq!(cfg.output, OutputFormat::Json);
        assert_eq!(cfg.result_limit, 20);
        assert_eq!(cfg.spatial_bounds, Bounds::default());
        assert_eq!(cfg.log_dir, None);
    }

    #[test]
    fn bounds_and_log_settings_parse() {
        let yaml = concat!(
            "spatial_bounds: {left: -10, right: 10, top: -5, bottom: 5}\n",
            "log_level: debug\n",
            "log_dir: /var/log/parcel\n",
            "result_limit: 0\n",
        );
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.spatial_bounds, Bounds::new(-10.0, 10.0, -5.0, 5.0));
        assert_eq!(cfg.level().unwrap(), Level::DEBUG);
        assert_eq!(cfg.log_dir, Some(PathBuf::from("/var/log/parcel")));
        assert_eq!(cfg.result_limit, 0);
    }

    #[test]
    fn empty_and_missing_files_give_defaults() {
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
        let missing = std::env::temp_dir().join(format!("parcelrc-missing-{}", std::process::id()));
        assert_eq!(Config::load(&missing).unwrap(), Config::default());
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(Config::from_yaml("output: xml\n").is_err());
        let cfg = Config {
            log_level: "loud".into(),
            ..Config::default()
        };
        assert!(cfg.level().is_err());
    }
}
