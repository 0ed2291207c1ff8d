//! Configuration management (TOML)

use crate::history::DayBoundary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config value for '{field}': {message}")]
    Invalid { field: String, message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub recommendation: RecommendationConfig,
    #[serde(default)]
    pub trend: TrendConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_path: Option<PathBuf>,
    /// Calendar used to file records under a day: `utc` or `local`.
    pub day_boundary: DayBoundary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub mounts: Vec<String>,
    pub log_since: String,
    pub log_keywords: Vec<String>,
    pub max_log_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub ram_critical_pct: f64,
    pub swap_critical_pct: f64,
    pub disk_critical_pct: f64,
    /// Per-mount replacements for `disk_critical_pct`.
    pub disk_overrides: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub baseline_margin: f64,
    pub elevated_margin: f64,
    pub rounding_unit_bytes: u64,
    pub escalate_ram_on_swap: bool,
    pub escalate_ram_on_disk: bool,
    pub escalate_ram_on_log_errors: bool,
    pub journald: JournaldLimits,
}

/// Suggested `/etc/systemd/journald.conf` limits, keyed as journald spells them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct JournaldLimits {
    pub system_max_use: String,
    pub system_keep_free: String,
    pub runtime_max_use: String,
    pub max_file_sec: String,
}

impl JournaldLimits {
    /// `(key, value)` pairs in journald.conf order.
    pub fn entries(&self) -> [(&'static str, &str); 4] {
        [
            ("SystemMaxUse", self.system_max_use.as_str()),
            ("SystemKeepFree", self.system_keep_free.as_str()),
            ("RuntimeMaxUse", self.runtime_max_use.as_str()),
            ("MaxFileSec", self.max_file_sec.as_str()),
        ]
    }
}

impl Default for JournaldLimits {
    fn default() -> Self {
        JournaldLimits {
            system_max_use: "500M".to_string(),
            system_keep_free: "1G".to_string(),
            runtime_max_use: "200M".to_string(),
            max_file_sec: "7day".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub window_days: u32,
    pub flat_tolerance_pct: f64,
    pub min_points: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        CollectionConfig {
            mounts: vec!["/".to_string(), "/var".to_string(), "/home".to_string()],
            log_since: "7 days ago".to_string(),
            log_keywords: [
                "oom",
                "out of memory",
                "allocation failure",
                "enospc",
                "no space left",
                "memory pressure",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            max_log_lines: 20,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        ThresholdConfig {
            ram_critical_pct: 90.0,
            swap_critical_pct: 60.0,
            disk_critical_pct: 80.0,
            disk_overrides: BTreeMap::new(),
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        RecommendationConfig {
            baseline_margin: 0.25,
            elevated_margin: 0.50,
            rounding_unit_bytes: 1_000_000_000,
            escalate_ram_on_swap: true,
            escalate_ram_on_disk: false,
            escalate_ram_on_log_errors: false,
            journald: JournaldLimits::default(),
        }
    }
}

impl Default for TrendConfig {
    fn default() -> Self {
        TrendConfig {
            window_days: 7,
            flat_tolerance_pct: 2.0,
            min_points: 3,
        }
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.into(),
    }
}

fn check_pct(field: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 100.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{} is outside (0, 100]", value)))
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        check_pct("thresholds.ram_critical_pct", t.ram_critical_pct)?;
        check_pct("thresholds.swap_critical_pct", t.swap_critical_pct)?;
        check_pct("thresholds.disk_critical_pct", t.disk_critical_pct)?;
        for (mount, pct) in &t.disk_overrides {
            check_pct(&format!("thresholds.disk_overrides.{}", mount), *pct)?;
        }

        let r = &self.recommendation;
        if r.baseline_margin < 0.0 {
            return Err(invalid("recommendation.baseline_margin", "must not be negative"));
        }
        if r.elevated_margin < r.baseline_margin {
            return Err(invalid(
                "recommendation.elevated_margin",
                "must be at least baseline_margin",
            ));
        }
        if r.rounding_unit_bytes == 0 {
            return Err(invalid("recommendation.rounding_unit_bytes", "must be non-zero"));
        }
        for (key, value) in r.journald.entries() {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(invalid(
                    &format!("recommendation.journald.{}", key),
                    format!("'{}' is not a single journald value", value),
                ));
            }
        }

        if self.trend.window_days == 0 {
            return Err(invalid("trend.window_days", "must be non-zero"));
        }
        if self.trend.min_points < 2 {
            return Err(invalid("trend.min_points", "a trend needs at least 2 points"));
        }
        if self.trend.flat_tolerance_pct < 0.0 {
            return Err(invalid("trend.flat_tolerance_pct", "must not be negative"));
        }
        if self.collection.mounts.is_empty() {
            return Err(invalid("collection.mounts", "at least one mount is required"));
        }
        Ok(())
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("", "", "resource-audit")
    }

    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Configured history database, or the platform data directory.
    pub fn history_path(&self) -> PathBuf {
        if let Some(path) = &self.general.history_path {
            return path.clone();
        }
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().join("history.db"))
            .unwrap_or_else(|| PathBuf::from("audit_history.db"))
    }
}
