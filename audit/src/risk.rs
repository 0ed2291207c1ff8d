//! Threshold-based risk classification

use crate::config::ThresholdConfig;
use crate::snapshot::MetricsSnapshot;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RiskLabel {
    RamCritical,
    SwapCritical,
    DiskCritical { mount: String },
}

impl RiskLabel {
    pub fn is_disk(&self) -> bool {
        matches!(self, RiskLabel::DiskCritical { .. })
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLabel::RamCritical => write!(f, "RAM_CRITICAL"),
            RiskLabel::SwapCritical => write!(f, "SWAP_CRITICAL"),
            RiskLabel::DiskCritical { mount } => write!(f, "DISK_CRITICAL:{}", mount),
        }
    }
}

impl Serialize for RiskLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskThresholds {
    pub ram_pct: f64,
    pub swap_pct: f64,
    pub disk_pct: f64,
    pub disk_overrides: BTreeMap<String, f64>,
}

impl RiskThresholds {
    pub fn disk_pct_for(&self, mount: &str) -> f64 {
        self.disk_overrides.get(mount).copied().unwrap_or(self.disk_pct)
    }
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self::from(&ThresholdConfig::default())
    }
}

impl From<&ThresholdConfig> for RiskThresholds {
    fn from(config: &ThresholdConfig) -> Self {
        Self {
            ram_pct: config.ram_critical_pct,
            swap_pct: config.swap_critical_pct,
            disk_pct: config.disk_critical_pct,
            disk_overrides: config.disk_overrides.clone(),
        }
    }
}

/// Labels a snapshot against fixed thresholds.
///
/// Output order is RAM, swap, then disks in monitored-mount order. Mounts
/// missing from the snapshot and zero-capacity resources produce no label.
pub struct RiskClassifier {
    thresholds: RiskThresholds,
    mounts: Vec<String>,
}

impl RiskClassifier {
    pub fn new(thresholds: RiskThresholds, mounts: Vec<String>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(mounts.len());
        for mount in mounts {
            if !unique.contains(&mount) {
                unique.push(mount);
            }
        }
        Self { thresholds, mounts: unique }
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    pub fn mounts(&self) -> &[String] {
        &self.mounts
    }

    pub fn classify(&self, snapshot: &MetricsSnapshot) -> Vec<RiskLabel> {
        let mut labels = Vec::new();
        if snapshot.ram.at_or_above(self.thresholds.ram_pct) {
            labels.push(RiskLabel::RamCritical);
        }
        if snapshot.swap.at_or_above(self.thresholds.swap_pct) {
            labels.push(RiskLabel::SwapCritical);
        }
        for mount in &self.mounts {
            let Some(usage) = snapshot.disk(mount) else {
                continue;
            };
            if usage.at_or_above(self.thresholds.disk_pct_for(mount)) {
                labels.push(RiskLabel::DiskCritical { mount: mount.clone() });
            }
        }
        labels
    }
}
