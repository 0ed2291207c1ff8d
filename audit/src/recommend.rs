//! Capacity sizing from current usage plus an escalating safety margin

use crate::config::{JournaldLimits, RecommendationConfig};
use crate::risk::RiskLabel;
use crate::snapshot::{MetricsSnapshot, Usage};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct MarginPolicy {
    pub baseline: f64,
    pub elevated: f64,
    pub rounding_unit_bytes: u64,
    pub escalate_ram_on_swap: bool,
    pub escalate_ram_on_disk: bool,
    pub escalate_ram_on_log_errors: bool,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        Self::from(&RecommendationConfig::default())
    }
}

impl From<&RecommendationConfig> for MarginPolicy {
    fn from(config: &RecommendationConfig) -> Self {
        Self {
            baseline: config.baseline_margin,
            elevated: config.elevated_margin,
            rounding_unit_bytes: config.rounding_unit_bytes.max(1),
            escalate_ram_on_swap: config.escalate_ram_on_swap,
            escalate_ram_on_disk: config.escalate_ram_on_disk,
            escalate_ram_on_log_errors: config.escalate_ram_on_log_errors,
        }
    }
}

/// One sized resource: the recommended capacity and the margin that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sizing {
    pub recommended_bytes: u64,
    pub margin: f64,
    pub elevated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// `None` when RAM reports zero capacity.
    pub ram: Option<Sizing>,
    /// Readable mounts with non-zero capacity only.
    pub disks: BTreeMap<String, Sizing>,
    pub journald: JournaldLimits,
}

impl Recommendation {
    pub fn ram_recommended_bytes(&self) -> Option<u64> {
        self.ram.map(|s| s.recommended_bytes)
    }

    pub fn disk_recommended_bytes(&self, mount: &str) -> Option<u64> {
        self.disks.get(mount).map(|s| s.recommended_bytes)
    }
}

pub struct RecommendationEngine {
    policy: MarginPolicy,
    journald: JournaldLimits,
}

impl RecommendationEngine {
    pub fn new(policy: MarginPolicy) -> Self {
        Self { policy, journald: JournaldLimits::default() }
    }

    pub fn from_config(config: &RecommendationConfig) -> Self {
        Self {
            policy: MarginPolicy::from(config),
            journald: config.journald.clone(),
        }
    }

    pub fn policy(&self) -> &MarginPolicy {
        &self.policy
    }

    pub fn recommend(&self, snapshot: &MetricsSnapshot, labels: &[RiskLabel]) -> Recommendation {
        let ram = self.size(&snapshot.ram, self.ram_escalated(snapshot, labels));

        let disks = snapshot
            .disks
            .iter()
            .filter_map(|(mount, usage)| {
                let critical = labels
                    .iter()
                    .any(|l| matches!(l, RiskLabel::DiskCritical { mount: m } if m == mount));
                self.size(usage, critical).map(|s| (mount.clone(), s))
            })
            .collect();

        Recommendation {
            ram,
            disks,
            journald: self.journald.clone(),
        }
    }

    fn ram_escalated(&self, snapshot: &MetricsSnapshot, labels: &[RiskLabel]) -> bool {
        labels.iter().any(|label| match label {
            RiskLabel::RamCritical => true,
            RiskLabel::SwapCritical => self.policy.escalate_ram_on_swap,
            RiskLabel::DiskCritical { .. } => self.policy.escalate_ram_on_disk,
        }) || (self.policy.escalate_ram_on_log_errors && snapshot.log_signal.has_errors())
    }

    /// Baseline sizing grows current use and never drops below installed
    /// capacity. Elevated sizing grows installed capacity itself.
    fn size(&self, usage: &Usage, elevated: bool) -> Option<Sizing> {
        if usage.total_bytes == 0 {
            return None;
        }
        let recommended = if elevated {
            let base = usage.used_bytes.max(usage.total_bytes);
            self.round_up(grow(base, self.policy.elevated))
        } else {
            self.round_up(grow(usage.used_bytes, self.policy.baseline))
                .max(usage.total_bytes)
        };
        Some(Sizing {
            recommended_bytes: recommended,
            margin: if elevated { self.policy.elevated } else { self.policy.baseline },
            elevated,
        })
    }

    fn round_up(&self, bytes: u64) -> u64 {
        let unit = self.policy.rounding_unit_bytes;
        bytes.div_ceil(unit).saturating_mul(unit)
    }
}

fn grow(bytes: u64, margin: f64) -> u64 {
    (bytes as f64 * (1.0 + margin)).ceil() as u64
}
