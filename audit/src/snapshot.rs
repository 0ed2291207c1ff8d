//! Point-in-time resource readings

use crate::error::{AuditError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `used` and `total` in bytes for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl Usage {
    pub fn new(used_bytes: u64, total_bytes: u64) -> Self {
        Self { used_bytes, total_bytes }
    }

    /// Used percentage, or `None` when the resource has no capacity.
    pub fn percent(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            None
        } else {
            Some(self.used_bytes as f64 * 100.0 / self.total_bytes as f64)
        }
    }

    /// `used / total >= threshold_pct`, compared without dividing.
    /// A zero-capacity resource never meets a threshold.
    pub fn at_or_above(&self, threshold_pct: f64) -> bool {
        self.total_bytes > 0
            && self.used_bytes as f64 * 100.0 >= threshold_pct * self.total_bytes as f64
    }

    fn check(&self, what: &str) -> Result<()> {
        if self.used_bytes > self.total_bytes {
            return Err(AuditError::InvalidSnapshot(format!(
                "{} used {} bytes exceeds total {} bytes",
                what, self.used_bytes, self.total_bytes
            )));
        }
        Ok(())
    }
}

/// Out-of-memory and disk-exhaustion lines seen in the recent kernel log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSignal {
    pub count: usize,
    pub recent: Vec<String>,
}

impl LogSignal {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { count: lines.len(), recent: lines }
    }

    pub fn has_errors(&self) -> bool {
        self.count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    timestamp: DateTime<Utc>,
    pub ram: Usage,
    pub swap: Usage,
    /// Readable monitored mounts only; unreadable mounts are absent.
    pub disks: BTreeMap<String, Usage>,
    pub log_signal: LogSignal,
}

impl MetricsSnapshot {
    pub fn new(
        timestamp: DateTime<Utc>,
        ram: Usage,
        swap: Usage,
        disks: BTreeMap<String, Usage>,
        log_signal: LogSignal,
    ) -> Self {
        Self { timestamp, ram, swap, disks, log_signal }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn disk(&self, mount: &str) -> Option<&Usage> {
        self.disks.get(mount)
    }

    /// Rejects readings where any resource reports more used than total.
    pub fn validate(&self) -> Result<()> {
        self.ram.check("ram")?;
        self.swap.check("swap")?;
        for (mount, usage) in &self.disks {
            usage.check(&format!("disk {}", mount))?;
        }
        Ok(())
    }
}
