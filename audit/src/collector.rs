//! Host metric collection

mod linux;

pub use linux::{parse_meminfo, LinuxCollector, MemInfo};

use crate::error::Result;
use crate::snapshot::{LogSignal, MetricsSnapshot, Usage};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::warn;

pub struct MemoryReading {
    pub ram: Usage,
    pub swap: Usage,
}

impl MemoryReading {
    /// Zero capacity for both; classification and sizing skip such resources.
    pub fn unavailable() -> Self {
        Self {
            ram: Usage::new(0, 0),
            swap: Usage::new(0, 0),
        }
    }
}

pub trait MetricsCollector {
    fn memory(&self) -> Result<MemoryReading>;
    fn disk(&self, mount: &str) -> Result<Usage>;
    fn log_signal(&self) -> Result<LogSignal>;

    /// Builds a snapshot. Unreadable memory counters report zero capacity,
    /// mounts that cannot be read are left out and an unreadable log source
    /// yields an empty signal.
    fn collect(&self, mounts: &[String]) -> Result<MetricsSnapshot> {
        let timestamp = Utc::now();
        let memory = self.memory().unwrap_or_else(|e| {
            warn!("Memory counters unavailable: {}", e);
            MemoryReading::unavailable()
        });

        let mut disks = BTreeMap::new();
        for mount in mounts {
            match self.disk(mount) {
                Ok(usage) => {
                    disks.insert(mount.clone(), usage);
                }
                Err(e) => warn!("Skipping mount {}: {}", mount, e),
            }
        }

        let log_signal = self.log_signal().unwrap_or_else(|e| {
            warn!("Log signal unavailable: {}", e);
            LogSignal::default()
        });

        Ok(MetricsSnapshot::new(
            timestamp,
            memory.ram,
            memory.swap,
            disks,
            log_signal,
        ))
    }
}
