use super::{MemoryReading, MetricsCollector};
use crate::config::CollectionConfig;
use crate::error::{AuditError, Result};
use crate::snapshot::{LogSignal, Usage};
use std::ffi::CString;
use std::fs;
use std::process::Command;

/// Fields of /proc/meminfo in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub mem_total: u64,
    pub mem_available: u64,
    pub swap_total: u64,
    pub swap_free: u64,
}

impl MemInfo {
    pub fn ram(&self) -> Usage {
        Usage::new(self.mem_total.saturating_sub(self.mem_available), self.mem_total)
    }

    pub fn swap(&self) -> Usage {
        Usage::new(self.swap_total.saturating_sub(self.swap_free), self.swap_total)
    }
}

/// Parses /proc/meminfo content. Values are reported in kB.
pub fn parse_meminfo(content: &str) -> Option<MemInfo> {
    let mut info = MemInfo::default();
    let mut seen_total = false;
    let mut seen_available = false;
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let key = match parts.next() {
            Some(k) => k.trim_end_matches(':'),
            None => continue,
        };
        let kb: u64 = match parts.next().and_then(|v| v.parse().ok()) {
            Some(v) => v,
            None => continue,
        };
        let bytes = kb * 1024;
        match key {
            "MemTotal" => {
                info.mem_total = bytes;
                seen_total = true;
            }
            "MemAvailable" => {
                info.mem_available = bytes;
                seen_available = true;
            }
            "SwapTotal" => info.swap_total = bytes,
            "SwapFree" => info.swap_free = bytes,
            _ => {}
        }
    }
    (seen_total && seen_available).then_some(info)
}

pub struct LinuxCollector {
    log_since: String,
    log_keywords: Vec<String>,
    max_log_lines: usize,
}

impl LinuxCollector {
    pub fn new(config: &CollectionConfig) -> Self {
        Self {
            log_since: config.log_since.clone(),
            log_keywords: config.log_keywords.iter().map(|k| k.to_lowercase()).collect(),
            max_log_lines: config.max_log_lines,
        }
    }

    fn matching_lines(&self, output: &str) -> Vec<String> {
        let lines: Vec<String> = output
            .lines()
            .filter(|line| {
                let lower = line.to_lowercase();
                self.log_keywords.iter().any(|k| lower.contains(k.as_str()))
            })
            .map(|line| line.to_string())
            .collect();
        let skip = lines.len().saturating_sub(self.max_log_lines);
        lines.into_iter().skip(skip).collect()
    }
}

impl Default for LinuxCollector {
    fn default() -> Self {
        Self::new(&CollectionConfig::default())
    }
}

impl MetricsCollector for LinuxCollector {
    fn memory(&self) -> Result<MemoryReading> {
        let content = fs::read_to_string("/proc/meminfo")
            .map_err(|e| AuditError::unavailable("memory", e))?;
        let info = parse_meminfo(&content)
            .ok_or_else(|| AuditError::unavailable("memory", "unrecognised /proc/meminfo"))?;
        Ok(MemoryReading { ram: info.ram(), swap: info.swap() })
    }

    fn disk(&self, mount: &str) -> Result<Usage> {
        let resource = format!("mount {}", mount);
        let path = CString::new(mount).map_err(|e| AuditError::unavailable(&resource, e))?;
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(AuditError::unavailable(
                resource,
                std::io::Error::last_os_error(),
            ));
        }
        let frsize = stat.f_frsize as u64;
        let total = stat.f_blocks as u64 * frsize;
        let free = stat.f_bfree as u64 * frsize;
        Ok(Usage::new(total.saturating_sub(free), total))
    }

    fn log_signal(&self) -> Result<LogSignal> {
        let output = Command::new("journalctl")
            .args(["-k", "--since", self.log_since.as_str(), "--no-pager"])
            .output()
            .map_err(|e| AuditError::unavailable("journal", e))?;
        if !output.status.success() {
            return Err(AuditError::unavailable(
                "journal",
                format!("journalctl exited with {}", output.status),
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(LogSignal::from_lines(self.matching_lines(&stdout)))
    }
}
