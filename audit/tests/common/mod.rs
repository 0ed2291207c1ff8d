#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use resource_audit::history::HistoryRecord;
use resource_audit::snapshot::{LogSignal, MetricsSnapshot, Usage};
use std::collections::BTreeMap;

pub const GB: u64 = 1_000_000_000;

/// Gigabyte figures as used in the reports, converted to bytes.
pub fn gb(value: f64) -> u64 {
    (value * GB as f64).round() as u64
}

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub fn snapshot(ram: (u64, u64), swap: (u64, u64), disks: &[(&str, u64, u64)]) -> MetricsSnapshot {
    let disks: BTreeMap<String, Usage> = disks
        .iter()
        .map(|(mount, used, total)| (mount.to_string(), Usage::new(*used, *total)))
        .collect();
    MetricsSnapshot::new(
        at(2026, 3, 14, 6),
        Usage::new(ram.0, ram.1),
        Usage::new(swap.0, swap.1),
        disks,
        LogSignal::default(),
    )
}

/// RAM 5.8/8.0 GB, swap 68%, / 42/50, /var 18/20, /home 72/80 GB.
pub fn reference_snapshot() -> MetricsSnapshot {
    snapshot(
        (gb(5.8), gb(8.0)),
        (gb(2.72), gb(4.0)),
        &[("/", gb(42.0), gb(50.0)), ("/var", gb(18.0), gb(20.0)), ("/home", gb(72.0), gb(80.0))],
    )
}

pub fn mounts() -> Vec<String> {
    vec!["/".to_string(), "/var".to_string(), "/home".to_string()]
}

pub fn record(ts: DateTime<Utc>, ram_pct: f64) -> HistoryRecord {
    let mut record = HistoryRecord::new(ts);
    record.ram_used_pct = Some(ram_pct);
    record.swap_used_pct = Some(ram_pct / 2.0);
    record.ram_total_bytes = Some(8 * GB);
    record
}
