//! Report renderers: JSON, flat CSV metrics table, terminal summary

use crate::report::{AuditReport, ResourceFigures};
use std::fmt;
use std::fs;
use std::path::Path;

const GB: f64 = 1e9;

fn gb(bytes: u64) -> f64 {
    (bytes as f64 / GB * 100.0).round() / 100.0
}

fn pct(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "n/a".to_string())
}

pub fn to_json(report: &AuditReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn push_figures(rows: &mut Vec<(String, String)>, prefix: &str, figures: &ResourceFigures) {
    rows.push((format!("{}_used_bytes", prefix), figures.used_bytes.to_string()));
    rows.push((format!("{}_total_bytes", prefix), figures.total_bytes.to_string()));
    if let Some(p) = figures.percent {
        rows.push((format!("{}_used_pct", prefix), format!("{:.2}", p)));
    }
    if let Some(r) = figures.recommended_bytes {
        rows.push((format!("{}_recommended_bytes", prefix), r.to_string()));
    }
}

/// One `timestamp,metric,value` row per figure.
pub fn to_csv(report: &AuditReport) -> String {
    CsvTable(report).to_string()
}

struct CsvTable<'a>(&'a AuditReport);

impl fmt::Display for CsvTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let mut rows = Vec::new();
        push_figures(&mut rows, "ram", &report.ram);
        push_figures(&mut rows, "swap", &report.swap);
        for disk in &report.disks {
            push_figures(&mut rows, &format!("disk:{}", disk.mount), &disk.figures);
        }
        rows.push(("risk".to_string(), report.status_labels().join(";")));
        for verdict in &report.trends {
            rows.push((format!("trend:{}", verdict.metric), verdict.direction.to_string()));
        }
        for (key, value) in report.journald.entries() {
            rows.push((format!("journald:{}", key), value.to_string()));
        }

        let timestamp = report.timestamp.to_rfc3339();
        writeln!(f, "timestamp,metric,value")?;
        for (metric, value) in rows {
            writeln!(f, "{},{},{}", timestamp, csv_field(&metric), csv_field(&value))?;
        }
        Ok(())
    }
}

pub fn render_text(report: &AuditReport) -> String {
    TextSummary(report).to_string()
}

struct TextSummary<'a>(&'a AuditReport);

impl fmt::Display for TextSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(f, "Linux Resource Audit  {}", report.timestamp.to_rfc3339())?;

        writeln!(f, "\nRisk:")?;
        for label in report.status_labels() {
            writeln!(f, "  * {}", label)?;
        }

        writeln!(f, "\nMemory:")?;
        writeln!(
            f,
            "  RAM:  {} / {} GB ({}%)",
            gb(report.ram.used_bytes),
            gb(report.ram.total_bytes),
            pct(report.ram.percent)
        )?;
        if report.swap.total_bytes == 0 {
            writeln!(f, "  Swap: disabled")?;
        } else {
            writeln!(
                f,
                "  Swap: {} / {} GB ({}%)",
                gb(report.swap.used_bytes),
                gb(report.swap.total_bytes),
                pct(report.swap.percent)
            )?;
        }
        if let Some(rec) = report.ram.recommended_bytes {
            writeln!(f, "  -> recommended RAM: {} GB", gb(rec))?;
        }

        writeln!(f, "\nDisk:")?;
        for disk in &report.disks {
            writeln!(
                f,
                "  {:<6} {} / {} GB ({}%)",
                disk.mount,
                gb(disk.figures.used_bytes),
                gb(disk.figures.total_bytes),
                pct(disk.figures.percent)
            )?;
            if let Some(rec) = disk.figures.recommended_bytes {
                writeln!(f, "    -> recommended: {} GB", gb(rec))?;
            }
        }

        writeln!(f, "\nLogs (journald):")?;
        for (key, value) in report.journald.entries() {
            writeln!(f, "  {} = {}", key, value)?;
        }

        if !report.trends.is_empty() {
            writeln!(f, "\nTrends:")?;
            for verdict in &report.trends {
                writeln!(f, "  {:<12} {}", verdict.metric.to_string(), verdict.direction)?;
            }
        }

        if !report.log_indicators.is_empty() {
            writeln!(f, "\nKernel log indicators:")?;
            for line in &report.log_indicators {
                writeln!(f, "  {}", line)?;
            }
        }

        writeln!(f, "\nAnalysis:")?;
        for note in &report.analysis {
            writeln!(f, "  - {}", note)?;
        }
        Ok(())
    }
}

pub fn write_json(report: &AuditReport, path: &Path) -> anyhow::Result<()> {
    fs::write(path, to_json(report)?)?;
    Ok(())
}

pub fn write_csv(report: &AuditReport, path: &Path) -> anyhow::Result<()> {
    fs::write(path, to_csv(report))?;
    Ok(())
}
