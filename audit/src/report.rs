//! Structured audit result consumed by renderers and exporters

use crate::config::JournaldLimits;
use crate::recommend::{Recommendation, Sizing};
use crate::risk::RiskLabel;
use crate::snapshot::{MetricsSnapshot, Usage};
use crate::trend::TrendVerdict;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceFigures {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub percent: Option<f64>,
    pub recommended_bytes: Option<u64>,
    pub margin: Option<f64>,
}

impl ResourceFigures {
    fn new(usage: &Usage, sizing: Option<&Sizing>) -> Self {
        Self {
            used_bytes: usage.used_bytes,
            total_bytes: usage.total_bytes,
            percent: usage.percent(),
            recommended_bytes: sizing.map(|s| s.recommended_bytes),
            margin: sizing.map(|s| s.margin),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskFigures {
    pub mount: String,
    #[serde(flatten)]
    pub figures: ResourceFigures,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub timestamp: DateTime<Utc>,
    pub risk_labels: Vec<RiskLabel>,
    pub ram: ResourceFigures,
    pub swap: ResourceFigures,
    /// Monitored mounts that could be read, in monitored order.
    pub disks: Vec<DiskFigures>,
    /// Suggested journal size limits.
    pub journald: JournaldLimits,
    pub log_indicators: Vec<String>,
    pub analysis: Vec<String>,
    pub trends: Vec<TrendVerdict>,
}

impl AuditReport {
    pub fn build(
        snapshot: &MetricsSnapshot,
        mounts: &[String],
        risk_labels: Vec<RiskLabel>,
        recommendation: &Recommendation,
    ) -> Self {
        let disks = mounts
            .iter()
            .filter_map(|mount| {
                let usage = snapshot.disk(mount)?;
                Some(DiskFigures {
                    mount: mount.clone(),
                    figures: ResourceFigures::new(usage, recommendation.disks.get(mount)),
                })
            })
            .collect();
        let analysis = analysis_notes(&risk_labels);

        Self {
            timestamp: snapshot.timestamp(),
            ram: ResourceFigures::new(&snapshot.ram, recommendation.ram.as_ref()),
            swap: ResourceFigures::new(&snapshot.swap, None),
            disks,
            journald: recommendation.journald.clone(),
            log_indicators: snapshot.log_signal.recent.clone(),
            analysis,
            risk_labels,
            trends: Vec::new(),
        }
    }

    /// Returns a new report carrying `trends`.
    pub fn with_trends(self, trends: Vec<TrendVerdict>) -> Self {
        Self { trends, ..self }
    }

    pub fn is_critical(&self) -> bool {
        !self.risk_labels.is_empty()
    }

    /// Label strings for display; `["OK"]` when nothing is critical.
    pub fn status_labels(&self) -> Vec<String> {
        if self.risk_labels.is_empty() {
            vec!["OK".to_string()]
        } else {
            self.risk_labels.iter().map(|l| l.to_string()).collect()
        }
    }

    pub fn disk(&self, mount: &str) -> Option<&DiskFigures> {
        self.disks.iter().find(|d| d.mount == mount)
    }
}

fn analysis_notes(labels: &[RiskLabel]) -> Vec<String> {
    let mut notes = Vec::new();
    if labels
        .iter()
        .any(|l| matches!(l, RiskLabel::RamCritical | RiskLabel::SwapCritical))
    {
        notes.push(
            "Memory pressure detected: the system runs close to its limit, \
             with risk of freezes and elevated latency."
                .to_string(),
        );
    }
    for label in labels {
        if let RiskLabel::DiskCritical { mount } = label {
            notes.push(format!(
                "Partition {} is above its usage threshold; write failures, \
                 stalled services and general degradation are likely.",
                mount
            ));
        }
    }
    if notes.is_empty() {
        notes.push(
            "The system operates within acceptable parameters with no sign of \
             near-exhaustion in the analysed period."
                .to_string(),
        );
    }
    notes
}
