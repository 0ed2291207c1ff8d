//! One audit run: validate, classify, recommend, persist, enrich with trends

use crate::config::Config;
use crate::error::{AuditError, Result};
use crate::history::{query_daily_average, DateRange, DayBoundary, HistoryLog, HistoryRecord, Metric};
use crate::recommend::RecommendationEngine;
use crate::report::AuditReport;
use crate::risk::{RiskClassifier, RiskThresholds};
use crate::snapshot::MetricsSnapshot;
use crate::trend::{TrendAnalyzer, TrendSettings, TrendVerdict};
use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

/// Report plus the fate of the two history steps. A history failure never
/// discards the report.
#[derive(Debug)]
pub struct AuditOutcome {
    pub report: AuditReport,
    /// The record was not written.
    pub append_error: Option<AuditError>,
    /// The record was written but trends could not be read.
    pub trend_error: Option<AuditError>,
}

impl AuditOutcome {
    fn new(report: AuditReport) -> Self {
        Self { report, append_error: None, trend_error: None }
    }

    /// Whether today's record reached the store.
    pub fn persisted(&self) -> bool {
        self.append_error.is_none()
    }
}

pub struct Auditor {
    classifier: RiskClassifier,
    engine: RecommendationEngine,
    analyzer: TrendAnalyzer,
    day_boundary: DayBoundary,
}

impl Auditor {
    pub fn new(classifier: RiskClassifier, engine: RecommendationEngine, analyzer: TrendAnalyzer) -> Self {
        Self { classifier, engine, analyzer, day_boundary: DayBoundary::default() }
    }

    pub fn with_day_boundary(self, day_boundary: DayBoundary) -> Self {
        Self { day_boundary, ..self }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            RiskClassifier::new(
                RiskThresholds::from(&config.thresholds),
                config.collection.mounts.clone(),
            ),
            RecommendationEngine::from_config(&config.recommendation),
            TrendAnalyzer::new(TrendSettings::from(&config.trend)),
        )
        .with_day_boundary(config.general.day_boundary)
    }

    pub fn day_boundary(&self) -> DayBoundary {
        self.day_boundary
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    /// Every metric a trend can be computed for: RAM, swap, each monitored mount.
    pub fn tracked_metrics(&self) -> Vec<Metric> {
        let mut metrics = vec![Metric::RamUsedPct, Metric::SwapUsedPct];
        metrics.extend(
            self.classifier
                .mounts()
                .iter()
                .map(|m| Metric::DiskUsedPct(m.clone())),
        );
        metrics
    }

    /// Pure part of a run. Rejects impossible snapshots before classification.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Result<AuditReport> {
        snapshot.validate()?;
        let labels = self.classifier.classify(snapshot);
        if labels.is_empty() {
            info!("No resource at risk");
        } else {
            let names: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
            warn!("Risk labels: {}", names.join(", "));
        }
        let recommendation = self.engine.recommend(snapshot, &labels);
        Ok(AuditReport::build(
            snapshot,
            self.classifier.mounts(),
            labels,
            &recommendation,
        ))
    }

    /// Verdicts for `metrics` over the trend window ending at `end`.
    pub fn trends_at(
        &self,
        history: &dyn HistoryLog,
        end: NaiveDate,
        metrics: Vec<Metric>,
    ) -> Result<Vec<TrendVerdict>> {
        let range = DateRange::trailing(end, self.analyzer.settings().window_days);
        let mut verdicts = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let daily = query_daily_average(history, &metric, &range)?;
            let verdict = self.analyzer.analyze(metric, &daily);
            debug!("Trend {}: {} ({} points)", verdict.metric, verdict.direction, verdict.points);
            verdicts.push(verdict);
        }
        Ok(verdicts)
    }

    /// Verdicts for every tracked metric, ending at the report's day.
    pub fn trends(&self, history: &dyn HistoryLog, report: &AuditReport) -> Result<Vec<TrendVerdict>> {
        let day = self.day_boundary.day_of(&report.timestamp);
        self.trends_at(history, day, self.tracked_metrics())
    }

    /// Full run. Invalid snapshots are an error; history failures are
    /// reported in the outcome and leave the report without trends.
    pub fn run(&self, snapshot: &MetricsSnapshot, history: &mut dyn HistoryLog) -> Result<AuditOutcome> {
        let report = self.evaluate(snapshot)?;
        let mut outcome = AuditOutcome::new(report);

        let record = HistoryRecord::from_report(&outcome.report, self.day_boundary);
        if let Err(e) = history.append(&record) {
            error!("Failed to append history: {}", e);
            outcome.append_error = Some(e);
            return Ok(outcome);
        }
        info!("History updated for {}", record.day);

        match self.trends(&*history, &outcome.report) {
            Ok(trends) => outcome.report = outcome.report.with_trends(trends),
            Err(e) => {
                error!("Failed to read history for trends: {}", e);
                outcome.trend_error = Some(e);
            }
        }
        Ok(outcome)
    }
}
