//! End-to-end audit runs against in-memory and SQLite history

mod common;

use chrono::Duration;
use common::{gb, reference_snapshot, snapshot, GB};
use resource_audit::{
    audit::Auditor,
    config::Config,
    error::{AuditError, Result},
    export,
    history::{DateRange, DayBoundary, HistoryLog, HistoryRecord, MemoryHistory, Metric, SqliteHistory},
    risk::RiskLabel,
    trend::TrendDirection,
};
use tempfile::TempDir;

/// A store whose backing file has gone away.
struct BrokenStore;

impl HistoryLog for BrokenStore {
    fn append(&mut self, _record: &HistoryRecord) -> Result<()> {
        Err(AuditError::StoreIo(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only filesystem",
        )))
    }

    fn records_between(&self, _range: &DateRange) -> Result<Vec<HistoryRecord>> {
        Ok(Vec::new())
    }

    fn latest(&self, _limit: usize) -> Result<Vec<HistoryRecord>> {
        Ok(Vec::new())
    }
}

/// Accepts writes but cannot serve reads, as when the file is locked by a
/// long-running reader after the commit.
#[derive(Default)]
struct WriteOnlyStore {
    appended: usize,
}

impl HistoryLog for WriteOnlyStore {
    fn append(&mut self, _record: &HistoryRecord) -> Result<()> {
        self.appended += 1;
        Ok(())
    }

    fn records_between(&self, _range: &DateRange) -> Result<Vec<HistoryRecord>> {
        Err(AuditError::StoreCorrupt("unreadable page".to_string()))
    }

    fn latest(&self, _limit: usize) -> Result<Vec<HistoryRecord>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_reference_scenario_report() {
    let auditor = Auditor::from_config(&Config::default());
    let report = auditor.evaluate(&reference_snapshot()).unwrap();

    assert_eq!(
        report.status_labels(),
        vec!["SWAP_CRITICAL", "DISK_CRITICAL:/", "DISK_CRITICAL:/var", "DISK_CRITICAL:/home"]
    );
    assert_eq!(report.ram.recommended_bytes, Some(12 * GB));
    assert_eq!(report.ram.percent, Some(72.5));
    assert_eq!(report.swap.recommended_bytes, None);
    let mounts: Vec<&str> = report.disks.iter().map(|d| d.mount.as_str()).collect();
    assert_eq!(mounts, vec!["/", "/var", "/home"]);
    assert_eq!(report.disk("/var").unwrap().figures.recommended_bytes, Some(30 * GB));
    assert!(report.analysis[0].starts_with("Memory pressure"));
    assert_eq!(report.analysis.len(), 4);
}

#[test]
fn test_healthy_host_reports_ok() {
    let auditor = Auditor::from_config(&Config::default());
    let snap = snapshot((gb(2.0), gb(16.0)), (0, 0), &[("/", gb(10.0), gb(100.0))]);
    let report = auditor.evaluate(&snap).unwrap();
    assert!(!report.is_critical());
    assert_eq!(report.status_labels(), vec!["OK"]);
    assert_eq!(report.analysis.len(), 1);
    assert_eq!(report.disks.len(), 1);
}

#[test]
fn test_invalid_snapshot_is_rejected_and_not_persisted() {
    let auditor = Auditor::from_config(&Config::default());
    let mut history = MemoryHistory::new();
    let snap = snapshot((gb(9.0), gb(8.0)), (0, 0), &[]);
    let err = auditor.run(&snap, &mut history).unwrap_err();
    assert!(matches!(err, AuditError::InvalidSnapshot(_)));
    assert!(!err.is_store_failure());
    assert!(history.is_empty());

    let bad_disk = snapshot((gb(1.0), gb(8.0)), (0, 0), &[("/var", gb(21.0), gb(20.0))]);
    assert!(matches!(auditor.evaluate(&bad_disk), Err(AuditError::InvalidSnapshot(_))));
}

#[test]
fn test_store_failure_keeps_report() {
    let auditor = Auditor::from_config(&Config::default());
    let outcome = auditor.run(&reference_snapshot(), &mut BrokenStore).unwrap();
    assert!(!outcome.persisted());
    assert!(outcome.append_error.as_ref().unwrap().is_store_failure());
    assert!(outcome.trend_error.is_none());
    assert_eq!(outcome.report.ram.recommended_bytes, Some(12 * GB));
    assert!(outcome.report.trends.is_empty());
    assert!(export::to_json(&outcome.report).is_ok());
}

#[test]
fn test_trend_failure_after_append_still_counts_as_persisted() {
    let auditor = Auditor::from_config(&Config::default());
    let mut store = WriteOnlyStore::default();
    let outcome = auditor.run(&reference_snapshot(), &mut store).unwrap();
    assert_eq!(store.appended, 1);
    assert!(outcome.persisted());
    assert!(outcome.append_error.is_none());
    assert!(matches!(outcome.trend_error, Some(AuditError::StoreCorrupt(_))));
    assert!(outcome.report.trends.is_empty());
    assert_eq!(outcome.report.ram.recommended_bytes, Some(12 * GB));
}

#[test]
fn test_unreadable_memory_is_not_applicable() {
    let auditor = Auditor::from_config(&Config::default());
    let snap = snapshot((0, 0), (0, 0), &[("/", gb(45.0), gb(50.0))]);
    let report = auditor.evaluate(&snap).unwrap();
    assert_eq!(report.status_labels(), vec!["DISK_CRITICAL:/"]);
    assert_eq!(report.ram.percent, None);
    assert_eq!(report.ram.recommended_bytes, None);
    assert_eq!(report.disk("/").unwrap().figures.recommended_bytes, Some(75 * GB));
}

#[test]
fn test_first_run_has_insufficient_trend_data() {
    let auditor = Auditor::from_config(&Config::default());
    let mut history = MemoryHistory::new();
    let outcome = auditor.run(&reference_snapshot(), &mut history).unwrap();
    assert!(outcome.persisted());
    assert_eq!(history.len(), 1);
    assert_eq!(outcome.report.trends.len(), 5);
    assert!(outcome
        .report
        .trends
        .iter()
        .all(|t| t.direction == TrendDirection::InsufficientData));
}

#[test]
fn test_daily_runs_build_a_rising_trend() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = SqliteHistory::open(&temp_dir.path().join("history.db")).unwrap();
    store.init_schema().unwrap();
    let auditor = Auditor::from_config(&Config::default());

    let mut last = None;
    for day in 0..5u64 {
        let ram_used = gb(4.0) + day * gb(0.4);
        let mut snap = snapshot(
            (ram_used, gb(8.0)),
            (0, 0),
            &[("/", gb(40.0), gb(100.0)), ("/var", gb(10.0), gb(20.0))],
        );
        snap = resource_audit::snapshot::MetricsSnapshot::new(
            snap.timestamp() + Duration::days(day as i64),
            snap.ram,
            snap.swap,
            snap.disks.clone(),
            snap.log_signal.clone(),
        );
        last = Some(auditor.run(&snap, &mut store).unwrap());
    }
    let report = last.unwrap().report;
    assert_eq!(store.count().unwrap(), 5);

    let direction = |metric: Metric| {
        report
            .trends
            .iter()
            .find(|t| t.metric == metric)
            .map(|t| t.direction)
            .unwrap()
    };
    assert_eq!(direction(Metric::RamUsedPct), TrendDirection::Rising);
    assert_eq!(direction(Metric::DiskUsedPct("/".to_string())), TrendDirection::Flat);
    // Swap is disabled: no values, so no verdict beyond insufficient data.
    assert_eq!(direction(Metric::SwapUsedPct), TrendDirection::InsufficientData);
    // /home was never readable.
    assert_eq!(
        direction(Metric::DiskUsedPct("/home".to_string())),
        TrendDirection::InsufficientData
    );
}

#[test]
fn test_exports_derive_from_report() {
    let auditor = Auditor::from_config(&Config::default());
    let report = auditor.evaluate(&reference_snapshot()).unwrap();

    let json: serde_json::Value = serde_json::from_str(&export::to_json(&report).unwrap()).unwrap();
    assert_eq!(json["risk_labels"][0], "SWAP_CRITICAL");
    assert_eq!(json["ram"]["recommended_bytes"], 12 * GB);
    assert_eq!(json["disks"][1]["mount"], "/var");
    assert_eq!(json["disks"][1]["recommended_bytes"], 30 * GB);

    let csv = export::to_csv(&report);
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("timestamp,metric,value"));
    assert!(csv.contains(",ram_recommended_bytes,12000000000\n"));
    assert!(csv.contains(",disk:/home_used_pct,90.00\n"));
    assert!(csv.contains(",risk,SWAP_CRITICAL;DISK_CRITICAL:/;DISK_CRITICAL:/var;DISK_CRITICAL:/home\n"));

    let text = export::render_text(&report);
    assert!(text.contains("-> recommended RAM: 12 GB"));
    assert!(text.contains("DISK_CRITICAL:/var"));
}

#[test]
fn test_journald_limits_reach_every_output() {
    let auditor = Auditor::from_config(&Config::default());
    let report = auditor.evaluate(&reference_snapshot()).unwrap();
    assert_eq!(report.journald.system_max_use, "500M");

    let json: serde_json::Value = serde_json::from_str(&export::to_json(&report).unwrap()).unwrap();
    assert_eq!(json["journald"]["SystemMaxUse"], "500M");
    assert_eq!(json["journald"]["SystemKeepFree"], "1G");
    assert_eq!(json["journald"]["RuntimeMaxUse"], "200M");
    assert_eq!(json["journald"]["MaxFileSec"], "7day");

    let text = export::render_text(&report);
    assert!(text.contains("Logs (journald):\n  SystemMaxUse = 500M\n  SystemKeepFree = 1G\n"));
    assert!(export::to_csv(&report).contains(",journald:MaxFileSec,7day\n"));

    let mut config = Config::default();
    config.recommendation.journald.system_max_use = "2G".to_string();
    let report = Auditor::from_config(&config).evaluate(&reference_snapshot()).unwrap();
    assert!(export::render_text(&report).contains("SystemMaxUse = 2G"));
}

#[test]
fn test_local_day_boundary_files_records_by_local_date() {
    let mut config = Config::default();
    config.general.day_boundary = DayBoundary::Local;
    let auditor = Auditor::from_config(&config);
    let mut history = MemoryHistory::new();
    let snap = reference_snapshot();
    auditor.run(&snap, &mut history).unwrap();

    let expected = snap.timestamp().with_timezone(&chrono::Local).date_naive();
    let stored = history.latest(1).unwrap();
    assert_eq!(stored[0].day, expected);
}

#[test]
fn test_tracked_metrics_follow_config() {
    let mut config = Config::default();
    config.collection.mounts = vec!["/".to_string(), "/data".to_string()];
    let auditor = Auditor::from_config(&config);
    assert_eq!(
        auditor.tracked_metrics(),
        vec![
            Metric::RamUsedPct,
            Metric::SwapUsedPct,
            Metric::DiskUsedPct("/".to_string()),
            Metric::DiskUsedPct("/data".to_string()),
        ]
    );
    let labels = auditor.classifier().classify(&reference_snapshot());
    assert!(labels.contains(&RiskLabel::DiskCritical { mount: "/".to_string() }));
    assert!(!labels.contains(&RiskLabel::DiskCritical { mount: "/var".to_string() }));
}
