mod common;

use common::{gb, mounts, reference_snapshot, snapshot, GB};
use resource_audit::risk::{RiskClassifier, RiskLabel, RiskThresholds};

fn classifier() -> RiskClassifier {
    RiskClassifier::new(RiskThresholds::default(), mounts())
}

fn disk(mount: &str) -> RiskLabel {
    RiskLabel::DiskCritical { mount: mount.to_string() }
}

#[test]
fn test_reference_scenario_labels() {
    let labels = classifier().classify(&reference_snapshot());
    assert_eq!(
        labels,
        vec![RiskLabel::SwapCritical, disk("/"), disk("/var"), disk("/home")]
    );
    assert!(!labels.contains(&RiskLabel::RamCritical));
}

#[test]
fn test_ram_threshold_boundary() {
    let c = classifier();
    for used in 0..=100u64 {
        let snap = snapshot((used * GB / 10, 10 * GB), (0, 0), &[]);
        let labels = c.classify(&snap);
        assert_eq!(
            labels.contains(&RiskLabel::RamCritical),
            used >= 90,
            "ram {}% of 10 GB",
            used
        );
    }
}

#[test]
fn test_swap_threshold_boundary() {
    let c = classifier();
    for used in 0..=100u64 {
        let snap = snapshot((0, 8 * GB), (used * GB / 100, GB), &[]);
        assert_eq!(c.classify(&snap).contains(&RiskLabel::SwapCritical), used >= 60);
    }
}

#[test]
fn test_each_mount_is_independent() {
    let snap = snapshot(
        (gb(1.0), gb(8.0)),
        (0, 0),
        &[("/", gb(79.0), gb(100.0)), ("/var", gb(80.0), gb(100.0)), ("/home", gb(10.0), gb(100.0))],
    );
    assert_eq!(classifier().classify(&snap), vec![disk("/var")]);
}

#[test]
fn test_zero_swap_never_labels() {
    let snap = snapshot((gb(7.9), gb(8.0)), (0, 0), &[]);
    let labels = classifier().classify(&snap);
    assert_eq!(labels, vec![RiskLabel::RamCritical]);
}

#[test]
fn test_zero_capacity_mount_is_not_applicable() {
    let snap = snapshot((0, gb(8.0)), (0, 0), &[("/", 0, 0)]);
    assert!(classifier().classify(&snap).is_empty());
}

#[test]
fn test_absent_mount_is_skipped() {
    let snap = snapshot((0, gb(8.0)), (0, 0), &[("/home", gb(99.0), gb(100.0))]);
    assert_eq!(classifier().classify(&snap), vec![disk("/home")]);
}

#[test]
fn test_unmonitored_mount_is_ignored() {
    let snap = snapshot((0, gb(8.0)), (0, 0), &[("/srv", gb(99.0), gb(100.0))]);
    assert!(classifier().classify(&snap).is_empty());
}

#[test]
fn test_disk_override() {
    let mut thresholds = RiskThresholds::default();
    thresholds.disk_overrides.insert("/var".to_string(), 95.0);
    let c = RiskClassifier::new(thresholds, mounts());
    let labels = c.classify(&reference_snapshot());
    assert!(!labels.contains(&disk("/var")));
    assert!(labels.contains(&disk("/")));
}

#[test]
fn test_labels_follow_mount_order() {
    let c = RiskClassifier::new(
        RiskThresholds::default(),
        vec!["/home".to_string(), "/".to_string(), "/home".to_string()],
    );
    assert_eq!(c.mounts(), ["/home".to_string(), "/".to_string()]);
    let labels = c.classify(&reference_snapshot());
    assert_eq!(labels, vec![RiskLabel::SwapCritical, disk("/home"), disk("/")]);
}

#[test]
fn test_classification_is_deterministic() {
    let c = classifier();
    let snap = reference_snapshot();
    assert_eq!(c.classify(&snap), c.classify(&snap));
}

#[test]
fn test_label_display() {
    assert_eq!(RiskLabel::RamCritical.to_string(), "RAM_CRITICAL");
    assert_eq!(RiskLabel::SwapCritical.to_string(), "SWAP_CRITICAL");
    assert_eq!(disk("/var").to_string(), "DISK_CRITICAL:/var");
    assert_eq!(serde_json::to_string(&disk("/")).unwrap(), "\"DISK_CRITICAL:/\"");
}
