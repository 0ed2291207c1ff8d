//! Directional trend over daily averages

use crate::config::TrendConfig;
use crate::history::{DailyAverage, DateRange, Metric};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
    InsufficientData,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendDirection::Rising => "RISING",
            TrendDirection::Falling => "FALLING",
            TrendDirection::Flat => "FLAT",
            TrendDirection::InsufficientData => "INSUFFICIENT_DATA",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSettings {
    pub window_days: u32,
    /// Largest projected change, in percentage points, still considered flat.
    pub flat_tolerance_pct: f64,
    pub min_points: usize,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self::from(&TrendConfig::default())
    }
}

impl From<&TrendConfig> for TrendSettings {
    fn from(config: &TrendConfig) -> Self {
        Self {
            window_days: config.window_days,
            flat_tolerance_pct: config.flat_tolerance_pct,
            min_points: config.min_points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendVerdict {
    pub metric: Metric,
    pub direction: TrendDirection,
    /// Least-squares slope in percentage points per day; `None` without enough data.
    pub slope_per_day: Option<f64>,
    pub points: usize,
}

/// Fits a least-squares line through `points` and returns (slope, span in days).
fn fit(points: &[&DailyAverage]) -> (f64, f64) {
    let first = points[0].date;
    let xs: Vec<f64> = points
        .iter()
        .map(|p| (p.date - first).num_days() as f64)
        .collect();
    let n = points.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.value).sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, p) in xs.iter().zip(points) {
        num += (x - mean_x) * (p.value - mean_y);
        den += (x - mean_x) * (x - mean_x);
    }
    let slope = if den == 0.0 { 0.0 } else { num / den };
    let span = xs.last().copied().unwrap_or(0.0);
    (slope, span)
}

/// Judges direction from the trailing window of `daily`. Pure: the caller
/// supplies the averages.
pub fn trend(daily: &[DailyAverage], settings: &TrendSettings) -> TrendDirection {
    evaluate(daily, settings).0
}

fn evaluate(daily: &[DailyAverage], settings: &TrendSettings) -> (TrendDirection, Option<f64>, usize) {
    let Some(latest) = daily.iter().map(|d| d.date).max() else {
        return (TrendDirection::InsufficientData, None, 0);
    };
    let range = DateRange::trailing(latest, settings.window_days);
    let mut window: Vec<&DailyAverage> = daily.iter().filter(|d| range.contains(d.date)).collect();
    window.sort_by_key(|d| d.date);

    if window.len() < settings.min_points.max(2) {
        return (TrendDirection::InsufficientData, None, window.len());
    }

    let (slope, span) = fit(&window);
    let change = slope * span;
    let direction = if change.abs() <= settings.flat_tolerance_pct {
        TrendDirection::Flat
    } else if change > 0.0 {
        TrendDirection::Rising
    } else {
        TrendDirection::Falling
    };
    (direction, Some(slope), window.len())
}

pub struct TrendAnalyzer {
    settings: TrendSettings,
}

impl TrendAnalyzer {
    pub fn new(settings: TrendSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TrendSettings {
        &self.settings
    }

    pub fn analyze(&self, metric: Metric, daily: &[DailyAverage]) -> TrendVerdict {
        let (direction, slope_per_day, points) = evaluate(daily, &self.settings);
        TrendVerdict { metric, direction, slope_per_day, points }
    }
}
