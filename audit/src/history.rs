//! Append-only daily history (SQLite) and time-series aggregation

use crate::error::{AuditError, Result};
use crate::report::AuditReport;
use chrono::{DateTime, Duration, Local, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

const SCHEMA_VERSION: i64 = 2;

/// Columns added after the first schema. Older databases gain them as NULL.
const OPTIONAL_COLUMNS: &[(&str, &str)] = &[
    ("ram_total_bytes", "INTEGER"),
    ("risk_labels", "TEXT"),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    RamUsedPct,
    SwapUsedPct,
    DiskUsedPct(String),
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::RamUsedPct => write!(f, "ram"),
            Metric::SwapUsedPct => write!(f, "swap"),
            Metric::DiskUsedPct(mount) => write!(f, "disk:{}", mount),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ram" => Ok(Metric::RamUsedPct),
            "swap" => Ok(Metric::SwapUsedPct),
            _ => match s.strip_prefix("disk:") {
                Some(mount) if !mount.is_empty() => Ok(Metric::DiskUsedPct(mount.to_string())),
                _ => Err(format!("unknown metric '{}' (expected ram, swap or disk:<mount>)", s)),
            },
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which calendar a record's day is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayBoundary {
    #[default]
    Utc,
    /// The host's local time zone, for runs scheduled by a local cron.
    Local,
}

impl DayBoundary {
    pub fn day_of(&self, timestamp: &DateTime<Utc>) -> NaiveDate {
        match self {
            DayBoundary::Utc => timestamp.date_naive(),
            DayBoundary::Local => timestamp.with_timezone(&Local).date_naive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    /// Calendar day the record is filed under, fixed when it is created.
    pub day: NaiveDate,
    pub ram_used_pct: Option<f64>,
    pub swap_used_pct: Option<f64>,
    pub ram_total_bytes: Option<u64>,
    pub disk_used_pct: BTreeMap<String, f64>,
    pub risk_labels: Vec<String>,
}

impl HistoryRecord {
    /// A record filed under the UTC date of `timestamp`.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            day: timestamp.date_naive(),
            ram_used_pct: None,
            swap_used_pct: None,
            ram_total_bytes: None,
            disk_used_pct: BTreeMap::new(),
            risk_labels: Vec::new(),
        }
    }

    pub fn from_report(report: &AuditReport, boundary: DayBoundary) -> Self {
        Self {
            timestamp: report.timestamp,
            day: boundary.day_of(&report.timestamp),
            ram_used_pct: report.ram.percent,
            swap_used_pct: report.swap.percent,
            ram_total_bytes: (report.ram.total_bytes > 0).then_some(report.ram.total_bytes),
            disk_used_pct: report
                .disks
                .iter()
                .filter_map(|d| d.figures.percent.map(|pct| (d.mount.clone(), pct)))
                .collect(),
            risk_labels: report.risk_labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn value(&self, metric: &Metric) -> Option<f64> {
        match metric {
            Metric::RamUsedPct => self.ram_used_pct,
            Metric::SwapUsedPct => self.swap_used_pct,
            Metric::DiskUsedPct(mount) => self.disk_used_pct.get(mount).copied(),
        }
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days` calendar days ending at `end`, clamped to the earliest
    /// representable date.
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        let span = Duration::days(i64::from(days.max(1)) - 1);
        let start = end.checked_sub_signed(span).unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyAverage {
    pub date: NaiveDate,
    pub value: f64,
    pub samples: usize,
}

pub trait HistoryLog {
    fn append(&mut self, record: &HistoryRecord) -> Result<()>;

    /// Records whose day falls inside `range`, ordered by timestamp.
    fn records_between(&self, range: &DateRange) -> Result<Vec<HistoryRecord>>;

    /// The `limit` most recent records, oldest first.
    fn latest(&self, limit: usize) -> Result<Vec<HistoryRecord>>;
}

/// Mean of `metric` per calendar day, ascending by date. Days without a
/// value for the metric are absent, never zero-filled.
pub fn daily_averages(records: &[HistoryRecord], metric: &Metric) -> Vec<DailyAverage> {
    let mut days: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for record in records {
        if let Some(value) = record.value(metric) {
            let entry = days.entry(record.day).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    days.into_iter()
        .map(|(date, (sum, samples))| DailyAverage {
            date,
            value: sum / samples as f64,
            samples,
        })
        .collect()
}

pub fn query_daily_average(
    log: &dyn HistoryLog,
    metric: &Metric,
    range: &DateRange,
) -> Result<Vec<DailyAverage>> {
    let records = log.records_between(range)?;
    Ok(daily_averages(&records, metric))
}

/// In-memory log, used by tests and runs without persistence.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: Vec<HistoryRecord>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl HistoryLog for MemoryHistory {
    fn append(&mut self, record: &HistoryRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn records_between(&self, range: &DateRange) -> Result<Vec<HistoryRecord>> {
        let mut found: Vec<HistoryRecord> = self
            .records
            .iter()
            .filter(|r| range.contains(r.day))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.timestamp);
        Ok(found)
    }

    fn latest(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let mut all = self.records.clone();
        all.sort_by_key(|r| r.timestamp);
        let skip = all.len().saturating_sub(limit);
        Ok(all.into_iter().skip(skip).collect())
    }
}

pub struct SqliteHistory {
    conn: Connection,
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AuditError::StoreCorrupt(format!("bad timestamp '{}': {}", raw, e)))
}

fn parse_day(raw: &str) -> Result<NaiveDate> {
    raw.parse()
        .map_err(|e| AuditError::StoreCorrupt(format!("bad day '{}': {}", raw, e)))
}

/// Labels are kept as a JSON array so mount paths may contain any character.
fn encode_labels(labels: &[String]) -> Result<String> {
    serde_json::to_string(labels)
        .map_err(|e| AuditError::StoreCorrupt(format!("cannot encode risk labels: {}", e)))
}

fn decode_labels(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|e| AuditError::StoreCorrupt(format!("bad risk labels '{}': {}", raw, e)))
}

const SELECT_RECORDS: &str =
    "SELECT a.id, a.timestamp, a.day, a.ram_used_pct, a.swap_used_pct, a.ram_total_bytes, a.risk_labels,
            d.mount, d.used_pct
     FROM audits a LEFT JOIN audit_disks d ON d.audit_id = a.id";

struct RawRow {
    id: i64,
    timestamp: String,
    day: String,
    ram_used_pct: Option<f64>,
    swap_used_pct: Option<f64>,
    ram_total_bytes: Option<i64>,
    risk_labels: Option<String>,
    mount: Option<String>,
    used_pct: Option<f64>,
}

impl SqliteHistory {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        Ok(Self { conn })
    }

    /// Creates missing tables and adds optional columns absent from older stores.
    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(include_str!("../schema.sql"))?;

        let existing: Vec<String> = {
            let mut stmt = self.conn.prepare("SELECT name FROM pragma_table_info('audits')")?;
            let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
            names.collect::<rusqlite::Result<_>>()?
        };
        for (column, kind) in OPTIONAL_COLUMNS {
            if !existing.iter().any(|c| c == column) {
                debug!("Adding column audits.{}", column);
                self.conn
                    .execute_batch(&format!("ALTER TABLE audits ADD COLUMN {} {}", column, kind))?;
            }
        }

        let version: i64 = self.conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM audits", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
        Ok(RawRow {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            day: row.get(2)?,
            ram_used_pct: row.get(3)?,
            swap_used_pct: row.get(4)?,
            ram_total_bytes: row.get(5)?,
            risk_labels: row.get(6)?,
            mount: row.get(7)?,
            used_pct: row.get(8)?,
        })
    }

    /// Folds joined rows (one per disk) back into records, keeping row order.
    fn fold_rows(rows: Vec<RawRow>) -> Result<Vec<HistoryRecord>> {
        let mut records: Vec<HistoryRecord> = Vec::new();
        let mut last_id = None;
        for raw in rows {
            if last_id != Some(raw.id) {
                last_id = Some(raw.id);
                let mut record = HistoryRecord::new(parse_timestamp(&raw.timestamp)?);
                record.day = parse_day(&raw.day)?;
                record.ram_used_pct = raw.ram_used_pct;
                record.swap_used_pct = raw.swap_used_pct;
                record.ram_total_bytes = raw.ram_total_bytes.and_then(|b| u64::try_from(b).ok());
                record.risk_labels = match raw.risk_labels.as_deref() {
                    Some(labels) => decode_labels(labels)?,
                    None => Vec::new(),
                };
                records.push(record);
            }
            if let (Some(mount), Some(pct), Some(record)) = (raw.mount, raw.used_pct, records.last_mut()) {
                record.disk_used_pct.insert(mount, pct);
            }
        }
        Ok(records)
    }
}

impl HistoryLog for SqliteHistory {
    fn append(&mut self, record: &HistoryRecord) -> Result<()> {
        let labels = encode_labels(&record.risk_labels)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO audits (timestamp, day, ram_used_pct, swap_used_pct, ram_total_bytes, risk_labels)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                format_timestamp(&record.timestamp),
                record.day.to_string(),
                record.ram_used_pct,
                record.swap_used_pct,
                record.ram_total_bytes.and_then(|b| i64::try_from(b).ok()),
                labels,
            ],
        )?;
        let audit_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO audit_disks (audit_id, mount, used_pct) VALUES (?1, ?2, ?3)",
            )?;
            for (mount, pct) in &record.disk_used_pct {
                stmt.execute(params![audit_id, mount, pct])?;
            }
        }
        tx.commit()?;
        debug!("Appended history record {}", audit_id);
        Ok(())
    }

    fn records_between(&self, range: &DateRange) -> Result<Vec<HistoryRecord>> {
        let sql = format!(
            "{} WHERE a.day BETWEEN ?1 AND ?2 ORDER BY a.timestamp, a.id, d.mount",
            SELECT_RECORDS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![range.start.to_string(), range.end.to_string()],
                Self::map_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Self::fold_rows(rows)
    }

    fn latest(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let sql = format!(
            "{} WHERE a.id IN (SELECT id FROM audits ORDER BY timestamp DESC, id DESC LIMIT ?1)
             ORDER BY a.timestamp, a.id, d.mount",
            SELECT_RECORDS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Self::fold_rows(rows)
    }
}
