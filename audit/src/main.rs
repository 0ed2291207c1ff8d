use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resource_audit::{
    audit::Auditor,
    collector::{LinuxCollector, MetricsCollector},
    config::Config,
    export,
    history::{query_daily_average, DateRange, HistoryLog, Metric, SqliteHistory},
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "resource-audit", about = "Audit memory, swap and disk usage")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect, classify, recommend and record today's snapshot
    Run {
        /// Write the full report as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Write the flat metrics table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Do not touch the history store
        #[arg(long)]
        no_history: bool,
    },
    /// Daily averages for one metric
    History {
        /// ram, swap or disk:<mount>
        #[arg(long, default_value = "ram")]
        metric: Metric,
        #[arg(long, default_value = "30")]
        days: u32,
    },
    /// Trend verdicts over the configured window
    Trend {
        /// Limit to one metric (ram, swap or disk:<mount>)
        #[arg(long)]
        metric: Option<Metric>,
    },
    /// Write the default configuration file
    InitConfig,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Config::load(path).with_context(|| format!("loading {}", path.display()));
    }
    let config_path = Config::config_path();
    if !config_path.exists() {
        info!("No config file found, using defaults");
        return Ok(Config::default());
    }
    Ok(Config::load(&config_path).unwrap_or_else(|e| {
        warn!("Failed to load config: {}, using defaults", e);
        Config::default()
    }))
}

fn open_history(config: &Config) -> resource_audit::error::Result<SqliteHistory> {
    let store = SqliteHistory::open(&config.history_path())?;
    store.init_schema()?;
    Ok(store)
}

fn run(config: &Config, json: Option<PathBuf>, csv: Option<PathBuf>, no_history: bool) -> Result<()> {
    let auditor = Auditor::from_config(config);
    let collector = LinuxCollector::new(&config.collection);
    let snapshot = collector
        .collect(&config.collection.mounts)
        .context("collecting metrics")?;

    let report = if no_history {
        auditor.evaluate(&snapshot)?
    } else {
        match open_history(config) {
            Ok(mut store) => {
                let outcome = auditor.run(&snapshot, &mut store)?;
                if let Some(e) = &outcome.append_error {
                    error!("History not updated: {}", e);
                }
                if let Some(e) = &outcome.trend_error {
                    warn!("History updated but trends unavailable: {}", e);
                }
                outcome.report
            }
            Err(e) => {
                error!("History store unavailable: {}", e);
                auditor.evaluate(&snapshot)?
            }
        }
    };

    print!("{}", export::render_text(&report));
    if let Some(path) = json {
        export::write_json(&report, &path).with_context(|| format!("writing {}", path.display()))?;
        info!("Report saved to {}", path.display());
    }
    if let Some(path) = csv {
        export::write_csv(&report, &path).with_context(|| format!("writing {}", path.display()))?;
        info!("Metrics table saved to {}", path.display());
    }
    Ok(())
}

fn history(config: &Config, metric: &Metric, days: u32) -> Result<()> {
    let store = open_history(config).context("opening history store")?;
    let today = config.general.day_boundary.day_of(&chrono::Utc::now());
    let range = DateRange::trailing(today, days);
    let daily = query_daily_average(&store, metric, &range)?;
    if daily.is_empty() {
        println!("No history for {} in the last {} days", metric, days);
    }
    for point in daily {
        println!("{}  {:>6.1}%  ({} samples)", point.date, point.value, point.samples);
    }
    Ok(())
}

fn trend(config: &Config, metric: Option<Metric>) -> Result<()> {
    let store = open_history(config).context("opening history store")?;
    let auditor = Auditor::from_config(config);
    let latest = store.latest(1)?;
    let Some(last) = latest.last() else {
        println!("No history recorded yet");
        return Ok(());
    };
    let metrics = metric.map(|m| vec![m]).unwrap_or_else(|| auditor.tracked_metrics());
    for verdict in auditor.trends_at(&store, last.day, metrics)? {
        match verdict.slope_per_day {
            Some(slope) => println!(
                "{:<12} {:<18} {:+.2} pts/day",
                verdict.metric.to_string(),
                verdict.direction,
                slope
            ),
            None => println!("{:<12} {}", verdict.metric.to_string(), verdict.direction),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::InitConfig = cli.command {
        let path = cli.config.unwrap_or_else(Config::config_path);
        Config::default()
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { json, csv, no_history } => run(&config, json, csv, no_history),
        Commands::History { metric, days } => history(&config, &metric, days),
        Commands::Trend { metric } => trend(&config, metric),
        Commands::InitConfig => Ok(()),
    }
}
