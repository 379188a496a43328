//! TickFrame CLI — replay bar data through a configured pipeline.
//!
//! Commands:
//! - `replay` — feed minute bars (CSV or synthetic) through a pipeline
//!   described by a TOML config, printing strategy entries and coarse
//!   bucket closes as they happen
//! - `init-config` — write a starter pipeline config

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tickframe_core::{BarRecord, FeatureTable, Pipeline, PipelineSpec, UnitRegistry};

#[derive(Parser)]
#[command(
    name = "tickframe",
    about = "TickFrame CLI — multi-timeframe bar engine replay"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay minute bars through a configured pipeline.
    Replay {
        /// Path to a TOML pipeline config.
        #[arg(long)]
        config: PathBuf,

        /// CSV file of minute bars (date,open,high,low,close,volume, unix
        /// seconds; optional date_l column).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Use a synthetic random walk instead of a CSV.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Number of synthetic bars to generate.
        #[arg(long, default_value_t = 2_340)]
        synthetic_bars: usize,

        /// RNG seed for synthetic data.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Bars used to seed the pipeline before the live replay starts.
        #[arg(long, default_value_t = 390)]
        seed_rows: usize,

        /// Print every coarse bucket close, not only strategy entries.
        #[arg(long, default_value_t = false)]
        verbose: bool,
    },
    /// Write a starter pipeline config.
    InitConfig {
        /// Destination path.
        #[arg(long, default_value = "pipeline.toml")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Replay {
            config,
            csv,
            synthetic,
            synthetic_bars,
            seed,
            seed_rows,
            verbose,
        } => cmd_replay(
            &config,
            csv.as_deref(),
            synthetic,
            synthetic_bars,
            seed,
            seed_rows,
            verbose,
        ),
        Commands::InitConfig { path } => cmd_init_config(&path),
    }
}

fn cmd_replay(
    config: &Path,
    csv: Option<&Path>,
    synthetic: bool,
    synthetic_bars: usize,
    seed: u64,
    seed_rows: usize,
    verbose: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(config)
        .with_context(|| format!("reading config {}", config.display()))?;
    let spec: PipelineSpec =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", config.display()))?;

    let bars = match (csv, synthetic) {
        (Some(path), false) => load_csv_bars(path)?,
        (None, true) => synthetic_walk(synthetic_bars, seed),
        (Some(_), true) => bail!("--csv and --synthetic are mutually exclusive"),
        (None, false) => bail!("provide a bar source: --csv <path> or --synthetic"),
    };
    if bars.len() <= seed_rows {
        bail!(
            "need more than {seed_rows} bars to replay, got {}",
            bars.len()
        );
    }

    let history = table_of(&bars[..seed_rows])?;
    let mut pipeline = Pipeline::seed(&spec, &UnitRegistry::with_builtins(), history)?;
    println!(
        "seeded {} with {} bars across {:?}",
        pipeline.symbol(),
        seed_rows,
        pipeline.timeframes()
    );

    let started = Instant::now();
    let mut ticked = 0u64;
    let mut stale = 0u64;
    let mut entries = 0u64;

    for bar in &bars[seed_rows..] {
        let outcome = pipeline.on_bar(bar)?;
        if !outcome.applied {
            stale += 1;
            continue;
        }
        ticked += 1;

        if verbose {
            for &tf in &outcome.closed_buckets {
                let buf = pipeline.buffer(tf)?;
                if buf.len() < 2 {
                    continue;
                }
                // the just-closed bucket sits behind the freshly opened one
                let closed = buf.table().row(buf.len() - 2);
                println!(
                    "{} {tf} closed  o={:.2} h={:.2} l={:.2} c={:.2} v={}",
                    format_ts(closed.date),
                    closed.open,
                    closed.high,
                    closed.low,
                    closed.close,
                    closed.volume
                );
            }
        }

        entries += print_entries(&pipeline, bar.date)?;
    }

    let elapsed = started.elapsed();
    let rate = ticked as f64 / elapsed.as_secs_f64().max(1e-9);
    println!(
        "replayed {ticked} bars ({stale} stale) in {:.2?}, {rate:.0} bars/s, {entries} entries",
        elapsed
    );
    for tf in pipeline.timeframes() {
        let row = pipeline.last_row(tf)?;
        println!(
            "  {tf}: last {} c={:.2} cpl={}",
            format_ts(row.date),
            row.close,
            row.cpl
        );
    }
    Ok(())
}

/// Print any strategy entry signalled on this tick. Strategies expose
/// `<name>_size` / `_limit` / `_stoploss` / `_profit` columns; a non-zero
/// size on the newest slot is an entry order.
fn print_entries(pipeline: &Pipeline, date: i64) -> Result<u64> {
    let mut count = 0;
    for tf in pipeline.timeframes() {
        let table = pipeline.buffer(tf)?.table();
        let last = table.len() - 1;
        let names: Vec<String> = table
            .feature_names()
            .iter()
            .filter(|n| n.ends_with("_size"))
            .map(|n| n.to_string())
            .collect();
        for size_col in names {
            let Some(sizes) = table.get(&size_col)?.as_ints() else {
                continue;
            };
            let size = sizes[last];
            if size == 0 {
                continue;
            }
            let strat = size_col.trim_end_matches("_size");
            let limit = float_at(table, &format!("{strat}_limit"), last)?;
            let stop = float_at(table, &format!("{strat}_stoploss"), last)?;
            let profit = float_at(table, &format!("{strat}_profit"), last)?;
            println!(
                "{} {tf} {strat}: size={size} limit={limit:.2} stop={stop:.2} profit={profit:.2}",
                format_ts(date)
            );
            count += 1;
        }
    }
    Ok(count)
}

fn float_at(table: &FeatureTable, name: &str, i: usize) -> Result<f64> {
    match table.get(name)?.as_floats() {
        Some(col) => Ok(col[i]),
        None => bail!("column {name} is not a float column"),
    }
}

fn format_ts(secs: i64) -> String {
    match DateTime::<Utc>::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => format!("@{secs}"),
    }
}

#[derive(Debug, serde::Deserialize)]
struct CsvBar {
    date: i64,
    #[serde(default)]
    date_l: Option<i64>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

fn load_csv_bars(path: &Path) -> Result<Vec<BarRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut bars = Vec::new();
    for (i, record) in reader.deserialize::<CsvBar>().enumerate() {
        let b = record.with_context(|| format!("{}: record {}", path.display(), i + 1))?;
        bars.push(BarRecord {
            date: b.date,
            date_l: b.date_l.unwrap_or(b.date),
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: b.volume,
            cpl: true,
        });
    }
    if bars.is_empty() {
        bail!("{}: no bars", path.display());
    }
    Ok(bars)
}

/// Deterministic minute random walk starting 2024-01-02 00:00 UTC.
fn synthetic_walk(n: usize, seed: u64) -> Vec<BarRecord> {
    const T0: i64 = 1_704_153_600;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price: f64 = 4_700.0;
    (0..n)
        .map(|i| {
            price = (price + rng.gen_range(-2.0..2.0)).max(1.0);
            let date = T0 + 60 * i as i64;
            BarRecord {
                date,
                date_l: date,
                open: price - 0.2,
                high: price + rng.gen_range(0.0..1.5),
                low: price - rng.gen_range(0.0..1.5),
                close: price,
                volume: rng.gen_range(100..10_000),
                cpl: true,
            }
        })
        .collect()
}

fn table_of(bars: &[BarRecord]) -> Result<FeatureTable> {
    Ok(FeatureTable::from_core_columns(
        bars.iter().map(|b| b.date).collect(),
        bars.iter().map(|b| b.date_l).collect(),
        bars.iter().map(|b| b.open).collect(),
        bars.iter().map(|b| b.high).collect(),
        bars.iter().map(|b| b.low).collect(),
        bars.iter().map(|b| b.close).collect(),
        bars.iter().map(|b| b.volume).collect(),
        bars.iter().map(|b| b.cpl).collect(),
    )?)
}

fn cmd_init_config(path: &Path) -> Result<()> {
    const STARTER: &str = r#"symbol = "ES"
timeframes = ["m1", "m5", "m30"]

[[indicators]]
tf = "m1"
unit = "rsi"
params = { period = 14 }

[[indicators]]
tf = "m5"
unit = "rsi"
params = { period = 14 }

[[indicators]]
tf = "m1"
unit = "moving_averages"

[[realign]]
align = "close"
feature = "rsi"
from = "m5"
to = "m1"

[[strategies]]
tf = "m1"
unit = "rsi_strategy"
params = { threshold_high = 70.0, threshold_low = 30.0, htf_rsi = "rsim5" }
"#;
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    std::fs::write(path, STARTER).with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
