//! Operator CLI for the confluence decision engine.
//!
//! One-shot commands: validate a config, replay bars into an entry
//! analysis, or evaluate exits for a position list. Bars come from CSV
//! (`timestamp,open,high,low,close,volume`, RFC 3339 timestamps).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use confluence_core::engine::SymbolEngine;
use confluence_core::entry::EntryRequest;
use confluence_core::exit::AdvisoryInputs;
use confluence_core::{Bar, EngineConfig, PositionSnapshot, Ticket, TradeDirection};

#[derive(Parser)]
#[command(name = "confluence", version, about = "Confluence decision engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and validate an engine config, printing its hash.
    Check {
        #[arg(long)]
        config: PathBuf,
    },
    /// Replay bars through a fresh engine and grade an entry on the last bar.
    Analyze {
        #[arg(long)]
        bars: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, value_parser = parse_direction)]
        direction: TradeDirection,
        /// Candidate entry price; defaults to the last close.
        #[arg(long)]
        price: Option<f64>,
        /// Where the signal originally fired, for drift scoring.
        #[arg(long)]
        signal_price: Option<f64>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        atr: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// Evaluate exit urgency for a list of open positions.
    Exits {
        #[arg(long)]
        bars: PathBuf,
        #[arg(long)]
        positions: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

fn parse_direction(s: &str) -> Result<TradeDirection, String> {
    match s.to_ascii_lowercase().as_str() {
        "long" | "buy" => Ok(TradeDirection::Long),
        "short" | "sell" => Ok(TradeDirection::Short),
        other => Err(format!("expected 'long' or 'short', got '{other}'")),
    }
}

#[derive(Debug, Deserialize)]
struct BarRecord {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct PositionRecord {
    ticket: u64,
    symbol: String,
    direction: String,
    entry_price: f64,
    current_price: f64,
    volume: f64,
    unrealized_pnl: f64,
    entry_time: DateTime<Utc>,
}

fn load_bars(path: &Path, symbol: &str) -> Result<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening bar file {}", path.display()))?;
    let mut bars = Vec::new();
    for record in reader.deserialize() {
        let r: BarRecord = record.context("malformed bar row")?;
        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp: r.timestamp,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
        });
    }
    if bars.is_empty() {
        bail!("bar file {} contains no rows", path.display());
    }
    Ok(bars)
}

fn load_positions(path: &Path) -> Result<Vec<PositionSnapshot>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening position file {}", path.display()))?;
    let mut positions = Vec::new();
    for record in reader.deserialize() {
        let r: PositionRecord = record.context("malformed position row")?;
        let direction = parse_direction(&r.direction)
            .map_err(|e| anyhow::anyhow!("position {}: {e}", r.ticket))?;
        positions.push(PositionSnapshot {
            ticket: Ticket(r.ticket),
            symbol: r.symbol,
            direction,
            entry_price: r.entry_price,
            current_price: r.current_price,
            volume: r.volume,
            unrealized_pnl: r.unrealized_pnl,
            entry_time: r.entry_time,
        });
    }
    Ok(positions)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(p) => {
            let text = fs::read_to_string(p)
                .with_context(|| format!("reading config {}", p.display()))?;
            EngineConfig::from_toml(&text)
                .with_context(|| format!("parsing config {}", p.display()))?
        }
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Feed the engine one bar at a time so stateful detectors see the same
/// stream a live caller would produce.
fn replay(engine: &mut SymbolEngine, bars: &[Bar], atr: Option<f64>) {
    for end in 1..=bars.len() {
        engine.on_bar(&bars[..end], atr);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Check { config } => {
            let cfg = load_config(Some(&config))?;
            println!("ok {}", cfg.hash());
        }
        Command::Analyze {
            bars,
            symbol,
            direction,
            price,
            signal_price,
            config,
            atr,
            json,
        } => {
            let cfg = load_config(config.as_deref())?;
            let bars = load_bars(&bars, &symbol)?;
            let mut engine = SymbolEngine::new(symbol.as_str(), &cfg)?;
            replay(&mut engine, &bars, atr);

            let last_close = bars.last().map(|b| b.close).unwrap_or(f64::NAN);
            let decision = engine.analyze_entry(&EntryRequest {
                symbol: &symbol,
                direction,
                price: price.unwrap_or(last_close),
                bars: &bars,
                atr,
                original_signal_price: signal_price,
            });

            if json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                println!(
                    "{symbol} {direction}: {:?} score {:.1} enter={} size x{:.2}",
                    decision.quality, decision.score, decision.should_enter,
                    decision.size_multiplier
                );
                if let Some(optimal) = decision.optimal_entry {
                    println!("  wait for better entry near {optimal:.5}");
                }
                for reason in decision.reasons.iter().chain(&decision.warnings) {
                    println!("  [{:?}] {}", reason.code, reason.text);
                }
            }
        }
        Command::Exits {
            bars,
            positions,
            config,
            json,
        } => {
            let cfg = load_config(config.as_deref())?;
            let positions = load_positions(&positions)?;
            let symbol = positions
                .first()
                .map(|p| p.symbol.clone())
                .unwrap_or_else(|| "UNKNOWN".to_string());
            let bars = load_bars(&bars, &symbol)?;

            let mut engine = SymbolEngine::new(symbol.as_str(), &cfg)?;
            replay(&mut engine, &bars, None);
            let decisions = engine.evaluate_exits(&positions, &bars, &AdvisoryInputs::default());

            if json {
                println!("{}", serde_json::to_string_pretty(&decisions)?);
            } else {
                for d in &decisions {
                    println!(
                        "{} {}: {:?} close {:.0}% conf {:.2} ({})",
                        d.symbol,
                        d.ticket,
                        d.urgency,
                        d.close_fraction * 100.0,
                        d.confidence,
                        d.reason.text
                    );
                }
            }
        }
    }
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
