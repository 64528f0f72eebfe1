//! `reconcile` CLI: resolve duplicate events and DST-sensitive times from the
//! command line.
//!
//! ## Usage
//!
//! ```sh
//! # Merge duplicate events from several feeds (stdin → stdout)
//! cat events.json | reconcile resolve --zone America/New_York
//!
//! # From file to file
//! reconcile resolve --zone Europe/Berlin -i events.json -o canonical.json
//!
//! # Resolve a wall-clock time; --later picks the second of a repeated hour
//! reconcile floating 2026-11-01T01:30 --zone America/New_York --later
//!
//! # First and last instant of a local calendar day
//! reconcile day-bounds 2026-03-08 --zone America/New_York
//!
//! # List all-day events that span more than one date
//! reconcile validate --zone UTC -i events.json
//! ```
//!
//! Set `RUST_LOG=debug` for resolution diagnostics on stderr.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, SecondsFormat};
use clap::{Parser, Subcommand};
use reconcile_engine::{
    day_bounds, resolve_fall_back, resolve_floating, validate_all_day_span, DuplicateResolver,
    Event, Occurrence,
};
use std::io::{self, Read};
use std::process;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "reconcile",
    version,
    about = "Calendar event reconciliation and DST-safe time resolution"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge duplicate events into canonical events
    Resolve {
        /// Zone used to place floating times on the timeline
        #[arg(long, default_value = "UTC")]
        zone: String,
        /// Input JSON array of events (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Resolve a wall-clock time in a zone to a UTC instant
    Floating {
        /// Local date-time, e.g. 2026-03-08T02:30 or 2026-03-08T02:30:00
        wall_clock: String,
        #[arg(long, default_value = "UTC")]
        zone: String,
        /// Pick the second occurrence of a time repeated by a DST fall-back
        #[arg(long)]
        later: bool,
    },
    /// Print the first and last instant of a local calendar day
    DayBounds {
        /// Calendar date, e.g. 2026-03-08
        date: String,
        #[arg(long, default_value = "UTC")]
        zone: String,
    },
    /// List all-day events whose span does not cover exactly one date
    Validate {
        #[arg(long, default_value = "UTC")]
        zone: String,
        /// Input JSON array of events (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            zone,
            input,
            output,
        } => {
            let events = read_events(input.as_deref())?;
            let resolver = DuplicateResolver::new(&zone).context("Failed to build resolver")?;
            let canonical = resolver.resolve(&events);
            info!(
                events = events.len(),
                canonical = canonical.len(),
                "resolved events"
            );
            let mut json = serde_json::to_string_pretty(&canonical)
                .context("Failed to serialize canonical events")?;
            json.push('\n');
            write_output(output.as_deref(), &json)?;
        }
        Commands::Floating {
            wall_clock,
            zone,
            later,
        } => {
            let wall = parse_wall_clock(&wall_clock)?;
            let instant = if later {
                resolve_fall_back(wall, &zone, Occurrence::Later)
            } else {
                resolve_floating(wall, &zone)
            }
            .context("Failed to resolve wall-clock time")?;
            println!("{}", instant.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        Commands::DayBounds { date, zone } => {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date: '{}'", date))?;
            let (start, end) = day_bounds(date, &zone).context("Failed to compute day bounds")?;
            println!("start: {}", start.to_rfc3339_opts(SecondsFormat::Millis, true));
            println!("end:   {}", end.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        Commands::Validate { zone, input } => {
            let events = read_events(input.as_deref())?;
            let mut invalid = Vec::new();
            for event in &events {
                if !validate_all_day_span(event, &zone).context("Failed to validate events")? {
                    invalid.push(event.id.as_str());
                }
            }
            debug!(checked = events.len(), invalid = invalid.len(), "validated spans");
            if invalid.is_empty() {
                println!("All {} events have valid spans", events.len());
            } else {
                for id in &invalid {
                    println!("{}", id);
                }
                eprintln!("{} all-day event(s) span more than one date", invalid.len());
                process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Accepts local date-times with or without seconds.
fn parse_wall_clock(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .with_context(|| format!("Invalid wall-clock time: '{}'", raw))
}

fn read_events(path: Option<&str>) -> Result<Vec<Event>> {
    let json = read_input(path)?;
    serde_json::from_str(&json).context("Failed to parse events JSON")
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
