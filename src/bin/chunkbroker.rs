//! chunkbroker CLI
//! Loads a session configuration and a forecast file, then reports the order
//! the broker would place. Market data and forecasts come from elsewhere.

use anyhow::{Context, Result};
use chunkbroker::config::{generate_commented_config_template, Config};
use chunkbroker::utils::init_logging;
use chunkbroker::{Broker, CandidateStatus, ForecastSpec, InfeasiblePolicy};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "chunkbroker", author, version, about = "Chunked position sizing", long_about = None)]
struct Args {
    /// Path to the configuration file (TOML)
    #[arg(short, long, default_value = "config.toml", env = "CHUNKBROKER_CONFIG")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit
    #[arg(long)]
    print_default_config: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a commented configuration template
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Evaluate every trade count for the given price and forecasts
    Decide {
        /// Current market price
        #[arg(long)]
        price: f64,
        /// JSON array of forecasts, one per decision step
        #[arg(long, value_name = "JSON")]
        forecasts: PathBuf,
        /// Print the evaluation as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
    } else {
        eprintln!("Configuration file '{}' not found – using defaults", path.display());
        Ok(Config::default())
    }
}

fn decide(config: &Config, price: f64, forecasts: &Path, json: bool) -> Result<()> {
    let broker = Broker::from_config(config)?;
    let specs = ForecastSpec::load_json(forecasts)
        .with_context(|| format!("Failed to read forecasts from {}", forecasts.display()))?;
    let forecasts = ForecastSpec::build_all(&specs)?;
    let evaluation = broker.evaluate(price, &forecasts)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else {
        println!("horizon step {} (expected deviation {:.4})", evaluation.delta + 1, evaluation.extremum);
        println!("{:>6}  {:>14}  {:>8}  status", "count", "value", "risk");
        for c in &evaluation.candidates {
            match &c.status {
                | CandidateStatus::Accepted { value, risk } => {
                    println!("{:>6}  {:>14.4}  {:>8.4}  ok", c.count, value, risk)
                }
                | CandidateStatus::RiskBreached { value, risk } => {
                    println!("{:>6}  {:>14.4}  {:>8.4}  risk", c.count, value, risk)
                }
                | CandidateStatus::Failed(reason) => {
                    println!("{:>6}  {:>14}  {:>8}  failed: {}", c.count, "-", "-", reason)
                }
            }
        }
    }

    match evaluation.chosen {
        | Some(count) => println!("order: {}", count),
        | None if config.engine.infeasible_policy == InfeasiblePolicy::Hold => {
            println!("order: 0 (no count within the risk bound, holding)")
        }
        | None => println!(
            "order: none ({} candidates, none within the risk bound)",
            evaluation.candidates.len()
        ),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_default_config {
        println!("{}", Config::default_toml()?);
        return Ok(());
    }

    match args.command {
        | Some(Command::Init { force }) => {
            if args.config.exists() && !force {
                eprintln!("Config file {} exists. Use --force to overwrite.", args.config.display());
                std::process::exit(1);
            }
            generate_commented_config_template(&args.config)?;
            println!("✅ Wrote config template to {}", args.config.display());
        }
        | Some(Command::Decide { price, forecasts, json }) => {
            let config = load_config(&args.config)?;
            init_logging(&config.app.log_level);
            decide(&config, price, &forecasts, json)?;
        }
        | None => {
            let config = load_config(&args.config)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
