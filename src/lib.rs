//! # chunkbroker
//! Position sizing over discrete chunks of capital.
//!
//! A [`Broker`] owns a [`Ledger`] of uninvested cash and fixed-size capital
//! chunks. Given the current price and one price forecast per decision step,
//! it picks how many chunks to buy (positive), sell (negative) or whether to
//! hold (zero), maximizing the discounted expected ledger value while keeping
//! the probability of losing more than `max_loss * max_stake` below `risk`.
//!
//! ```no_run
//! use chunkbroker::{Broker, BrokerConfig, ForecastSpec};
//!
//! # fn main() -> chunkbroker::Result<()> {
//! let config = BrokerConfig::new(1000.0, 100.0, 3600.0, 600.0, 0.99).with_risk(0.1);
//! let mut broker = Broker::new(config)?;
//! let specs: Vec<ForecastSpec> = (0..=broker.max_delta())
//!     .map(|step| ForecastSpec::log_normal_with_mean(100.0 + step as f64, 0.02))
//!     .collect();
//! let forecasts = ForecastSpec::build_all(&specs)?;
//! let count = broker.decide(100.0, &forecasts)?;
//! broker.apply_trade(count, 100.0, true)?;
//! # Ok(())
//! # }
//! ```

pub use crate::utils::error::{Error, Result};

pub mod broker;
pub mod config;
pub mod engine;
pub mod forecast;
pub mod portfolio;
pub mod risk;
pub mod utils;

pub use broker::{Broker, SharedBroker};
pub use config::{BrokerConfig, Config, EngineConfig, InfeasiblePolicy};
pub use engine::observer::{DecisionObserver, LogObserver, NoopObserver};
pub use engine::{CandidateOutcome, CandidateStatus, DecisionEngine, Evaluation};
pub use forecast::{ForecastSpec, PriceForecast};
pub use portfolio::{Chunk, Ledger, LedgerState};
pub use utils::find_next_extremum;
