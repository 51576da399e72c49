//! Broker: one ledger, one decision engine and the observer they report to.

mod shared;

pub use shared::SharedBroker;

use crate::config::{BrokerConfig, Config, EngineConfig, InfeasiblePolicy};
use crate::engine::observer::{DecisionObserver, LogObserver};
use crate::engine::{DecisionEngine, Evaluation};
use crate::forecast::PriceForecast;
use crate::portfolio::{Chunk, Ledger, LedgerState};
use crate::utils::error::{Error, Result};
use log::warn;
use std::sync::Arc;

/// Position-sizing broker for a single trading session.
#[derive(Clone)]
pub struct Broker {
    ledger: Ledger,
    engine: DecisionEngine,
    observer: Arc<dyn DecisionObserver>,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("ledger", &self.ledger)
            .field("engine", &self.engine)
            .finish()
    }
}

impl Broker {
    /// Broker with default engine settings, reporting through the `log` facade.
    pub fn new(config: BrokerConfig) -> Result<Self> {
        Self::with_settings(config, EngineConfig::default())
    }

    pub fn with_settings(config: BrokerConfig, settings: EngineConfig) -> Result<Self> {
        Ok(Self {
            ledger: Ledger::new(&config)?,
            engine: DecisionEngine::new(&config, settings)?,
            observer: Arc::new(LogObserver),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_settings(config.broker.clone(), config.engine.clone())
    }

    /// Replace the telemetry observer.
    pub fn with_observer(mut self, observer: Arc<dyn DecisionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn funds(&self) -> f64 {
        self.ledger.funds()
    }

    pub fn leftover(&self) -> f64 {
        self.ledger.leftover()
    }

    pub fn at_stake(&self) -> f64 {
        self.ledger.at_stake()
    }

    pub fn max_ask(&self) -> usize {
        self.ledger.max_ask()
    }

    pub fn max_bid(&self) -> usize {
        self.ledger.max_bid()
    }

    pub fn max_delta(&self) -> usize {
        self.engine.max_delta()
    }

    pub fn chunks(&self) -> &[Chunk] {
        self.ledger.chunks()
    }

    pub fn current_value(&self, price: f64) -> f64 {
        self.ledger.current_value(price)
    }

    /// Change the tolerated loss probability for later decisions.
    pub fn set_risk(&mut self, risk: f64) -> Result<()> {
        self.engine.set_risk(risk)
    }

    /// Change the tolerated loss fraction for later decisions.
    pub fn set_max_loss(&mut self, max_loss: f64) -> Result<()> {
        self.engine.set_max_loss(max_loss)
    }

    /// Full valuation report for the current ledger.
    pub fn evaluate<F: PriceForecast>(&self, price: f64, forecasts: &[F]) -> Result<Evaluation> {
        self.engine.evaluate(&self.ledger, price, forecasts, self.observer.as_ref())
    }

    /// Signed number of chunks to trade now, or [`Error::Infeasible`].
    pub fn make_order<F: PriceForecast>(&self, price: f64, forecasts: &[F]) -> Result<i64> {
        self.engine.make_order(&self.ledger, price, forecasts, self.observer.as_ref())
    }

    /// Like [`Broker::make_order`], applying the configured infeasibility policy.
    pub fn decide<F: PriceForecast>(&self, price: f64, forecasts: &[F]) -> Result<i64> {
        match self.make_order(price, forecasts) {
            | Err(Error::Infeasible { candidates })
                if self.engine.settings().infeasible_policy == InfeasiblePolicy::Hold =>
            {
                warn!("No feasible order among {} candidates, holding", candidates);
                Ok(0)
            }
            | other => other,
        }
    }

    /// Trade `count` chunks at `price`; the ledger only changes when `commit` is set.
    pub fn apply_trade(&mut self, count: i64, price: f64, commit: bool) -> Result<LedgerState> {
        let state = self.ledger.apply_trade(count, price, commit)?;
        self.observer.on_trade(count, price, commit);
        Ok(state)
    }
}
