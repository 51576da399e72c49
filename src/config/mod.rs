//! Configuration module for the broker

mod template;

use crate::utils::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use template::{generate_commented_config_template, generate_config_template};

/// Tolerance used for the divisibility checks on `horizon` and `max_stake`.
const DIVISIBILITY_EPS: f64 = 1e-6;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Application settings
    #[serde(default)]
    pub app: AppConfig,

    /// Ledger and risk parameters
    pub broker: BrokerConfig,

    /// Decision engine tuning
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Application-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Log level (debug, info, warn, error)
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string() }
    }
}

/// Capital, fee and risk parameters of one trading session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerConfig {
    /// Total capital committed to the session
    pub funds: f64,

    /// Smallest tradable unit of cash, e.g. 10 EUR
    pub min_bet: f64,

    /// Maximal lookahead for a decision, in seconds
    pub horizon: f64,

    /// Time between two decisions, in seconds
    pub timestep: f64,

    /// Discount factor applied per decision step
    pub discount: f64,

    /// Maximum tolerated probability of losing `max_loss` within the horizon
    #[serde(default = "default_risk")]
    pub risk: f64,

    /// Cap on invested capital, defaults to `funds`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stake: Option<f64>,

    /// Proportional fee charged when buying
    #[serde(default)]
    pub ask_fee: f64,

    /// Proportional fee charged when selling
    #[serde(default)]
    pub bid_fee: f64,

    /// Fraction of `max_stake` the session tolerates losing within the horizon
    #[serde(default = "default_max_loss")]
    pub max_loss: f64,
}

fn default_risk() -> f64 {
    0.25
}

fn default_max_loss() -> f64 {
    0.1
}

fn is_multiple(value: f64, unit: f64) -> bool {
    let rem = value % unit;
    rem <= DIVISIBILITY_EPS || unit - rem <= DIVISIBILITY_EPS
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::ConfigError(format!("{} should be in [0, 1], got {}", name, value)));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::ConfigError(format!("{} should be positive, got {}", name, value)));
    }
    Ok(())
}

impl BrokerConfig {
    /// Minimal configuration; optional fields take their defaults.
    pub fn new(funds: f64, min_bet: f64, horizon: f64, timestep: f64, discount: f64) -> Self {
        Self {
            funds,
            min_bet,
            horizon,
            timestep,
            discount,
            risk: default_risk(),
            max_stake: None,
            ask_fee: 0.0,
            bid_fee: 0.0,
            max_loss: default_max_loss(),
        }
    }

    pub fn with_risk(mut self, risk: f64) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_max_stake(mut self, max_stake: f64) -> Self {
        self.max_stake = Some(max_stake);
        self
    }

    pub fn with_fees(mut self, ask_fee: f64, bid_fee: f64) -> Self {
        self.ask_fee = ask_fee;
        self.bid_fee = bid_fee;
        self
    }

    pub fn with_max_loss(mut self, max_loss: f64) -> Self {
        self.max_loss = max_loss;
        self
    }

    /// Effective stake cap.
    pub fn max_stake(&self) -> f64 {
        self.max_stake.unwrap_or(self.funds)
    }

    /// Number of chunks the stake cap is divided into.
    pub fn n_chunks(&self) -> usize {
        (self.max_stake() / self.min_bet + DIVISIBILITY_EPS).floor() as usize
    }

    /// Number of decision steps within the horizon.
    pub fn max_delta(&self) -> usize {
        (self.horizon / self.timestep + DIVISIBILITY_EPS).floor() as usize
    }

    /// Check every constraint a ledger relies on.
    pub fn validate(&self) -> Result<()> {
        check_positive("funds", self.funds)?;
        check_positive("min_bet", self.min_bet)?;
        check_positive("timestep", self.timestep)?;
        check_positive("discount", self.discount)?;
        if !(self.horizon.is_finite() && self.horizon >= 0.0) {
            return Err(Error::ConfigError(format!(
                "horizon should be non-negative, got {}",
                self.horizon
            )));
        }
        check_fraction("risk", self.risk)?;
        check_fraction("max_loss", self.max_loss)?;
        check_fraction("ask_fee", self.ask_fee)?;
        check_fraction("bid_fee", self.bid_fee)?;
        if !is_multiple(self.horizon, self.timestep) {
            return Err(Error::ConfigError(format!(
                "horizon {} should be divisible by timestep {}",
                self.horizon, self.timestep
            )));
        }
        let max_stake = self.max_stake();
        check_positive("max_stake", max_stake)?;
        if max_stake > self.funds + DIVISIBILITY_EPS {
            return Err(Error::ConfigError(format!(
                "max_stake {} exceeds funds {}",
                max_stake, self.funds
            )));
        }
        if !is_multiple(max_stake, self.min_bet) {
            return Err(Error::ConfigError(format!(
                "max_stake {} should be divisible by min_bet {}",
                max_stake, self.min_bet
            )));
        }
        Ok(())
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self::new(1000.0, 100.0, 3600.0, 600.0, 0.99)
    }
}

/// What `decide` does when no candidate satisfies the risk bound.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InfeasiblePolicy {
    /// Surface `Error::Infeasible` to the caller
    #[default]
    Fail,
    /// Fall back to holding the current position
    Hold,
}

/// Decision engine tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Absolute tolerance of the expected-value quadrature
    pub abs_tol: f64,

    /// Relative tolerance of the expected-value quadrature
    pub rel_tol: f64,

    /// Equal panels the mapped unit interval starts with
    pub initial_panels: usize,

    /// Bisections allowed before the quadrature gives up
    pub max_subdivisions: usize,

    /// Evaluate candidates on the rayon pool
    pub parallel: bool,

    /// Fallback when every candidate breaches the risk bound
    pub infeasible_policy: InfeasiblePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            abs_tol: 1e-8,
            rel_tol: 1e-9,
            initial_panels: 64,
            max_subdivisions: 2000,
            parallel: true,
            infeasible_policy: InfeasiblePolicy::Fail,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.abs_tol >= 0.0 && self.rel_tol >= 0.0) || (self.abs_tol == 0.0 && self.rel_tol == 0.0) {
            return Err(Error::ConfigError("quadrature tolerances should be non-negative and not both zero".into()));
        }
        if self.initial_panels == 0 {
            return Err(Error::ConfigError("initial_panels should be at least 1".into()));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.broker.validate()?;
        self.engine.validate()
    }

    /// Get the default configuration as a TOML string
    pub fn default_toml() -> Result<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.app.log_level, "info");
        assert!(config.validate().is_ok());
        assert_eq!(config.broker.n_chunks(), 10);
        assert_eq!(config.broker.max_delta(), 6);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = Config::default();
        config.broker = config.broker.with_fees(0.0026, 0.0016).with_max_stake(500.0);
        config.engine.infeasible_policy = InfeasiblePolicy::Hold;
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        config.save_to_file(path).unwrap();
        let loaded = Config::from_file(path).unwrap();

        assert_eq!(config, loaded);
    }

    #[test]
    fn test_optional_fields_take_defaults() {
        let toml_str = r#"
            [broker]
            funds = 100.0
            min_bet = 10.0
            horizon = 60.0
            timestep = 10.0
            discount = 1.0
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.broker.risk, 0.25);
        assert_eq!(config.broker.max_loss, 0.1);
        assert_eq!(config.broker.max_stake(), 100.0);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_invalid_fractions() {
        let base = BrokerConfig::default();
        assert_matches!(base.clone().with_risk(1.5).validate(), Err(Error::ConfigError(_)));
        assert_matches!(base.clone().with_risk(-0.1).validate(), Err(Error::ConfigError(_)));
        assert_matches!(base.clone().with_max_loss(2.0).validate(), Err(Error::ConfigError(_)));
        assert_matches!(base.with_fees(0.0, 1.1).validate(), Err(Error::ConfigError(_)));
    }

    #[test]
    fn test_divisibility() {
        let mut config = BrokerConfig::default();
        config.horizon = 1000.0;
        assert_matches!(config.validate(), Err(Error::ConfigError(msg)) if msg.contains("horizon"));

        let config = BrokerConfig::default().with_max_stake(250.0);
        assert_matches!(config.validate(), Err(Error::ConfigError(msg)) if msg.contains("min_bet"));

        // floating point remainders close to the unit still divide
        let config = BrokerConfig::new(0.3, 0.1, 0.3, 0.1, 1.0);
        assert!(config.validate().is_ok());
        assert_eq!(config.n_chunks(), 3);
        assert_eq!(config.max_delta(), 3);
    }

    #[test]
    fn test_stake_above_funds_is_rejected() {
        let config = BrokerConfig::default().with_max_stake(2000.0);
        assert_matches!(config.validate(), Err(Error::ConfigError(_)));
    }
}
