//! Forward price distributions consumed by the decision engine.
//!
//! Forecasts are produced elsewhere (model fitting is not part of this crate).
//! Anything exposing a mean, a density and a cumulative distribution over
//! positive prices can drive a decision; every continuous `statrs`
//! distribution qualifies out of the box.

use crate::utils::error::{Error, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, LogNormal, Normal, Uniform};
use statrs::statistics::Distribution;

/// Price distribution for one future decision step.
pub trait PriceForecast: Send + Sync {
    /// Expected price.
    fn mean(&self) -> f64;

    /// Probability density at `price`.
    fn pdf(&self, price: f64) -> f64;

    /// Probability that the price ends at or below `price`.
    fn cdf(&self, price: f64) -> f64;
}

impl<D> PriceForecast for D
where
    D: Continuous<f64, f64> + ContinuousCDF<f64, f64> + Distribution<f64> + Send + Sync,
{
    fn mean(&self) -> f64 {
        Distribution::mean(self).unwrap_or(f64::NAN)
    }

    fn pdf(&self, price: f64) -> f64 {
        Continuous::pdf(self, price)
    }

    fn cdf(&self, price: f64) -> f64 {
        ContinuousCDF::cdf(self, price)
    }
}

impl PriceForecast for Box<dyn PriceForecast> {
    fn mean(&self) -> f64 {
        (**self).mean()
    }

    fn pdf(&self, price: f64) -> f64 {
        (**self).pdf(price)
    }

    fn cdf(&self, price: f64) -> f64 {
        (**self).cdf(price)
    }
}

/// Serializable description of a forecast, as read from config or JSON files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForecastSpec {
    /// Log-normal price with log-space `location` and `scale`
    LogNormal { location: f64, scale: f64 },
    /// Normal price; mass below zero is ignored by the integration
    Normal { mean: f64, std_dev: f64 },
    /// Uniform price between `min` and `max`
    Uniform { min: f64, max: f64 },
}

impl ForecastSpec {
    /// Log-normal forecast with the given expected price and log volatility.
    pub fn log_normal_with_mean(mean: f64, scale: f64) -> Self {
        ForecastSpec::LogNormal { location: mean.ln() - scale * scale / 2.0, scale }
    }

    /// Instantiate the described distribution.
    pub fn build(&self) -> Result<Box<dyn PriceForecast>> {
        let invalid = |e: statrs::StatsError| Error::InvalidArgument(format!("{:?}: {}", self, e));
        Ok(match *self {
            | ForecastSpec::LogNormal { location, scale } => {
                Box::new(LogNormal::new(location, scale).map_err(invalid)?)
            }
            | ForecastSpec::Normal { mean, std_dev } => {
                Box::new(Normal::new(mean, std_dev).map_err(invalid)?)
            }
            | ForecastSpec::Uniform { min, max } => {
                Box::new(Uniform::new(min, max).map_err(invalid)?)
            }
        })
    }

    /// Instantiate a whole forecast sequence.
    pub fn build_all(specs: &[ForecastSpec]) -> Result<Vec<Box<dyn PriceForecast>>> {
        specs.iter().map(ForecastSpec::build).collect()
    }

    /// Read a JSON array of forecast descriptions.
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Vec<ForecastSpec>> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
