//! Risk-bounded, horizon-aware order selection.
//!
//! For a current price and one forecast per decision step, the engine
//!
//! 1. picks the decision horizon `delta` at the first extremum of the expected
//!    price deviation,
//! 2. values every feasible trade count in `[-max_bid, max_ask]` by
//!    integrating the discounted ledger value against `forecasts[delta]`,
//! 3. drops counts whose probability of losing more than `max_loss * max_stake`
//!    is not below `risk`,
//! 4. returns the count with the highest expected value.
//!
//! Every candidate starts from the same, unmodified ledger.

pub mod observer;
pub mod quadrature;

use crate::config::{BrokerConfig, EngineConfig};
use crate::forecast::PriceForecast;
use crate::portfolio::Ledger;
use crate::risk::loss_risk_probability;
use crate::utils::error::{Error, Result};
use crate::utils::extremum::find_next_extremum;
use observer::DecisionObserver;
use quadrature::{integrate_half_line, Tolerance};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How a single candidate fared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CandidateStatus {
    /// Within the risk bound
    Accepted { value: f64, risk: f64 },
    /// Loss risk at or above the bound
    RiskBreached { value: f64, risk: f64 },
    /// Valuation failed numerically; the candidate is excluded
    Failed(String),
}

/// Valuation of one trade count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOutcome {
    pub count: i64,
    pub status: CandidateStatus,
}

impl CandidateOutcome {
    /// Expected value if the candidate survived the risk filter.
    pub fn accepted_value(&self) -> Option<f64> {
        match self.status {
            | CandidateStatus::Accepted { value, .. } => Some(value),
            | _ => None,
        }
    }
}

/// Full report of one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Index of the governing forecast
    pub delta: usize,
    /// Expected price deviation at `delta`
    pub extremum: f64,
    /// Liquidation value of the ledger at the current price
    pub current_value: f64,
    /// Every count in `[-max_bid, max_ask]`, ascending
    pub candidates: Vec<CandidateOutcome>,
    /// Winning count, `None` when nothing satisfies the risk bound
    pub chosen: Option<i64>,
}

impl Evaluation {
    pub fn candidate(&self, count: i64) -> Option<&CandidateOutcome> {
        self.candidates.iter().find(|c| c.count == count)
    }

    /// Expected value of the chosen count minus the current liquidation value.
    pub fn expected_gain(&self) -> Option<f64> {
        let count = self.chosen?;
        self.candidate(count)?.accepted_value().map(|v| v - self.current_value)
    }
}

/// Higher value wins; ties go to the smaller absolute count, then to selling.
fn better(a: (i64, f64), b: (i64, f64)) -> bool {
    match a.1.total_cmp(&b.1) {
        | Ordering::Greater => true,
        | Ordering::Less => false,
        | Ordering::Equal => (a.0.unsigned_abs(), a.0) < (b.0.unsigned_abs(), b.0),
    }
}

/// Stateless order selection over a borrowed ledger.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    discount: f64,
    max_delta: usize,
    max_loss: f64,
    risk: f64,
    tolerance: Tolerance,
    settings: EngineConfig,
}

impl DecisionEngine {
    pub fn new(broker: &BrokerConfig, settings: EngineConfig) -> Result<Self> {
        broker.validate()?;
        settings.validate()?;
        Ok(Self {
            discount: broker.discount,
            max_delta: broker.max_delta(),
            max_loss: broker.max_loss,
            risk: broker.risk,
            tolerance: Tolerance::from(&settings),
            settings,
        })
    }

    pub fn max_delta(&self) -> usize {
        self.max_delta
    }

    pub fn risk(&self) -> f64 {
        self.risk
    }

    pub fn max_loss(&self) -> f64 {
        self.max_loss
    }

    pub fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    pub(crate) fn set_risk(&mut self, risk: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&risk) {
            return Err(Error::ConfigError(format!("risk should be in [0, 1], got {}", risk)));
        }
        self.risk = risk;
        Ok(())
    }

    pub(crate) fn set_max_loss(&mut self, max_loss: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&max_loss) {
            return Err(Error::ConfigError(format!("max_loss should be in [0, 1], got {}", max_loss)));
        }
        self.max_loss = max_loss;
        Ok(())
    }

    /// Discounted expected ledger value `delta + 1` steps ahead after trading
    /// `count` chunks at `current_price`.
    pub fn expected_future_value(
        &self, ledger: &Ledger, forecast: &dyn PriceForecast, current_price: f64, count: i64,
        delta: usize,
    ) -> Result<f64> {
        let state = ledger.preview_trade(count, current_price)?;
        let factor = self.discount.powi(delta as i32 + 1);
        // chunks valued at a unit price, after the bid fee
        let net_qty = ledger.total_chunks_value(1.0, &state.chunks);
        let leftover = state.leftover;
        let q = integrate_half_line(
            |p| forecast.pdf(p) * factor * (leftover + p * net_qty),
            forecast.mean(),
            &self.tolerance,
        )?;
        Ok(q.value)
    }

    /// Probability of losing more than `max_loss * max_stake` after trading
    /// `count` chunks at `current_price`.
    pub fn loss_risk(
        &self, ledger: &Ledger, forecast: &dyn PriceForecast, current_price: f64, count: i64,
    ) -> Result<f64> {
        let state = ledger.preview_trade(count, current_price)?;
        let max_loss_abs = self.max_loss * ledger.max_stake();
        loss_risk_probability(ledger, &state, current_price, max_loss_abs, forecast)
    }

    fn evaluate_candidate(
        &self, ledger: &Ledger, forecast: &dyn PriceForecast, current_price: f64, count: i64,
        delta: usize,
    ) -> CandidateOutcome {
        let valued = self
            .expected_future_value(ledger, forecast, current_price, count, delta)
            .and_then(|value| {
                self.loss_risk(ledger, forecast, current_price, count).map(|risk| (value, risk))
            });
        let status = match valued {
            | Ok((value, risk)) if risk < self.risk => CandidateStatus::Accepted { value, risk },
            | Ok((value, risk)) => CandidateStatus::RiskBreached { value, risk },
            | Err(e) => CandidateStatus::Failed(e.to_string()),
        };
        CandidateOutcome { count, status }
    }

    /// Value every feasible count and pick the best one.
    pub fn evaluate<F: PriceForecast>(
        &self, ledger: &Ledger, current_price: f64, forecasts: &[F], observer: &dyn DecisionObserver,
    ) -> Result<Evaluation> {
        if forecasts.len() != self.max_delta + 1 {
            return Err(Error::InvalidArgument(format!(
                "expected {} forecasts, got {}",
                self.max_delta + 1,
                forecasts.len()
            )));
        }
        if !(current_price.is_finite() && current_price > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "price should be positive, got {}",
                current_price
            )));
        }

        let diffs: Vec<f64> = forecasts.iter().map(|f| f.mean() - current_price).collect();
        let (delta, extremum) = find_next_extremum(&diffs)?;
        observer.on_horizon(delta, extremum);
        let forecast: &dyn PriceForecast = &forecasts[delta];

        let lowest = -(ledger.max_bid() as i64);
        let highest = ledger.max_ask() as i64;
        let evaluate = |count| self.evaluate_candidate(ledger, forecast, current_price, count, delta);
        let candidates: Vec<CandidateOutcome> = if self.settings.parallel {
            (lowest..=highest).into_par_iter().map(evaluate).collect()
        } else {
            (lowest..=highest).map(evaluate).collect()
        };
        candidates.iter().for_each(|c| observer.on_candidate(c));

        let chosen = candidates
            .iter()
            .filter_map(|c| c.accepted_value().map(|v| (c.count, v)))
            .fold(None, |best: Option<(i64, f64)>, cand| match best {
                | Some(b) if !better(cand, b) => Some(b),
                | _ => Some(cand),
            })
            .map(|(count, _)| count);

        let evaluation = Evaluation {
            delta,
            extremum,
            current_value: ledger.current_value(current_price),
            candidates,
            chosen,
        };
        match evaluation.chosen {
            | Some(count) => observer.on_decision(count, evaluation.expected_gain().unwrap_or(0.0)),
            | None => observer.on_infeasible(&evaluation.candidates),
        }
        Ok(evaluation)
    }

    /// Signed number of chunks to trade now.
    ///
    /// Fails with [`Error::Infeasible`] when no count satisfies the risk bound;
    /// that outcome is distinct from a hold (`Ok(0)`).
    pub fn make_order<F: PriceForecast>(
        &self, ledger: &Ledger, current_price: f64, forecasts: &[F], observer: &dyn DecisionObserver,
    ) -> Result<i64> {
        let evaluation = self.evaluate(ledger, current_price, forecasts, observer)?;
        evaluation
            .chosen
            .ok_or(Error::Infeasible { candidates: evaluation.candidates.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::observer::NoopObserver;
    use super::*;
    use assert_matches::assert_matches;
    use statrs::distribution::{LogNormal, Normal};

    fn setup(risk: f64) -> (Ledger, DecisionEngine) {
        let config = BrokerConfig::new(1000.0, 100.0, 20.0, 10.0, 1.0).with_risk(risk);
        let settings = EngineConfig { parallel: false, ..EngineConfig::default() };
        (Ledger::new(&config).unwrap(), DecisionEngine::new(&config, settings).unwrap())
    }

    fn normals(means: &[f64], std_dev: f64) -> Vec<Normal> {
        means.iter().map(|&m| Normal::new(m, std_dev).unwrap()).collect()
    }

    #[test]
    fn test_better_tie_breaks() {
        assert!(better((3, 2.0), (0, 1.0)));
        assert!(better((0, 1.0), (2, 1.0)));
        assert!(better((-1, 1.0), (1, 1.0)));
        assert!(!better((2, 1.0), (-1, 1.0)));
    }

    #[test]
    fn test_expected_value_of_cash_is_discounted_leftover() {
        let config = BrokerConfig::new(1000.0, 100.0, 20.0, 10.0, 0.9);
        let ledger = Ledger::new(&config).unwrap();
        let engine = DecisionEngine::new(&config, EngineConfig::default()).unwrap();
        let forecast = LogNormal::new(100.0f64.ln(), 0.1).unwrap();
        let v = engine.expected_future_value(&ledger, &forecast, 100.0, 0, 1).unwrap();
        assert!((v - 1000.0 * 0.81).abs() < 1e-5, "{}", v);
    }

    #[test]
    fn test_expected_value_of_chunks_tracks_mean() {
        let (ledger, engine) = setup(1.0);
        let forecast = LogNormal::new(110.0f64.ln(), 0.05).unwrap();
        let mean = PriceForecast::mean(&forecast);
        let v = engine.expected_future_value(&ledger, &forecast, 100.0, 4, 0).unwrap();
        // 600 cash plus 4 units at the expected price
        assert!((v - (600.0 + 4.0 * mean)).abs() < 1e-5, "{}", v);
    }

    #[test]
    fn test_wrong_forecast_count() {
        let (ledger, engine) = setup(1.0);
        let forecasts = normals(&[100.0, 101.0], 5.0);
        assert_matches!(
            engine.make_order(&ledger, 100.0, &forecasts, &NoopObserver),
            Err(Error::InvalidArgument(_))
        );
    }

    #[test]
    fn test_rising_forecast_buys_everything() {
        let (ledger, engine) = setup(1.0);
        let forecasts = normals(&[105.0, 110.0, 108.0], 2.0);
        let evaluation = engine.evaluate(&ledger, 100.0, &forecasts, &NoopObserver).unwrap();
        assert_eq!(evaluation.delta, 1);
        assert_eq!(evaluation.extremum, 10.0);
        assert_eq!(evaluation.candidates.len(), 11);
        assert_eq!(evaluation.chosen, Some(10));
        assert!(evaluation.expected_gain().unwrap() > 0.0);
    }

    #[test]
    fn test_falling_forecast_sells_all_but_one() {
        let (mut ledger, engine) = setup(1.0);
        ledger.buy_chunks(6, 100.0).unwrap();
        let forecasts = normals(&[95.0, 90.0, 92.0], 2.0);
        let evaluation = engine.evaluate(&ledger, 100.0, &forecasts, &NoopObserver).unwrap();
        // full liquidation leaves no exposure to price the loss floor against
        assert_matches!(evaluation.candidate(-6).unwrap().status, CandidateStatus::Failed(_));
        assert_eq!(evaluation.chosen, Some(-5));
    }

    #[test]
    fn test_failed_candidates_are_excluded() {
        let (ledger, engine) = setup(1.0);
        let forecasts = normals(&[105.0, 110.0, 108.0], 2.0);
        let evaluation = engine.evaluate(&ledger, 100.0, &forecasts, &NoopObserver).unwrap();
        // holding an all-cash ledger has nothing to lose to the price
        assert_matches!(
            &evaluation.candidate(0).unwrap().status,
            CandidateStatus::Failed(reason) if reason.contains("exposure")
        );
        assert!(evaluation.candidates.iter().filter(|c| c.count != 0).all(|c| c.accepted_value().is_some()));
        assert_eq!(evaluation.chosen, Some(10));
        assert_eq!(engine.make_order(&ledger, 100.0, &forecasts, &NoopObserver).unwrap(), 10);
    }

    struct BrokenForecast;

    impl PriceForecast for BrokenForecast {
        fn mean(&self) -> f64 {
            100.0
        }

        fn pdf(&self, _price: f64) -> f64 {
            f64::NAN
        }

        fn cdf(&self, _price: f64) -> f64 {
            0.5
        }
    }

    #[test]
    fn test_all_candidates_failing_is_infeasible() {
        let (mut ledger, engine) = setup(1.0);
        ledger.buy_chunks(2, 100.0).unwrap();
        let forecasts = [BrokenForecast, BrokenForecast, BrokenForecast];
        let evaluation = engine.evaluate(&ledger, 100.0, &forecasts, &NoopObserver).unwrap();
        assert_eq!(evaluation.candidates.len(), 11);
        assert!(evaluation.candidates.iter().all(|c| matches!(c.status, CandidateStatus::Failed(_))));
        assert_eq!(evaluation.chosen, None);
        assert_matches!(
            engine.make_order(&ledger, 100.0, &forecasts, &NoopObserver),
            Err(Error::Infeasible { candidates: 11 })
        );
    }

    #[test]
    fn test_risk_bound_limits_exposure() {
        let (ledger, engine) = setup(0.05);
        let engine = DecisionEngine { max_loss: 0.02, ..engine };
        // upward drift but wide spread: only small positions stay within the bound
        let forecasts = normals(&[101.0, 102.0, 101.5], 10.0);
        let evaluation = engine.evaluate(&ledger, 100.0, &forecasts, &NoopObserver).unwrap();
        let chosen = evaluation.chosen.unwrap();
        assert!(chosen > 0 && chosen < 10, "chosen {}", chosen);
        assert_matches!(
            evaluation.candidate(10).unwrap().status,
            CandidateStatus::RiskBreached { .. }
        );
        assert_matches!(evaluation.candidate(0).unwrap().status, CandidateStatus::Failed(_));
        assert_matches!(evaluation.candidate(1).unwrap().status, CandidateStatus::Accepted { .. });
    }

    #[test]
    fn test_zero_risk_is_infeasible() {
        let (ledger, engine) = setup(0.0);
        let forecasts = normals(&[101.0, 102.0, 101.0], 5.0);
        assert_matches!(
            engine.make_order(&ledger, 100.0, &forecasts, &NoopObserver),
            Err(Error::Infeasible { candidates: 11 })
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (mut ledger, engine) = setup(0.3);
        ledger.buy_chunks(3, 100.0).unwrap();
        let forecasts = normals(&[99.0, 97.0, 98.0], 4.0);
        let sequential = engine.evaluate(&ledger, 100.0, &forecasts, &NoopObserver).unwrap();
        let mut parallel = engine.clone();
        parallel.settings.parallel = true;
        let parallel = parallel.evaluate(&ledger, 100.0, &forecasts, &NoopObserver).unwrap();
        assert_eq!(sequential, parallel);
    }
}
