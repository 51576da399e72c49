//! Telemetry hooks for the decision engine.
//!
//! The engine never logs through process-wide state of its own; whoever
//! builds a broker hands it an observer. [`LogObserver`] forwards to the `log`
//! facade, [`NoopObserver`] discards everything.

use super::{CandidateOutcome, CandidateStatus};
use log::{debug, info, warn};

const TARGET: &str = "chunkbroker::engine";

/// Receives the intermediate results of every decision.
pub trait DecisionObserver: Send + Sync {
    /// The forecast step chosen as decision horizon.
    fn on_horizon(&self, _delta: usize, _extremum: f64) {}

    /// A single candidate trade has been valued.
    fn on_candidate(&self, _outcome: &CandidateOutcome) {}

    /// A count has been selected.
    fn on_decision(&self, _count: i64, _expected_gain: f64) {}

    /// No candidate satisfied the risk bound.
    fn on_infeasible(&self, _candidates: &[CandidateOutcome]) {}

    /// A trade has been applied to the ledger.
    fn on_trade(&self, _count: i64, _price: f64, _committed: bool) {}
}

/// Observer that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DecisionObserver for NoopObserver {}

/// Observer writing to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl DecisionObserver for LogObserver {
    fn on_horizon(&self, delta: usize, extremum: f64) {
        // steps are reported 1-based, as the discount exponent counts them
        info!(target: TARGET, "Expected price difference {} at delta {}", extremum, delta + 1);
    }

    fn on_candidate(&self, outcome: &CandidateOutcome) {
        match &outcome.status {
            | CandidateStatus::Accepted { value, risk } => {
                debug!(target: TARGET, "count {:>4}: value {:.6} risk {:.4}", outcome.count, value, risk)
            }
            | CandidateStatus::RiskBreached { value, risk } => debug!(
                target: TARGET,
                "count {:>4}: value {:.6} rejected, risk {:.4}",
                outcome.count,
                value,
                risk
            ),
            | CandidateStatus::Failed(reason) => {
                warn!(target: TARGET, "count {:>4}: evaluation failed: {}", outcome.count, reason)
            }
        }
    }

    fn on_decision(&self, count: i64, expected_gain: f64) {
        info!(target: TARGET, "Expected depot gain of {} with {} chunks", expected_gain, count);
    }

    fn on_infeasible(&self, candidates: &[CandidateOutcome]) {
        warn!(
            target: TARGET,
            "No order satisfies the risk bound among {} candidates",
            candidates.len()
        );
    }

    fn on_trade(&self, count: i64, price: f64, committed: bool) {
        let mode = if committed { "committed" } else { "simulated" };
        info!(target: TARGET, "Trade of {} chunks at {} {}", count, price, mode);
    }
}
