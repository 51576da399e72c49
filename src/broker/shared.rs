//! Thread-safe handle on a broker.
//! Decisions run under the read lock and never block each other; committing a
//! trade takes the write lock, so readers see either the old or the new state.

use super::Broker;
use crate::engine::Evaluation;
use crate::forecast::PriceForecast;
use crate::portfolio::LedgerState;
use crate::utils::error::{Error, Result};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
pub struct SharedBroker {
    inner: Arc<RwLock<Broker>>,
}

impl SharedBroker {
    pub fn new(broker: Broker) -> Self {
        Self { inner: Arc::new(RwLock::new(broker)) }
    }

    /// Run `f` against a consistent view of the broker.
    pub fn read<T>(&self, f: impl FnOnce(&Broker) -> T) -> Result<T> {
        let guard = self.inner.read().map_err(|_| Error::Poisoned)?;
        Ok(f(&guard))
    }

    pub fn snapshot(&self) -> Result<LedgerState> {
        self.read(|b| b.ledger().state().clone())
    }

    pub fn evaluate<F: PriceForecast>(&self, price: f64, forecasts: &[F]) -> Result<Evaluation> {
        self.read(|b| b.evaluate(price, forecasts))?
    }

    pub fn decide<F: PriceForecast>(&self, price: f64, forecasts: &[F]) -> Result<i64> {
        self.read(|b| b.decide(price, forecasts))?
    }

    /// Commit a trade to the live ledger.
    pub fn commit(&self, count: i64, price: f64) -> Result<LedgerState> {
        let mut guard = self.inner.write().map_err(|_| Error::Poisoned)?;
        guard.apply_trade(count, price, true)
    }

    /// Decide and commit under one write lock, so no other commit can slip in
    /// between valuation and execution.
    pub fn decide_and_commit<F: PriceForecast>(&self, price: f64, forecasts: &[F]) -> Result<i64> {
        let mut guard = self.inner.write().map_err(|_| Error::Poisoned)?;
        let count = guard.decide(price, forecasts)?;
        guard.apply_trade(count, price, true)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use crate::engine::observer::NoopObserver;
    use statrs::distribution::Normal;
    use std::thread;

    #[test]
    fn test_concurrent_readers_see_whole_states() {
        let broker = Broker::new(BrokerConfig::new(1000.0, 100.0, 0.0, 10.0, 1.0))
            .unwrap()
            .with_observer(Arc::new(NoopObserver));
        let shared = SharedBroker::new(broker);

        let writer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    shared.commit(2, 100.0).unwrap();
                    shared.commit(-2, 100.0).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let state = shared.snapshot().unwrap();
                        let filled = state.filled_count() as f64;
                        assert!((state.leftover + filled * 100.0 - 1000.0).abs() < 1e-9);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }

    #[test]
    fn test_decide_and_commit() {
        let broker = Broker::new(BrokerConfig::new(300.0, 100.0, 0.0, 10.0, 1.0).with_risk(1.0))
            .unwrap()
            .with_observer(Arc::new(NoopObserver));
        let shared = SharedBroker::new(broker);
        let forecasts = vec![Normal::new(120.0, 2.0).unwrap()];
        let count = shared.decide_and_commit(100.0, &forecasts).unwrap();
        assert_eq!(count, 3);
        assert_eq!(shared.read(|b| b.max_bid()).unwrap(), 3);
    }
}
