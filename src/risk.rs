//! Loss-risk estimation for hypothetical ledger states.
//! Shared by the decision engine and by callers that want to audit a position
//! against the session's loss budget without running a full decision.

use crate::forecast::PriceForecast;
use crate::portfolio::{Ledger, LedgerState};
use crate::utils::error::{Error, Result};

/// Price at which the chunks in `state` have lost `max_loss_abs` of their
/// liquidation value at `current_price`.
///
/// The solve divides by the net quantity held, so a state without price
/// exposure (no filled chunk, or a bid fee eating the whole sale) is a
/// computation error.
pub fn min_price(ledger: &Ledger, state: &LedgerState, current_price: f64, max_loss_abs: f64) -> Result<f64> {
    let net_qty = state.total_quantity() * (1.0 - ledger.bid_fee());
    let floor_value = ledger.total_chunks_value(current_price, &state.chunks) - max_loss_abs;
    if net_qty == 0.0 {
        return Err(Error::Computation(format!(
            "loss floor {} undefined without price exposure",
            floor_value
        )));
    }
    let price = floor_value / net_qty;
    if !price.is_finite() {
        return Err(Error::Computation(format!(
            "loss floor price is {} (floor value {}, net quantity {})",
            price, floor_value, net_qty
        )));
    }
    Ok(price)
}

/// Probability under `forecast` that the chunks in `state` lose more than
/// `max_loss_abs` relative to their value at `current_price`.
pub fn loss_risk_probability(
    ledger: &Ledger, state: &LedgerState, current_price: f64, max_loss_abs: f64,
    forecast: &dyn PriceForecast,
) -> Result<f64> {
    let floor = min_price(ledger, state, current_price, max_loss_abs)?;
    let probability = forecast.cdf(floor);
    if !(0.0..=1.0).contains(&probability) {
        return Err(Error::Computation(format!(
            "cdf({}) returned {} outside [0, 1]",
            floor, probability
        )));
    }
    Ok(probability)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use assert_matches::assert_matches;
    use statrs::distribution::Normal;

    fn ledger(bid_fee: f64) -> Ledger {
        let config = BrokerConfig::new(1000.0, 100.0, 60.0, 10.0, 1.0).with_fees(0.0, bid_fee);
        Ledger::new(&config).unwrap()
    }

    #[test]
    fn test_min_price_solves_loss_floor() {
        let l = ledger(0.0);
        // 5 chunks at 100 -> 5 units worth 500, floor at 400
        let state = l.preview_trade(5, 100.0).unwrap();
        let p = min_price(&l, &state, 100.0, 100.0).unwrap();
        assert!((p - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_price_with_bid_fee() {
        let l = ledger(0.5);
        let state = l.preview_trade(2, 50.0).unwrap();
        // 4 units, net 2 units at 50 = 100, floor 60 -> 30
        let p = min_price(&l, &state, 50.0, 40.0).unwrap();
        assert!((p - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_probability_matches_cdf() {
        let l = ledger(0.0);
        let state = l.preview_trade(5, 100.0).unwrap();
        let forecast = Normal::new(100.0, 10.0).unwrap();
        let p = loss_risk_probability(&l, &state, 100.0, 100.0, &forecast).unwrap();
        // P(X < 80) for N(100, 10) is about 2.275%
        assert!((p - 0.02275).abs() < 1e-4, "{}", p);
    }

    #[test]
    fn test_no_exposure_is_a_computation_error() {
        let l = ledger(0.0);
        let forecast = Normal::new(100.0, 10.0).unwrap();
        let state = l.state().clone();
        for budget in [100.0, 0.0] {
            assert_matches!(min_price(&l, &state, 100.0, budget), Err(Error::Computation(_)));
            assert_matches!(
                loss_risk_probability(&l, &state, 100.0, budget, &forecast),
                Err(Error::Computation(_))
            );
        }
    }

    #[test]
    fn test_selling_everything_leaves_no_exposure() {
        let mut l = ledger(0.0);
        l.buy_chunks(3, 100.0).unwrap();
        let state = l.preview_trade(-3, 100.0).unwrap();
        let forecast = Normal::new(95.0, 2.0).unwrap();
        assert_matches!(
            loss_risk_probability(&l, &state, 100.0, 100.0, &forecast),
            Err(Error::Computation(_))
        );
    }

    #[test]
    fn test_full_bid_fee_leaves_no_exposure() {
        let l = ledger(1.0);
        let state = l.preview_trade(1, 100.0).unwrap();
        let forecast = Normal::new(100.0, 10.0).unwrap();
        assert_matches!(
            loss_risk_probability(&l, &state, 100.0, 10.0, &forecast),
            Err(Error::Computation(_))
        );
    }
}
