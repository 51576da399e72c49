//! Position ledger: uninvested cash plus a fixed set of capital chunks.
//!
//! Every chunk is bought with exactly one `min_bet` of cash and holds the
//! asset quantity that purchase yielded. After each mutation the filled chunks
//! form a prefix sorted by descending quantity, so selling `k` chunks always
//! releases the `k` largest holdings.

use crate::config::BrokerConfig;
use crate::utils::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Float drift, in units of `min_bet`, tolerated when buying with the last cash.
const CASH_DRIFT: f64 = 1e-9;

/// One slot of invested capital.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Chunk {
    Empty,
    /// Asset quantity bought with one `min_bet`
    Filled(f64),
}

impl Chunk {
    pub fn is_filled(&self) -> bool {
        matches!(self, Chunk::Filled(_))
    }

    /// Asset quantity held, zero for an empty slot.
    pub fn quantity(&self) -> f64 {
        match self {
            | Chunk::Empty => 0.0,
            | Chunk::Filled(qty) => *qty,
        }
    }
}

/// Filled before empty, larger quantities first.
fn chunk_order(a: &Chunk, b: &Chunk) -> Ordering {
    match (a, b) {
        | (Chunk::Filled(x), Chunk::Filled(y)) => y.total_cmp(x),
        | (Chunk::Filled(_), Chunk::Empty) => Ordering::Less,
        | (Chunk::Empty, Chunk::Filled(_)) => Ordering::Greater,
        | (Chunk::Empty, Chunk::Empty) => Ordering::Equal,
    }
}

/// Sum of asset quantities over any chunk set.
pub fn total_quantity(chunks: &[Chunk]) -> f64 {
    chunks.iter().map(Chunk::quantity).sum()
}

/// Cash and chunks at one point in time, either live or hypothetical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    pub leftover: f64,
    pub chunks: Vec<Chunk>,
}

impl LedgerState {
    fn normalize(&mut self) {
        self.chunks.sort_by(chunk_order);
    }

    pub fn filled_count(&self) -> usize {
        // filled chunks form a prefix
        self.chunks.iter().take_while(|c| c.is_filled()).count()
    }

    pub fn empty_count(&self) -> usize {
        self.chunks.len() - self.filled_count()
    }

    pub fn total_quantity(&self) -> f64 {
        total_quantity(&self.chunks)
    }
}

/// Capital ledger of one trading session.
#[derive(Debug, Clone)]
pub struct Ledger {
    funds: f64,
    min_bet: f64,
    max_stake: f64,
    ask_fee: f64,
    bid_fee: f64,
    state: LedgerState,
}

impl Ledger {
    /// Build an all-cash ledger, validating the configuration first.
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            funds: config.funds,
            min_bet: config.min_bet,
            max_stake: config.max_stake(),
            ask_fee: config.ask_fee,
            bid_fee: config.bid_fee,
            state: LedgerState {
                leftover: config.funds,
                chunks: vec![Chunk::Empty; config.n_chunks()],
            },
        })
    }

    pub fn funds(&self) -> f64 {
        self.funds
    }

    pub fn leftover(&self) -> f64 {
        self.state.leftover
    }

    pub fn min_bet(&self) -> f64 {
        self.min_bet
    }

    pub fn max_stake(&self) -> f64 {
        self.max_stake
    }

    pub fn bid_fee(&self) -> f64 {
        self.bid_fee
    }

    pub fn ask_fee(&self) -> f64 {
        self.ask_fee
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.state.chunks
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Capital currently invested.
    pub fn at_stake(&self) -> f64 {
        self.state.filled_count() as f64 * self.min_bet
    }

    /// Chunks that can be bought right now.
    pub fn max_ask(&self) -> usize {
        Self::max_ask_of(&self.state, self.min_bet)
    }

    /// Chunks that can be sold right now.
    pub fn max_bid(&self) -> usize {
        self.state.filled_count()
    }

    fn max_ask_of(state: &LedgerState, min_bet: f64) -> usize {
        let affordable = (state.leftover / min_bet + CASH_DRIFT).floor().max(0.0) as usize;
        state.empty_count().min(affordable)
    }

    /// Asset quantity one `min_bet` buys at `price`, after the ask fee.
    pub fn chunk_value(&self, price: f64) -> f64 {
        self.min_bet / (price * (1.0 + self.ask_fee))
    }

    /// Liquidation value of an arbitrary chunk set at `price`, after the bid fee.
    pub fn total_chunks_value(&self, price: f64, chunks: &[Chunk]) -> f64 {
        price * (1.0 - self.bid_fee) * total_quantity(chunks)
    }

    /// Liquidation value of the whole ledger at `price`.
    pub fn current_value(&self, price: f64) -> f64 {
        self.state.leftover + self.total_chunks_value(price, &self.state.chunks)
    }

    fn check_price(price: f64) -> Result<()> {
        if !(price.is_finite() && price > 0.0) {
            return Err(Error::InvalidArgument(format!("price should be positive, got {}", price)));
        }
        Ok(())
    }

    fn bought(&self, mut state: LedgerState, count: usize, price: f64) -> Result<LedgerState> {
        let max_ask = Self::max_ask_of(&state, self.min_bet);
        if count == 0 || count > max_ask {
            return Err(Error::InvalidArgument(format!(
                "cannot buy {} chunks, max_ask is {}",
                count, max_ask
            )));
        }
        Self::check_price(price)?;
        let qty = self.chunk_value(price);
        let first_empty = state.filled_count();
        for slot in &mut state.chunks[first_empty..first_empty + count] {
            *slot = Chunk::Filled(qty);
        }
        let remaining = state.leftover - count as f64 * self.min_bet;
        // a deficit within the drift max_ask tolerates means the cash is spent
        state.leftover = if remaining < 0.0 && remaining >= -CASH_DRIFT * self.min_bet {
            0.0
        } else {
            remaining
        };
        if state.leftover < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "buying {} chunks overdraws leftover by {}",
                count, -state.leftover
            )));
        }
        state.normalize();
        Ok(state)
    }

    fn sold(&self, mut state: LedgerState, count: usize, price: f64) -> Result<LedgerState> {
        let max_bid = state.filled_count();
        if count == 0 || count > max_bid {
            return Err(Error::InvalidArgument(format!(
                "cannot sell {} chunks, max_bid is {}",
                count, max_bid
            )));
        }
        Self::check_price(price)?;
        let proceeds = self.total_chunks_value(price, &state.chunks[..count]);
        for slot in &mut state.chunks[..count] {
            *slot = Chunk::Empty;
        }
        state.leftover += proceeds;
        state.normalize();
        Ok(state)
    }

    fn traded(&self, count: i64, price: f64) -> Result<LedgerState> {
        let state = self.state.clone();
        match count {
            | c if c > 0 => self.bought(state, c as usize, price),
            | c if c < 0 => self.sold(state, c.unsigned_abs() as usize, price),
            | _ => Ok(state),
        }
    }

    /// Buy `count` chunks at `price` in place.
    pub fn buy_chunks(&mut self, count: usize, price: f64) -> Result<()> {
        self.state = self.bought(self.state.clone(), count, price)?;
        Ok(())
    }

    /// Sell the `count` largest chunks at `price` in place.
    pub fn sell_chunks(&mut self, count: usize, price: f64) -> Result<()> {
        self.state = self.sold(self.state.clone(), count, price)?;
        Ok(())
    }

    /// State that trading `count` chunks at `price` would produce.
    ///
    /// Positive counts buy, negative counts sell, zero holds. The ledger is
    /// left untouched.
    pub fn preview_trade(&self, count: i64, price: f64) -> Result<LedgerState> {
        self.traded(count, price)
    }

    /// Trade `count` chunks at `price`, committing the result when `commit` is set.
    ///
    /// The new state is computed in full before it replaces the current one,
    /// so a rejected trade leaves the ledger unchanged.
    pub fn apply_trade(&mut self, count: i64, price: f64, commit: bool) -> Result<LedgerState> {
        let next = self.traded(count, price)?;
        if commit {
            self.state = next.clone();
        }
        Ok(next)
    }
}
