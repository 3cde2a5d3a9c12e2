//! Rank-based capital allocation.
//!
//! The top N scored candidates receive a linearly decreasing share of
//! capital: rank r of N gets `(N + 1 - r) / (1 + 2 + … + N)`. Share
//! counts are floored, so realized investment never exceeds the
//! allocation and the remainder stays as cash.

use tracing::{debug, warn};

use crate::types::{Portfolio, PortfolioEntry, ScoredCandidate};

/// Default number of holdings.
pub const DEFAULT_MAX_HOLDINGS: usize = 15;

/// Sum of `1..=n`.
fn rank_total(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Capital fraction for `rank` (1-based) out of `n` selected holdings.
///
/// Returns 0 for a rank outside `1..=n`.
pub fn rank_weight(rank: usize, n: usize) -> f64 {
    if rank == 0 || rank > n {
        return 0.0;
    }
    (n + 1 - rank) as f64 / rank_total(n) as f64
}

/// Whole shares affordable with `allocated` at `price`.
///
/// A missing, non-positive or non-finite price buys nothing.
pub fn share_quantity(allocated: f64, price: Option<f64>) -> u64 {
    match price {
        Some(p) if p.is_finite() && p > 0.0 && allocated.is_finite() && allocated > 0.0 => {
            (allocated / p).floor() as u64
        }
        _ => 0,
    }
}

#[derive(Debug, Clone)]
pub struct Allocator {
    max_holdings: usize,
    price_column: String,
}

impl Allocator {
    pub fn new(max_holdings: usize, price_column: impl Into<String>) -> Self {
        Self {
            max_holdings,
            price_column: price_column.into(),
        }
    }

    /// Build a portfolio from candidates already sorted best first.
    pub fn allocate(&self, scored: &[ScoredCandidate], capital: f64) -> Portfolio {
        let n = self.max_holdings.min(scored.len());
        if n == 0 {
            return Portfolio::default();
        }

        let total = rank_total(n) as f64;

        let entries = scored
            .iter()
            .take(n)
            .enumerate()
            .map(|(idx, candidate)| {
                let rank = idx + 1;
                let slots = (n + 1 - rank) as f64;
                let weight = slots / total;
                // Multiply before dividing so exact splits stay exact.
                let allocated = capital * slots / total;
                let price = candidate.record.metric(&self.price_column);

                let quantity = share_quantity(allocated, price);
                if !matches!(price, Some(p) if p > 0.0) {
                    warn!(
                        name = %candidate.name(),
                        price = ?price,
                        "Selected candidate has no usable price, holding 0 shares"
                    );
                }
                let investment = match price {
                    Some(p) if quantity > 0 => quantity as f64 * p,
                    _ => 0.0,
                };

                debug!(
                    rank,
                    name = %candidate.name(),
                    weight = format!("{:.4}", weight),
                    allocated = format!("{:.2}", allocated),
                    quantity,
                    "Position sized"
                );

                PortfolioEntry {
                    name: candidate.name().to_string(),
                    price,
                    quantity,
                    investment,
                    score: candidate.score,
                    rank,
                    weight,
                }
            })
            .collect();

        Portfolio::new(entries)
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HOLDINGS, crate::strategy::scoring::CURRENT_PRICE)
    }
}
