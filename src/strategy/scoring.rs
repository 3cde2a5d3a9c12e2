//! Multi-factor candidate scoring.
//!
//! Each configured metric is min–max normalized across the dataset,
//! optionally inverted (lower is better), and combined into one
//! composite score with fixed weights that sum to 1.

use anyhow::{bail, Result};
use tracing::{debug, warn};

use crate::types::{FolioError, ScoredCandidate, ScreenerDataset};

/// Guards the min–max denominator when a column is constant.
pub const NORMALIZATION_EPSILON: f64 = 1e-9;

pub const ROCE: &str = "ROCE%";
pub const SALES_GROWTH: &str = "Sales growth%";
pub const PROFIT_GROWTH: &str = "Profit growth%";
pub const PRICE_TO_EARNINGS: &str = "P/E";
pub const CURRENT_PRICE: &str = "CMPRs.";
pub const DIVIDEND_YIELD: &str = "Div Yld%";
pub const QTR_PROFIT_VARIANCE: &str = "Qtr Profit Var%";
pub const QTR_SALES_VARIANCE: &str = "Qtr Sales Var%";

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// One scored factor.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    pub column: String,
    /// Relative weight before renormalization.
    pub base_weight: f64,
    /// Use `1 - norm` instead of `norm`.
    pub invert: bool,
}

impl MetricSpec {
    pub fn new(column: &str, base_weight: f64) -> Self {
        Self {
            column: column.to_string(),
            base_weight,
            invert: false,
        }
    }

    pub fn inverted(column: &str, base_weight: f64) -> Self {
        Self {
            column: column.to_string(),
            base_weight,
            invert: true,
        }
    }
}

/// A fixed weighting formula over named metric columns.
#[derive(Debug, Clone)]
pub struct ScoringModel {
    metrics: Vec<MetricSpec>,
    /// Base weights divided by their sum.
    weights: Vec<f64>,
}

impl Default for ScoringModel {
    fn default() -> Self {
        Self::with_price_column(CURRENT_PRICE)
    }
}

impl ScoringModel {
    /// The standard eight-factor model, reading the price factor from
    /// `price_column`.
    ///
    /// Base weights total 0.85; renormalizing gives 0.2353 / 0.1765 / 0.0588.
    pub fn with_price_column(price_column: &str) -> Self {
        Self::build(vec![
            MetricSpec::new(ROCE, 0.20),
            MetricSpec::new(SALES_GROWTH, 0.15),
            MetricSpec::new(PROFIT_GROWTH, 0.15),
            MetricSpec::inverted(PRICE_TO_EARNINGS, 0.15),
            MetricSpec::new(price_column, 0.05),
            MetricSpec::new(DIVIDEND_YIELD, 0.05),
            MetricSpec::new(QTR_PROFIT_VARIANCE, 0.05),
            MetricSpec::new(QTR_SALES_VARIANCE, 0.05),
        ])
    }

    pub fn new(metrics: Vec<MetricSpec>) -> Result<Self> {
        if metrics.is_empty() {
            bail!("Scoring model needs at least one metric");
        }
        if metrics.iter().any(|m| !m.base_weight.is_finite() || m.base_weight < 0.0) {
            bail!("Metric weights must be finite and non-negative");
        }
        if metrics.iter().map(|m| m.base_weight).sum::<f64>() <= 0.0 {
            bail!("Metric weights must not all be zero");
        }
        Ok(Self::build(metrics))
    }

    fn build(metrics: Vec<MetricSpec>) -> Self {
        let total: f64 = metrics.iter().map(|m| m.base_weight).sum();
        let weights = metrics.iter().map(|m| m.base_weight / total).collect();
        Self { metrics, weights }
    }

    pub fn metrics(&self) -> &[MetricSpec] {
        &self.metrics
    }

    /// Applied weight per metric column.
    pub fn weights(&self) -> impl Iterator<Item = (&str, f64)> {
        self.metrics
            .iter()
            .zip(self.weights.iter())
            .map(|(m, w)| (m.column.as_str(), *w))
    }

    /// Metric columns the dataset's schema does not have.
    pub fn missing_columns(&self, dataset: &ScreenerDataset) -> Vec<String> {
        self.metrics
            .iter()
            .filter(|m| !dataset.has_column(&m.column))
            .map(|m| m.column.clone())
            .collect()
    }

    /// Strict schema check: every metric column must be present.
    pub fn validate_schema(&self, dataset: &ScreenerDataset) -> Result<(), FolioError> {
        let missing = self.missing_columns(dataset);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FolioError::SchemaMismatch { missing })
        }
    }

    /// Score every record and sort best first.
    ///
    /// Missing columns and unparseable values contribute 0. Ties keep
    /// dataset order.
    ///
    /// An absent inverted column also contributes 0 rather than `1 - 0`.
    /// Ranking is the same either way, but persisted scores are lower by
    /// that factor's weight than a `1 - norm` scheme would write.
    pub fn score(&self, dataset: &ScreenerDataset) -> Vec<ScoredCandidate> {
        let n = dataset.len();
        let mut normalized: Vec<Vec<(String, f64)>> =
            vec![Vec::with_capacity(self.metrics.len()); n];

        for metric in &self.metrics {
            if !dataset.has_column(&metric.column) {
                // Neutral for inverted metrics too: 0, not 1 - 0.
                warn!(column = %metric.column, "Metric column not found, scoring it as 0");
                for row in normalized.iter_mut() {
                    row.push((metric.column.clone(), 0.0));
                }
                continue;
            }

            let values: Vec<Option<f64>> = dataset
                .records
                .iter()
                .map(|r| r.metric(&metric.column))
                .collect();

            let missing = values.iter().filter(|v| v.is_none()).count();
            if missing > 0 {
                debug!(column = %metric.column, missing, "Unparseable values scored as 0");
            }

            for (row, norm) in normalized.iter_mut().zip(min_max_normalize(&values)) {
                let contribution = match norm {
                    Some(v) if metric.invert => 1.0 - v,
                    Some(v) => v,
                    None => 0.0,
                };
                row.push((metric.column.clone(), contribution));
            }
        }

        let mut scored: Vec<ScoredCandidate> = dataset
            .records
            .iter()
            .zip(normalized)
            .map(|(record, normalized)| {
                let score: f64 = normalized
                    .iter()
                    .zip(self.weights.iter())
                    .map(|((_, v), w)| v * w)
                    .sum();
                ScoredCandidate {
                    record: record.clone(),
                    normalized,
                    score,
                }
            })
            .collect();

        // Stable: equal scores keep dataset order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(candidates = scored.len(), "Candidates scored");
        scored
    }
}

/// `(v - min) / (max - min + ε)` over the present values.
///
/// Absent values stay absent and do not affect min or max.
pub fn min_max_normalize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present = values.iter().flatten().copied();
    let (min, max) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    if min > max {
        return vec![None; values.len()];
    }

    let span = max - min + NORMALIZATION_EPSILON;
    values
        .iter()
        .map(|v| v.map(|x| ((x - min) / span).clamp(0.0, 1.0)))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
