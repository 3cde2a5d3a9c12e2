//! Strategy engine — multi-factor scoring and rank-based allocation.

pub mod allocation;
pub mod scoring;

use anyhow::Result;
use tracing::info;

use crate::config::{PortfolioConfig, ScoringConfig};
use crate::types::{Portfolio, ScreenerDataset};
use allocation::Allocator;
use scoring::ScoringModel;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Pipelines scoring → top-N selection → share sizing.
///
/// Either returns a complete portfolio or an error; never a partial one.
pub struct PortfolioBuilder {
    model: ScoringModel,
    allocator: Allocator,
    strict_schema: bool,
}

impl PortfolioBuilder {
    pub fn new(model: ScoringModel, allocator: Allocator, strict_schema: bool) -> Self {
        Self {
            model,
            allocator,
            strict_schema,
        }
    }

    pub fn from_config(scoring: &ScoringConfig, portfolio: &PortfolioConfig) -> Self {
        Self::new(
            ScoringModel::with_price_column(&scoring.price_column),
            Allocator::new(portfolio.max_holdings, scoring.price_column.clone()),
            scoring.strict_schema,
        )
    }

    /// Metric columns `dataset` lacks. Lenient builds score them as 0.
    pub fn missing_columns(&self, dataset: &ScreenerDataset) -> Vec<String> {
        self.model.missing_columns(dataset)
    }

    /// Score `dataset` and allocate `capital` across the best candidates.
    ///
    /// An empty dataset yields an empty portfolio. With a strict schema,
    /// a missing metric column is a `SchemaMismatch` error.
    pub fn build(&self, dataset: &ScreenerDataset, capital: f64) -> Result<Portfolio> {
        if dataset.is_empty() {
            info!("Empty dataset, nothing to allocate");
            return Ok(Portfolio::default());
        }

        if self.strict_schema {
            self.model.validate_schema(dataset)?;
        }

        let scored = self.model.score(dataset);
        let portfolio = self.allocator.allocate(&scored, capital);

        info!(
            candidates = scored.len(),
            holdings = portfolio.len(),
            capital = format!("{:.2}", capital),
            invested = format!("{:.2}", portfolio.total_investment()),
            "Portfolio built"
        );

        Ok(portfolio)
    }
}

impl Default for PortfolioBuilder {
    fn default() -> Self {
        Self::new(ScoringModel::default(), Allocator::default(), false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
