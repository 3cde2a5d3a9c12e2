//! Run report and retrospective valuation.

use chrono::{DateTime, Local};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::types::{Portfolio, ScreenerDataset};

/// Holdings shown in the run summary.
const SUMMARY_HOLDINGS: usize = 5;

/// Everything a notifier needs to describe one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub timestamp: DateTime<Local>,
    /// Capital the new portfolio was sized against.
    pub capital: f64,
    /// Rows in the collected dataset.
    pub candidates: usize,
    /// Metric columns the dataset lacked, each scored as 0.
    pub missing_columns: Vec<String>,
    pub portfolio: Portfolio,
    /// Whether the portfolio replaced the canonical one.
    pub committed: bool,
    /// Archive created by this run's commit.
    pub archived: Option<PathBuf>,
    /// Most recent archived portfolio valued at today's prices.
    pub previous_value: Option<f64>,
}

impl RunReport {
    /// Capital left uninvested after share rounding.
    pub fn uninvested(&self) -> f64 {
        self.capital - self.portfolio.total_investment()
    }

    /// Log a human-readable run summary.
    pub fn log_summary(&self) {
        info!(
            time = %self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            candidates = self.candidates,
            holdings = self.portfolio.len(),
            capital = format!("{:.2}", self.capital),
            invested = format!("{:.2}", self.portfolio.total_investment()),
            cash = format!("{:.2}", self.uninvested()),
            committed = self.committed,
            archived = ?self.archived,
            previous_value = ?self.previous_value.map(|v| format!("{v:.2}")),
            "Run complete"
        );

        if !self.missing_columns.is_empty() {
            warn!(missing = ?self.missing_columns, "Scored without some metric columns");
        }

        for entry in self.portfolio.top(SUMMARY_HOLDINGS) {
            info!("{entry}");
        }
    }
}

/// Value `previous` holdings at the prices in `dataset`.
///
/// Holdings are matched on name; ones no longer listed, or listed
/// without a price, contribute nothing.
pub fn revalue(previous: &Portfolio, dataset: &ScreenerDataset, price_column: &str) -> f64 {
    previous
        .entries
        .iter()
        .filter_map(|e| {
            let price = dataset.find(&e.name)?.metric(price_column)?;
            Some(e.quantity as f64 * price)
        })
        .sum()
}
