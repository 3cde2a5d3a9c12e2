//! Shared types for the portfolio construction pipeline.
//!
//! The collector produces a `ScreenerDataset`, the strategy layer turns it
//! into `ScoredCandidate`s and finally a `Portfolio`, and the storage layer
//! persists that portfolio. Keeping the model here avoids circular
//! references between those modules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Columns that identify a row rather than measure it.
pub const IDENTIFIER_COLUMNS: &[&str] = &["S.No.", "Name"];

/// Column carrying the candidate name.
pub const NAME_COLUMN: &str = "Name";

// ---------------------------------------------------------------------------
// Screener data
// ---------------------------------------------------------------------------

/// Inferred type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Row index or name.
    Identifier,
    /// Every value in the column parsed as a number.
    Numeric,
    /// At least one value was non-numeric text; kept as raw strings.
    Text,
}

/// A named column of the screener table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// One row of the screener table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Unique, non-empty key within a dataset.
    pub name: String,
    /// Raw cell text, one per schema column, separators already stripped.
    pub raw: Vec<String>,
    /// Metrics that parsed as numbers. Unparseable cells are absent.
    pub metrics: HashMap<String, f64>,
}

impl CandidateRecord {
    /// Numeric value of a metric column, if present and parseable.
    pub fn metric(&self, column: &str) -> Option<f64> {
        self.metrics.get(column).copied()
    }
}

/// The assembled screener table: an inferred schema plus its rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenerDataset {
    pub columns: Vec<Column>,
    pub records: Vec<CandidateRecord>,
}

impl ScreenerDataset {
    /// An empty dataset (no table or header was found).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a record by candidate name.
    pub fn find(&self, name: &str) -> Option<&CandidateRecord> {
        self.records.iter().find(|r| r.name == name)
    }
}

// ---------------------------------------------------------------------------
// Scoring output
// ---------------------------------------------------------------------------

/// A candidate with its per-metric normalized values and composite score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub record: CandidateRecord,
    /// Normalized contribution per configured metric, in [0, 1].
    /// Inverted metrics hold the already-inverted value.
    pub normalized: Vec<(String, f64)>,
    pub score: f64,
}

impl ScoredCandidate {
    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn normalized(&self, column: &str) -> Option<f64> {
        self.normalized
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| *v)
    }
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

/// A single holding in a portfolio snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioEntry {
    pub name: String,
    /// Current price; `None` when the source had no parseable price.
    pub price: Option<f64>,
    pub quantity: u64,
    /// `quantity × price`, zero when the price is missing.
    pub investment: f64,
    pub score: f64,
    /// 1 = best.
    pub rank: usize,
    /// Fraction of capital assigned to this rank.
    pub weight: f64,
}

impl fmt::Display for PortfolioEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let price = self
            .price
            .map(|p| format!("{p:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        write!(
            f,
            "#{} {} (price: {} | qty: {} | invested: {:.2} | score: {:.4})",
            self.rank, self.name, price, self.quantity, self.investment, self.score,
        )
    }
}

/// Ordered holdings snapshot, best rank first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Portfolio {
    pub entries: Vec<PortfolioEntry>,
}

impl Portfolio {
    pub fn new(entries: Vec<PortfolioEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sum of realized investment across all holdings.
    pub fn total_investment(&self) -> f64 {
        self.entries.iter().map(|e| e.investment).sum()
    }

    /// The best-ranked `n` holdings.
    pub fn top(&self, n: usize) -> &[PortfolioEntry] {
        &self.entries[..n.min(self.entries.len())]
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    #[error("Transport error on page {page}: {message}")]
    Transport { page: u32, message: String },

    #[error("Schema mismatch: missing metric columns {missing:?}")]
    SchemaMismatch { missing: Vec<String> },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
