//! Table collector.
//!
//! Walks a paginated screener table page by page, captures the column
//! schema from the first header row it sees, and assembles every
//! well-formed data row into a `ScreenerDataset`.
//!
//! Pagination stops on the first page that has no table, no body, no
//! usable rows, or fewer rows than a full page.

pub mod html;
pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::types::{
    CandidateRecord, Column, ColumnKind, ScreenerDataset, IDENTIFIER_COLUMNS, NAME_COLUMN,
};
use html::{PageContent, TableParser};

/// Abstraction over anything that serves screener pages by index.
///
/// Pages are 1-based. Implementations return the raw page body; a
/// transport failure is an error and aborts the collection.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<String>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Build the URL for a page, appending `page=N` with the right separator.
pub fn page_url(base: &str, page: u32) -> String {
    let join = if base.contains('?') { '&' } else { '?' };
    format!("{base}{join}page={page}")
}

/// Sequential paginated collector.
pub struct TableCollector {
    parser: TableParser,
    page_size: usize,
    max_pages: u32,
}

impl TableCollector {
    pub fn new(page_size: usize, max_pages: u32) -> Result<Self> {
        Ok(Self {
            parser: TableParser::new()?,
            page_size,
            max_pages,
        })
    }

    pub fn from_config(cfg: &SourceConfig) -> Result<Self> {
        Self::new(cfg.page_size, cfg.max_pages)
    }

    /// Fetch every page from `source` and assemble the dataset.
    ///
    /// Returns an empty dataset when no table or header was ever found.
    /// Transport errors propagate.
    pub async fn collect(&self, source: &dyn PageSource) -> Result<ScreenerDataset> {
        info!(source = source.name(), "Collecting screener table...");

        let mut columns: Option<Vec<String>> = None;
        let mut all_rows: Vec<Vec<String>> = Vec::new();
        let mut page = 1u32;

        loop {
            let body = source.fetch_page(page).await?;

            let table = match self.parser.parse(&body) {
                PageContent::NoTable => {
                    info!(page, "No table found, stopping");
                    break;
                }
                PageContent::NoBody => {
                    info!(page, "No table body found, stopping");
                    break;
                }
                PageContent::Table(t) => t,
            };

            if columns.is_none() {
                if let Some(header) = table.header {
                    debug!(page, columns = ?header, "Schema captured");
                    columns = Some(header);
                }
            }

            let Some(schema) = columns.as_ref() else {
                warn!(
                    page,
                    rows = table.rows.len(),
                    "Data rows before any header row, dropping them"
                );
                if table.rows.len() < self.page_size || page >= self.max_pages {
                    break;
                }
                page += 1;
                continue;
            };

            let mut page_rows = Vec::with_capacity(table.rows.len());
            for row in table.rows {
                if row.len() != schema.len() {
                    debug!(
                        page,
                        cells = row.len(),
                        expected = schema.len(),
                        "Skipping malformed row"
                    );
                    continue;
                }
                page_rows.push(row);
            }

            if page_rows.is_empty() {
                info!(page, "No data rows found, stopping");
                break;
            }

            let fetched = page_rows.len();
            all_rows.extend(page_rows);
            info!(page, rows = fetched, total = all_rows.len(), "Page fetched");

            if fetched < self.page_size {
                debug!(page, "Short page, treating as last");
                break;
            }

            if page >= self.max_pages {
                warn!(max_pages = self.max_pages, "Page limit reached, stopping");
                break;
            }
            page += 1;
        }

        let Some(columns) = columns else {
            info!("No header row found, returning empty dataset");
            return Ok(ScreenerDataset::empty());
        };
        if all_rows.is_empty() {
            info!("No data found, returning empty dataset");
            return Ok(ScreenerDataset::empty());
        }

        let dataset = assemble(columns, all_rows);
        info!(
            records = dataset.len(),
            columns = dataset.columns.len(),
            "Screener table collected"
        );
        Ok(dataset)
    }
}

/// Parse a cleaned cell as a finite number.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Turn raw rows into records and infer column kinds.
fn assemble(columns: Vec<String>, rows: Vec<Vec<String>>) -> ScreenerDataset {
    let Some(name_idx) = columns.iter().position(|c| c == NAME_COLUMN) else {
        warn!(columns = ?columns, "Schema has no Name column, returning empty dataset");
        return ScreenerDataset::empty();
    };

    let mut seen = HashSet::new();
    let mut kept: Vec<Vec<String>> = Vec::with_capacity(rows.len());
    for row in rows {
        let name = row[name_idx].trim();
        if name.is_empty() {
            debug!("Skipping row with empty name");
            continue;
        }
        if !seen.insert(name.to_string()) {
            debug!(name, "Skipping duplicate candidate");
            continue;
        }
        kept.push(row);
    }

    let schema: Vec<Column> = columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let kind = if IDENTIFIER_COLUMNS.contains(&name.as_str()) {
                ColumnKind::Identifier
            } else if kept.iter().all(|row| parse_number(&row[idx]).is_some()) {
                ColumnKind::Numeric
            } else {
                ColumnKind::Text
            };
            Column { name: name.clone(), kind }
        })
        .collect();

    for column in schema.iter().filter(|c| c.kind == ColumnKind::Text) {
        debug!(column = %column.name, "Column left as text");
    }

    let records = kept
        .into_iter()
        .map(|raw| {
            let metrics: HashMap<String, f64> = schema
                .iter()
                .zip(raw.iter())
                .filter(|(col, _)| col.kind != ColumnKind::Identifier)
                .filter_map(|(col, cell)| parse_number(cell).map(|v| (col.name.clone(), v)))
                .collect();
            CandidateRecord {
                name: raw[name_idx].trim().to_string(),
                raw,
                metrics,
            }
        })
        .collect();

    ScreenerDataset {
        columns: schema,
        records,
    }
}
