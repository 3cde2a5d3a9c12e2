//! Screener page parser.
//!
//! Extracts the header row and data rows from the `table.data-table`
//! body of a single screener page. The parser is stateless: schema
//! capture and row-shape checks happen in the collector, which sees
//! every page.

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};

const TABLE_SELECTOR: &str = "table.data-table";
const BODY_SELECTOR: &str = "tbody";
const ROW_SELECTOR: &str = "tr";

/// What a single page contained.
#[derive(Debug, Clone, PartialEq)]
pub enum PageContent {
    /// No `table.data-table` on the page.
    NoTable,
    /// A table without a body.
    NoBody,
    Table(ParsedTable),
}

/// Rows pulled out of a table body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTable {
    /// First row made only of header cells, if the page had one.
    pub header: Option<Vec<String>>,
    /// Rows without any header cell, as cleaned cell text.
    pub rows: Vec<Vec<String>>,
}

/// Compiled selectors for the screener table.
pub struct TableParser {
    table: Selector,
    body: Selector,
    row: Selector,
}

impl TableParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            table: compile(TABLE_SELECTOR)?,
            body: compile(BODY_SELECTOR)?,
            row: compile(ROW_SELECTOR)?,
        })
    }

    /// Parse one page of HTML.
    pub fn parse(&self, html: &str) -> PageContent {
        let doc = Html::parse_document(html);

        let Some(table) = doc.select(&self.table).next() else {
            return PageContent::NoTable;
        };
        let Some(body) = table.select(&self.body).next() else {
            return PageContent::NoBody;
        };

        let mut parsed = ParsedTable::default();

        for row in body.select(&self.row) {
            let cells: Vec<ElementRef> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "th" | "td"))
                .collect();

            if cells.is_empty() {
                continue;
            }

            let header_cells = cells.iter().filter(|c| c.value().name() == "th").count();

            if header_cells == cells.len() {
                if parsed.header.is_none() {
                    parsed.header = Some(cells.iter().map(|c| header_text(*c)).collect());
                }
                continue;
            }

            // Mixed rows are neither header nor data.
            if header_cells > 0 {
                continue;
            }

            parsed.rows.push(cells.iter().map(|c| cell_text(*c)).collect());
        }

        PageContent::Table(parsed)
    }
}

fn compile(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {css:?}: {e}"))
}

/// Trimmed text fragments joined without separators.
fn stripped_text(el: ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

fn header_text(el: ElementRef) -> String {
    stripped_text(el).replace('\n', " ")
}

/// Cell text with thousands separators and whitespace removed.
fn cell_text(el: ElementRef) -> String {
    stripped_text(el).replace(',', "")
}
