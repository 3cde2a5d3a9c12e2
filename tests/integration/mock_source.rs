//! Mock screener for integration testing.
//!
//! Serves canned HTML pages in the screener's table layout and can be
//! told to fail on a given page, all in-memory.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Mutex;

use screenfolio::collector::PageSource;

/// Columns of the mock screen, in display order.
pub const COLUMNS: &[&str] = &[
    "S.No.",
    "Name",
    "CMPRs.",
    "P/E",
    "ROCE%",
    "Sales growth%",
    "Profit growth%",
    "Div Yld%",
    "Qtr Profit Var%",
    "Qtr Sales Var%",
];

/// One mock candidate; metric values follow `COLUMNS[2..]`.
#[derive(Debug, Clone)]
pub struct Row {
    pub name: String,
    pub values: Vec<String>,
}

impl Row {
    /// A candidate whose metrics improve with `quality`.
    pub fn graded(name: &str, price: f64, quality: f64) -> Self {
        Self {
            name: name.to_string(),
            values: vec![
                format_thousands(price),
                format!("{:.2}", 60.0 - quality * 5.0),
                format!("{:.2}", 5.0 + quality * 3.0),
                format!("{:.2}", quality * 2.0),
                format!("{:.2}", quality * 2.5),
                format!("{:.2}", 0.5 + quality / 10.0),
                format!("{:.2}", quality),
                format!("{:.2}", quality / 2.0),
            ],
        }
    }
}

/// Render a number with Indian-style thousands separators, as the screen does.
fn format_thousands(v: f64) -> String {
    let s = format!("{v:.2}");
    let (int, frac) = s.split_once('.').unwrap();
    if int.len() <= 3 {
        return s;
    }
    let (head, tail) = int.split_at(int.len() - 3);
    let mut groups = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (h, t) = rest.split_at(rest.len() - 2);
        groups.insert(0, t.to_string());
        rest = h;
    }
    if !rest.is_empty() {
        groups.insert(0, rest.to_string());
    }
    format!("{},{tail}.{frac}", groups.join(","))
}

/// Render one screener page.
pub fn render_page(columns: &[&str], rows: &[Row], start_index: usize) -> String {
    let mut html = String::from(
        "<html><body><div class=\"responsive-holder\"><table class=\"data-table text-nowrap\"><tbody>\n",
    );
    html.push_str("<tr>");
    for c in columns {
        html.push_str(&format!("<th data-tooltip=\"{c}\">\n  {c}\n</th>"));
    }
    html.push_str("</tr>\n");
    for (i, row) in rows.iter().enumerate() {
        html.push_str(&format!(
            "<tr data-row-company-id=\"{}\"><td class=\"text\">{}.</td><td class=\"text\"><a href=\"/company/{}/\">{}</a></td>",
            start_index + i,
            start_index + i,
            row.name,
            row.name
        ));
        for v in row.values.iter().take(columns.len().saturating_sub(2)) {
            html.push_str(&format!("<td>{v}</td>"));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody></table></div></body></html>");
    html
}

/// Split rows into pages of `page_size`.
pub fn paginate(columns: &[&str], rows: &[Row], page_size: usize) -> Vec<String> {
    rows.chunks(page_size)
        .enumerate()
        .map(|(i, chunk)| render_page(columns, chunk, i * page_size + 1))
        .collect()
}

pub struct MockScreener {
    pages: Vec<String>,
    fail_on: Option<u32>,
    requested: Mutex<Vec<u32>>,
}

impl MockScreener {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            fail_on: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Return a transport error when `page` is requested.
    pub fn failing_on(mut self, page: u32) -> Self {
        self.fail_on = Some(page);
        self
    }

    pub fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for MockScreener {
    async fn fetch_page(&self, page: u32) -> Result<String> {
        self.requested.lock().unwrap().push(page);
        if self.fail_on == Some(page) {
            return Err(anyhow!("connection reset on page {page}"));
        }
        Ok(self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_else(|| "<html><body><p>No results.</p></body></html>".to_string()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[test]
fn test_format_thousands() {
    assert_eq!(format_thousands(950.0), "950.00");
    assert_eq!(format_thousands(1234.5), "1,234.50");
    assert_eq!(format_thousands(1234567.0), "12,34,567.00");
}
