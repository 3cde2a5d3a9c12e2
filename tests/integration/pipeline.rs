//! Full-pipeline runs against the mock screener and a temp directory.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use screenfolio::collector::TableCollector;
use screenfolio::engine::{run_once, RunReport};
use screenfolio::storage::{CsvPortfolioStore, SnapshotStore};
use screenfolio::strategy::allocation::Allocator;
use screenfolio::strategy::scoring::ScoringModel;
use screenfolio::strategy::PortfolioBuilder;
use screenfolio::types::FolioError;

use crate::mock_source::{paginate, MockScreener, Row, COLUMNS};

const PRICE: &str = "CMPRs.";
const DEFAULT_CAPITAL: f64 = 1_000_000.0;

fn temp_dir() -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("screenfolio_it_{}", uuid::Uuid::new_v4()));
    p
}

/// `n` candidates; higher index scores better on every factor.
fn graded_rows(n: usize, price_bump: f64) -> Vec<Row> {
    (0..n)
        .map(|i| {
            let price = (1000.0 + i as f64 * 10.0) * price_bump;
            Row::graded(&format!("Stock {i:02}"), price, i as f64)
        })
        .collect()
}

async fn run(
    source: &MockScreener,
    builder: &PortfolioBuilder,
    store: &CsvPortfolioStore,
) -> anyhow::Result<RunReport> {
    let collector = TableCollector::new(25, 200).unwrap();
    run_once(source, &collector, builder, store, PRICE).await
}

#[tokio::test]
async fn test_first_run_uses_default_capital() {
    let dir = temp_dir();
    let store = CsvPortfolioStore::new(&dir, DEFAULT_CAPITAL);
    let source = MockScreener::new(paginate(COLUMNS, &graded_rows(60, 1.0), 25));

    let report = run(&source, &PortfolioBuilder::default(), &store).await.unwrap();

    assert_eq!(source.requested(), vec![1, 2, 3]);
    assert_eq!(report.candidates, 60);
    assert_eq!(report.capital, DEFAULT_CAPITAL);
    assert!(report.committed);
    assert!(report.archived.is_none());
    assert!(report.previous_value.is_none());
    assert!(report.missing_columns.is_empty());

    let p = &report.portfolio;
    assert_eq!(p.len(), 15);
    assert_eq!(p.entries[0].name, "Stock 59");
    assert_eq!(p.entries[0].price, Some(1590.0));
    assert_eq!(p.entries[14].name, "Stock 45");

    let weight_sum: f64 = p.entries.iter().map(|e| e.weight).sum();
    assert!((weight_sum - 1.0).abs() < 1e-9);
    for (i, e) in p.entries.iter().enumerate() {
        assert_eq!(e.rank, i + 1);
        assert!(e.investment <= e.weight * DEFAULT_CAPITAL + 1e-6);
        assert_eq!(e.investment, e.quantity as f64 * e.price.unwrap());
        assert!(e.quantity > 0);
    }
    for pair in p.entries.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    assert!(store.canonical_path().exists());
    assert!(store.list_archives().unwrap().is_empty());
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_second_run_archives_and_compounds_capital() {
    let dir = temp_dir();
    let store = CsvPortfolioStore::new(&dir, DEFAULT_CAPITAL);
    let builder = PortfolioBuilder::default();

    let initial = MockScreener::new(paginate(COLUMNS, &graded_rows(30, 1.0), 25));
    let first = run(&initial, &builder, &store).await.unwrap();

    let moved = graded_rows(30, 1.1);
    let next_day = MockScreener::new(paginate(COLUMNS, &moved, 25));
    let second = run(&next_day, &builder, &store).await.unwrap();

    assert!((second.capital - first.portfolio.total_investment()).abs() < 1e-6);
    assert!(second.capital < DEFAULT_CAPITAL);

    let archive = second.archived.clone().unwrap();
    let name = archive.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("stocks_") && name.ends_with(".csv"));
    assert_eq!(store.most_recent_archive().unwrap(), Some(archive));

    // Yesterday's holdings at today's prices.
    let prices: HashMap<String, f64> = moved
        .iter()
        .map(|r| (r.name.clone(), r.values[0].replace(',', "").parse().unwrap()))
        .collect();
    let expected: f64 = first
        .portfolio
        .entries
        .iter()
        .map(|e| e.quantity as f64 * prices[&e.name])
        .sum();
    assert!((second.previous_value.unwrap() - expected).abs() < 1e-6);

    let archived = store.previous().unwrap().unwrap();
    assert_eq!(archived.len(), first.portfolio.len());
    assert_eq!(archived.entries[0].name, first.portfolio.entries[0].name);
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_exact_multiple_of_page_size_stops_on_missing_table() {
    let dir = temp_dir();
    let store = CsvPortfolioStore::new(&dir, DEFAULT_CAPITAL);
    let source = MockScreener::new(paginate(COLUMNS, &graded_rows(50, 1.0), 25));

    let report = run(&source, &PortfolioBuilder::default(), &store).await.unwrap();
    assert_eq!(source.requested(), vec![1, 2, 3]);
    assert_eq!(report.candidates, 50);
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_transport_failure_leaves_store_untouched() {
    let dir = temp_dir();
    let store = CsvPortfolioStore::new(&dir, DEFAULT_CAPITAL);
    let source =
        MockScreener::new(paginate(COLUMNS, &graded_rows(60, 1.0), 25)).failing_on(2);

    let result = run(&source, &PortfolioBuilder::default(), &store).await;
    assert!(result.is_err());
    assert_eq!(source.requested(), vec![1, 2]);
    assert!(!store.canonical_path().exists());
    assert!(store.list_archives().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_source_keeps_current_portfolio() {
    let dir = temp_dir();
    let store = CsvPortfolioStore::new(&dir, DEFAULT_CAPITAL);
    let builder = PortfolioBuilder::default();

    let initial = MockScreener::new(paginate(COLUMNS, &graded_rows(20, 1.0), 25));
    let first = run(&initial, &builder, &store).await.unwrap();

    let report = run(&MockScreener::new(Vec::new()), &builder, &store).await.unwrap();
    assert_eq!(report.candidates, 0);
    assert!(report.portfolio.is_empty());
    assert!(!report.committed);
    assert!(report.archived.is_none());
    // Current holdings have no price in an empty dataset.
    assert_eq!(report.previous_value, Some(0.0));

    let current = store.read_latest().unwrap().unwrap();
    assert_eq!(current.len(), first.portfolio.len());
    assert!(store.list_archives().unwrap().is_empty());
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_missing_metric_column_is_neutral() {
    let dir = temp_dir();
    let store = CsvPortfolioStore::new(&dir, DEFAULT_CAPITAL);
    let columns = &COLUMNS[..COLUMNS.len() - 1];
    let source = MockScreener::new(paginate(columns, &graded_rows(4, 1.0), 25));

    let report = run(&source, &PortfolioBuilder::default(), &store).await.unwrap();
    assert_eq!(report.missing_columns, vec!["Qtr Sales Var%".to_string()]);
    assert!(report.committed);
    assert_eq!(report.portfolio.len(), 4);
    assert_eq!(report.portfolio.entries[0].name, "Stock 03");
    let weight_sum: f64 = report.portfolio.entries.iter().map(|e| e.weight).sum();
    assert!((weight_sum - 1.0).abs() < 1e-9);
    assert!((report.portfolio.entries[0].weight - 0.4).abs() < 1e-12);
    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_strict_schema_aborts_before_commit() {
    let dir = temp_dir();
    let store = CsvPortfolioStore::new(&dir, DEFAULT_CAPITAL);
    let columns = &COLUMNS[..COLUMNS.len() - 1];
    let source = MockScreener::new(paginate(columns, &graded_rows(4, 1.0), 25));
    let strict = PortfolioBuilder::new(ScoringModel::default(), Allocator::default(), true);

    let err = run(&source, &strict, &store).await.unwrap_err();
    match err.downcast_ref::<FolioError>() {
        Some(FolioError::SchemaMismatch { missing }) => {
            assert_eq!(missing, &vec!["Qtr Sales Var%".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!store.canonical_path().exists());
}

#[tokio::test]
async fn test_malformed_rows_are_dropped() {
    let dir = temp_dir();
    let store = CsvPortfolioStore::new(&dir, DEFAULT_CAPITAL);
    let mut rows = graded_rows(5, 1.0);
    rows[2].values.truncate(3);
    let source = MockScreener::new(paginate(COLUMNS, &rows, 25));

    let report = run(&source, &PortfolioBuilder::default(), &store).await.unwrap();
    assert_eq!(report.candidates, 4);
    assert!(report.portfolio.entries.iter().all(|e| e.name != "Stock 02"));
    fs::remove_dir_all(&dir).unwrap();
}
