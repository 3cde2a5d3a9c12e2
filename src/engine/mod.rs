//! Core engine — one collect → capital → build → commit run.

pub mod report;

use anyhow::Result;
use chrono::Local;
use tracing::{info, warn};

use crate::collector::{PageSource, TableCollector};
use crate::storage::SnapshotStore;
use crate::strategy::PortfolioBuilder;
pub use report::{revalue, RunReport};

/// Run the pipeline once.
///
/// Infrastructure failures (transport, filesystem) abort the run before
/// the store is touched. An empty portfolio is reported but not
/// committed, so the next run still sees today's capital; the current
/// snapshot is then the one revalued.
pub async fn run_once(
    source: &dyn PageSource,
    collector: &TableCollector,
    builder: &PortfolioBuilder,
    store: &dyn SnapshotStore,
    price_column: &str,
) -> Result<RunReport> {
    let started = Local::now();

    // 1. Collect
    let dataset = collector.collect(source).await?;

    // 2. Capital from the current snapshot
    let capital = store.current_capital()?;

    // 3. Score and allocate
    let portfolio = builder.build(&dataset, capital)?;
    let missing_columns = if dataset.is_empty() {
        Vec::new()
    } else {
        builder.missing_columns(&dataset)
    };

    // 4. Commit
    let (committed, archived) = if portfolio.is_empty() {
        warn!("Empty portfolio, keeping the current one");
        (false, None)
    } else {
        let outcome = store.commit(&portfolio)?;
        (true, outcome.archived)
    };

    // 5. Value the previous holdings at today's prices. The portfolio is
    //    already committed here, so a bad snapshot only loses the figure.
    let previous = if committed {
        store.previous()
    } else {
        store.read_latest()
    };
    let previous_value = match previous {
        Ok(Some(previous)) => {
            let value = revalue(&previous, &dataset, price_column);
            info!(value = format!("{:.2}", value), "Previous portfolio revalued");
            Some(value)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Could not load previous portfolio");
            None
        }
    };

    Ok(RunReport {
        timestamp: started,
        capital,
        candidates: dataset.len(),
        missing_columns,
        portfolio,
        committed,
        archived,
        previous_value,
    })
}
