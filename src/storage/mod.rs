//! Persistence layer.
//!
//! The current portfolio lives in `stocks.csv`; every commit first
//! preserves the previous one as `stocks_<YYYYMMDD>_<HHMMSS>.csv`, so
//! the directory doubles as a timestamp-keyed version history.
//! Filenames sort chronologically, which is how the latest archive is
//! found.

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::collector::parse_number;
use crate::strategy::allocation::rank_weight;
use crate::types::{FolioError, Portfolio, PortfolioEntry};

/// Canonical portfolio file name.
pub const CANONICAL_FILE: &str = "stocks.csv";

const ARCHIVE_PREFIX: &str = "stocks_";
const ARCHIVE_EXT: &str = ".csv";
const TEMP_EXT: &str = ".tmp";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = "YYYYMMDD_HHMMSS".len();
const SUFFIX_WIDTH: usize = 3;

const HEADER: [&str; 5] = ["Name", "Price", "Qty", "Investment", "Score"];
const INVESTMENT_COLUMN: &str = "Investment";

// ---------------------------------------------------------------------------
// Store abstraction
// ---------------------------------------------------------------------------

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub canonical: PathBuf,
    /// Where the replaced portfolio went, if there was one.
    pub archived: Option<PathBuf>,
}

/// Versioned portfolio storage: one current snapshot plus immutable
/// history.
pub trait SnapshotStore {
    /// The current portfolio, or `None` on a first run.
    fn read_latest(&self) -> Result<Option<Portfolio>>;

    /// Capital available to the next allocation.
    fn current_capital(&self) -> Result<f64>;

    /// Archive the current portfolio (if any) and make `portfolio` current.
    fn commit(&self, portfolio: &Portfolio) -> Result<CommitOutcome>;

    /// The most recently archived portfolio.
    fn previous(&self) -> Result<Option<Portfolio>>;
}

// ---------------------------------------------------------------------------
// CSV file store
// ---------------------------------------------------------------------------

/// On-disk row format.
#[derive(Debug, Serialize, Deserialize)]
struct HoldingRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Price", alias = "CMPRs.")]
    price: Option<f64>,
    #[serde(rename = "Qty")]
    quantity: u64,
    #[serde(rename = "Investment")]
    investment: f64,
    #[serde(rename = "Score")]
    score: f64,
}

impl From<&PortfolioEntry> for HoldingRow {
    fn from(e: &PortfolioEntry) -> Self {
        Self {
            name: e.name.clone(),
            price: e.price,
            quantity: e.quantity,
            investment: e.investment,
            score: e.score,
        }
    }
}

/// Directory-backed store of CSV portfolio snapshots.
pub struct CsvPortfolioStore {
    dir: PathBuf,
    default_capital: f64,
}

impl CsvPortfolioStore {
    pub fn new(dir: impl Into<PathBuf>, default_capital: f64) -> Self {
        Self {
            dir: dir.into(),
            default_capital,
        }
    }

    pub fn canonical_path(&self) -> PathBuf {
        self.dir.join(CANONICAL_FILE)
    }

    /// Archive file name for a timestamp.
    pub fn archive_name(at: NaiveDateTime) -> String {
        Self::suffixed_archive_name(at, 0)
    }

    /// Archive name with a zero-padded `_<k>` collision suffix. `k == 0`
    /// means no suffix.
    fn suffixed_archive_name(at: NaiveDateTime, k: u32) -> String {
        let stamp = at.format(TIMESTAMP_FORMAT);
        if k == 0 {
            format!("{ARCHIVE_PREFIX}{stamp}{ARCHIVE_EXT}")
        } else {
            format!("{ARCHIVE_PREFIX}{stamp}_{k:0width$}{ARCHIVE_EXT}", width = SUFFIX_WIDTH)
        }
    }

    /// Sort key of an archive file name: its timestamp and collision
    /// suffix. `None` for anything not named `stocks_<YYYYMMDD>_<HHMMSS>[_<k>].csv`.
    fn archive_key(name: &str) -> Option<(NaiveDateTime, u32)> {
        let stem = name.strip_prefix(ARCHIVE_PREFIX)?.strip_suffix(ARCHIVE_EXT)?;
        let stamp = stem.get(..TIMESTAMP_LEN)?;
        let at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;

        let suffix = &stem[TIMESTAMP_LEN..];
        let k = if suffix.is_empty() {
            0
        } else {
            let digits = suffix.strip_prefix('_')?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()?
        };
        Some((at, k))
    }

    /// All archives, newest first.
    pub fn list_archives(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", self.dir.display()))
            }
        };

        let mut archives = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("Failed to list {}", self.dir.display()))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match Self::archive_key(&name) {
                Some(key) => archives.push((key, name)),
                None if name.starts_with(ARCHIVE_PREFIX) && name.ends_with(ARCHIVE_EXT) => {
                    debug!(file = %name, "Ignoring non-archive file");
                }
                None => {}
            }
        }

        archives.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        Ok(archives
            .into_iter()
            .map(|(_, name)| self.dir.join(name))
            .collect())
    }

    /// The newest archive path, if any.
    pub fn most_recent_archive(&self) -> Result<Option<PathBuf>> {
        Ok(self.list_archives()?.into_iter().next())
    }

    /// Load a portfolio file. Ranks follow file order.
    pub fn load(path: &Path) -> Result<Portfolio> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open portfolio {}", path.display()))?;

        let rows: Vec<HoldingRow> = reader
            .deserialize::<HoldingRow>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to parse portfolio {}", path.display()))?;

        let n = rows.len();
        let entries = rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| PortfolioEntry {
                name: row.name,
                price: row.price,
                quantity: row.quantity,
                investment: row.investment,
                score: row.score,
                rank: idx + 1,
                weight: rank_weight(idx + 1, n),
            })
            .collect();

        Ok(Portfolio::new(entries))
    }

    /// Write `portfolio` to `path` and flush it to disk.
    fn write(path: &Path, portfolio: &Portfolio) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        writer.write_record(HEADER)?;
        for entry in &portfolio.entries {
            writer
                .serialize(HoldingRow::from(entry))
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush {}: {}", path.display(), e.error()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync {}", path.display()))?;
        Ok(())
    }

    /// First free archive path for `at`, adding `_<k>` on collision.
    fn free_archive_path(&self, at: NaiveDateTime) -> PathBuf {
        let mut k = 0;
        loop {
            let path = self.dir.join(Self::suffixed_archive_name(at, k));
            if !path.exists() {
                return path;
            }
            k += 1;
        }
    }

    /// Commit with an explicit timestamp for the archive name.
    pub fn commit_at(&self, portfolio: &Portfolio, at: NaiveDateTime) -> Result<CommitOutcome> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let canonical = self.canonical_path();
        let staged = self.dir.join(format!("{CANONICAL_FILE}{TEMP_EXT}"));
        Self::write(&staged, portfolio)?;

        let archived = if canonical.exists() {
            let archive = self.free_archive_path(at);
            let mut staged_archive = archive.clone().into_os_string();
            staged_archive.push(TEMP_EXT);
            let staged_archive = PathBuf::from(staged_archive);

            fs::copy(&canonical, &staged_archive)
                .with_context(|| format!("Failed to copy {} for archiving", canonical.display()))?;
            fs::rename(&staged_archive, &archive)
                .with_context(|| format!("Failed to archive to {}", archive.display()))?;
            info!(archive = %archive.display(), "Archived old portfolio");
            Some(archive)
        } else {
            debug!("No existing portfolio to archive");
            None
        };

        fs::rename(&staged, &canonical).map_err(|e| {
            FolioError::Storage(format!("Failed to replace {}: {e}", canonical.display()))
        })?;

        info!(
            path = %canonical.display(),
            holdings = portfolio.len(),
            "Saved new portfolio"
        );

        Ok(CommitOutcome {
            canonical,
            archived,
        })
    }
}

impl SnapshotStore for CsvPortfolioStore {
    fn read_latest(&self) -> Result<Option<Portfolio>> {
        let path = self.canonical_path();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// Sum of `Investment` in the current portfolio.
    ///
    /// Falls back to the default capital when there is no portfolio yet
    /// or it cannot be read as a portfolio table.
    fn current_capital(&self) -> Result<f64> {
        let path = self.canonical_path();
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    capital = self.default_capital,
                    "No portfolio yet, using default capital"
                );
                return Ok(self.default_capital);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to open {}", path.display()))
            }
        };

        let mut reader = csv::Reader::from_reader(file);
        let column = match reader.headers() {
            Ok(h) => h.iter().position(|c| c == INVESTMENT_COLUMN),
            Err(e) => {
                warn!(error = %e, "Unreadable portfolio header, using default capital");
                return Ok(self.default_capital);
            }
        };
        let Some(column) = column else {
            warn!("Portfolio has no Investment column, using default capital");
            return Ok(self.default_capital);
        };

        let mut total = 0.0;
        for record in reader.records() {
            match record {
                Ok(r) => {
                    total += r.get(column).and_then(parse_number).unwrap_or(0.0);
                }
                Err(e) => {
                    warn!(error = %e, "Malformed portfolio row, using default capital");
                    return Ok(self.default_capital);
                }
            }
        }

        info!(capital = format!("{:.2}", total), "Current capital from portfolio");
        Ok(total)
    }

    fn commit(&self, portfolio: &Portfolio) -> Result<CommitOutcome> {
        self.commit_at(portfolio, Local::now().naive_local())
    }

    fn previous(&self) -> Result<Option<Portfolio>> {
        match self.most_recent_archive()? {
            Some(path) => Self::load(&path).map(Some),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
