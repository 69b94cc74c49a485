// 📊 Persistence Sink - append-only CSV ledger with duplicate detection
//
// Rows are [date, amount, vendor, category]. A record with the same date,
// amount (to the cent) and vendor (case-insensitive) as an existing row is
// treated as already recorded, not as an error. Rate-limit responses are
// retried with a bounded exponential backoff policy.

use log::{info, warn};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::expense::Expense;

#[derive(Debug, Error)]
pub enum SinkError {
    /// Backend asked us to slow down; callers retry with backoff.
    #[error("storage backend rate limited the write")]
    RateLimited,

    #[error("ledger I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("ledger encoding error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result of an append that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Data row number the record landed on (1-based).
    Written(u64),

    /// Same date, amount and vendor already recorded.
    Duplicate,
}

/// Destination for validated expense records.
pub trait ExpenseSink {
    fn append(&mut self, expense: &Expense) -> Result<AppendOutcome, SinkError>;

    fn append_batch(&mut self, expenses: &[Expense]) -> Result<Vec<AppendOutcome>, SinkError> {
        expenses.iter().map(|expense| self.append(expense)).collect()
    }
}

/// Idempotency hash over the fields that identify a recorded expense:
/// date, amount rounded to cents, lowercase vendor.
pub fn expense_fingerprint(date: &str, amount: f64, vendor: &str) -> String {
    let cents = (amount * 100.0).round() as i64;
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", date, cents, vendor.to_lowercase()));
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// CSV LEDGER
// ============================================================================

/// Append-only CSV file sink. Existing rows are fingerprinted at open so
/// duplicate detection survives process restarts.
pub struct CsvLedger {
    path: PathBuf,
    seen: HashSet<String>,
    rows: u64,
}

impl CsvLedger {
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut seen = HashSet::new();
        let mut rows = 0u64;

        if path.exists() {
            let mut reader = csv::Reader::from_path(path)?;
            for record in reader.records() {
                let record = record?;
                rows += 1;
                if record.len() >= 3 {
                    let amount = record[1].parse::<f64>().unwrap_or(0.0);
                    seen.insert(expense_fingerprint(&record[0], amount, &record[2]));
                }
            }
        } else {
            let mut writer = csv::Writer::from_path(path)?;
            writer.write_record(["date", "amount", "vendor", "category"])?;
            writer.flush()?;
        }

        info!("opened ledger {:?} with {} existing rows", path, rows);
        Ok(CsvLedger { path: path.to_path_buf(), seen, rows })
    }

    pub fn row_count(&self) -> u64 {
        self.rows
    }
}

impl ExpenseSink for CsvLedger {
    fn append(&mut self, expense: &Expense) -> Result<AppendOutcome, SinkError> {
        let fingerprint =
            expense_fingerprint(&expense.date_str(), expense.amount(), expense.vendor());

        if self.seen.contains(&fingerprint) {
            info!(
                "expense already recorded, skipping: {} - {} - {}",
                expense.date_str(),
                expense.vendor(),
                expense.display_amount()
            );
            return Ok(AppendOutcome::Duplicate);
        }

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record([
            expense.date_str(),
            format!("{:.2}", expense.amount()),
            expense.vendor().to_string(),
            expense.category().to_string(),
        ])?;
        writer.flush()?;

        self.seen.insert(fingerprint);
        self.rows += 1;
        Ok(AppendOutcome::Written(self.rows))
    }
}

// ============================================================================
// RETRY POLICY
// ============================================================================

/// Bounded exponential backoff for rate-limited writes.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(500), multiplier: 2.0 }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given 0-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.mul_f64(self.multiplier.powi(attempt as i32))
    }
}

/// Append, retrying rate-limit responses up to the policy's attempt
/// limit. Any other sink error is returned immediately.
pub fn append_with_retry(
    sink: &mut dyn ExpenseSink,
    expense: &Expense,
    policy: &RetryPolicy,
) -> Result<AppendOutcome, SinkError> {
    let mut attempt = 0u32;
    loop {
        match sink.append(expense) {
            Err(SinkError::RateLimited) if attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "rate limited, retrying in {:?} (attempt {}/{})",
                    delay,
                    attempt + 1,
                    policy.max_attempts
                );
                thread::sleep(delay);
                attempt += 1;
            }
            other => return other,
        }
    }
}
