// 🔁 Batch Runner - fetch, parse, store, mark processed
//
// One email at a time, synchronously. A failing item is reported and the
// batch continues; only fetch failures abort the whole run. A fixed pacing
// sleep between items respects external API rate limits.

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::thread;
use std::time::Duration;

use crate::email::{EmailMessage, EmailSource};
use crate::parser::ExpenseParser;
use crate::sink::{append_with_retry, AppendOutcome, ExpenseSink, RetryPolicy};

/// Per-item outcome reported back to the caller.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub success: bool,
    pub message: String,
    pub error: Option<String>,
}

impl ProcessingResult {
    fn ok(message: String) -> Self {
        ProcessingResult { success: true, message, error: None }
    }

    fn failed(message: String, error: String) -> Self {
        ProcessingResult { success: false, message, error: Some(error) }
    }
}

/// Count (successful, failed) results.
pub fn tally(results: &[ProcessingResult]) -> (usize, usize) {
    let successful = results.iter().filter(|result| result.success).count();
    (successful, results.len() - successful)
}

/// Main application orchestrator: wires the email source, the parser and
/// the persistence sink into one batch workflow.
pub struct ExpenseTracker {
    source: Box<dyn EmailSource>,
    sink: Box<dyn ExpenseSink>,
    parser: ExpenseParser,
    retry: RetryPolicy,
    pacing: Duration,
}

impl ExpenseTracker {
    pub fn new(source: Box<dyn EmailSource>, sink: Box<dyn ExpenseSink>, parser: ExpenseParser) -> Self {
        ExpenseTracker {
            source,
            sink,
            parser,
            retry: RetryPolicy::default(),
            pacing: Duration::from_millis(500),
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Process every unread email: parse, store, mark processed.
    ///
    /// Returns one result per email. Fails only when the email source
    /// itself is unreachable.
    pub fn process_expenses(&mut self) -> Result<Vec<ProcessingResult>> {
        let emails = self.source.fetch_unread().context("Failed to fetch emails")?;
        info!("found {} emails to process", emails.len());

        let mut results = Vec::new();
        for (index, email) in emails.iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                thread::sleep(self.pacing);
            }
            results.push(self.process_one(email));
        }

        let (successful, failed) = tally(&results);
        info!("processing completed: {} successful, {} failed", successful, failed);
        Ok(results)
    }

    fn process_one(&mut self, email: &EmailMessage) -> ProcessingResult {
        if let Err(err) = email.validate() {
            return ProcessingResult::failed(
                format!("Invalid email {}", email.id),
                err.to_string(),
            );
        }

        let expense = match self.parser.parse(&email.body, Some(&email.id)) {
            Ok(expense) => expense,
            Err(err) => {
                error!("failed to parse expense from email {}: {}", email.id, err);
                self.mark_processed(&email.id);
                return ProcessingResult::failed(
                    format!("Failed to parse email {}", email.id),
                    err.to_string(),
                );
            }
        };

        let outcome = match append_with_retry(self.sink.as_mut(), &expense, &self.retry) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("failed to store expense from email {}: {}", email.id, err);
                return ProcessingResult::failed(
                    format!("Failed to store expense from email {}", email.id),
                    err.to_string(),
                );
            }
        };

        self.mark_processed(&email.id);

        match outcome {
            AppendOutcome::Written(row) => ProcessingResult::ok(format!(
                "{} - {} recorded at row {}",
                expense.vendor(),
                expense.display_amount(),
                row
            )),
            AppendOutcome::Duplicate => ProcessingResult::ok(format!(
                "{} - {} already recorded",
                expense.vendor(),
                expense.display_amount()
            )),
        }
    }

    // Unparseable emails are marked too; store failures keep the email
    // unread so the next run retries it.
    fn mark_processed(&mut self, id: &str) {
        if let Err(err) = self.source.mark_processed(id) {
            warn!("failed to mark email {} as processed: {:#}", id, err);
        }
    }
}
