// Error taxonomy for the extraction pipeline
//
// Fatal-for-item errors abort one email and the batch moves on. Date,
// vendor and category extraction never surface here: those stages degrade
// to their defaults (current date, "Unknown", default category) instead.

use thiserror::Error;

/// Errors that are fatal for a single email.
#[derive(Debug, Error)]
pub enum ParseError {
    /// No amount pattern matched the email text. A guessed amount is worse
    /// than a dropped record, so there is no default here.
    #[error("no valid amount found in email text")]
    AmountNotFound,

    /// Every rate source failed and the currency is missing from the static
    /// fallback table.
    #[error("no exchange rate available for {from} to {to}")]
    NoRateAvailable { from: String, to: String },

    /// The assembled record violated an Expense invariant.
    #[error("expense validation failed: {0}")]
    InvalidExpense(String),
}
