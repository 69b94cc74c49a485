// Expensemail - Core Library
// Extracts structured expense records from bank-notification emails,
// normalizes currency and dates, classifies spending categories and
// appends the results to a CSV ledger.

pub mod amounts;
pub mod config;
pub mod currency;
pub mod dates;
pub mod db;
pub mod email;
pub mod error;
pub mod expense;
pub mod parser;
pub mod rules;
pub mod runner;
pub mod sink;
pub mod vendor;

// Re-export commonly used types
pub use amounts::{AmountExtractor, ExtractedAmount, RawAmount};
pub use config::Config;
pub use currency::{
    default_fallback_rates, CurrencyApi, CurrencyConverter, ExchangeRateApi, FixerApi, RateSource,
    BASE_CURRENCY,
};
pub use dates::{is_canonical_date, DateExtractor};
pub use db::{RuleStore, VendorKeyword};
pub use email::{EmailMessage, EmailSource, MailDirSource};
pub use error::ParseError;
pub use expense::{Expense, ExpenseInput};
pub use parser::ExpenseParser;
pub use rules::{
    categorize, CategoryRule, Classifier, InMemoryRules, RuleKind, RuleRepository,
    DEFAULT_CATEGORY,
};
pub use runner::{tally, ExpenseTracker, ProcessingResult};
pub use sink::{
    append_with_retry, expense_fingerprint, AppendOutcome, CsvLedger, ExpenseSink, RetryPolicy,
    SinkError,
};
pub use vendor::{VendorExtractor, UNKNOWN_VENDOR};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
