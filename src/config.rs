// Runtime configuration, loaded from environment variables with defaults
// suitable for a local data/ directory layout.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the batch runner and the admin tool.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite rule database location.
    pub database_path: PathBuf,

    /// Directory scanned for unprocessed notification emails.
    pub inbox_dir: PathBuf,

    /// Directory processed emails are moved into.
    pub processed_dir: PathBuf,

    /// CSV ledger expenses are appended to.
    pub ledger_path: PathBuf,

    /// API key for the keyed rate sources (fixer.io, currencyapi.com).
    /// Sources that need a key report "unavailable" when it is absent.
    pub exchange_rate_api_key: Option<String>,

    /// Pause between processed items, respecting external API rate limits.
    pub rate_limit_delay: Duration,

    /// Per-call timeout for rate-source HTTP requests.
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Unset variables fall back to defaults; malformed numeric values fall
    /// back as well rather than aborting startup.
    pub fn from_env() -> Self {
        Config {
            database_path: path_var("EXPENSEMAIL_DB", "data/expensemail.db"),
            inbox_dir: path_var("EXPENSEMAIL_INBOX", "data/inbox"),
            processed_dir: path_var("EXPENSEMAIL_PROCESSED", "data/processed"),
            ledger_path: path_var("EXPENSEMAIL_LEDGER", "data/ledger.csv"),
            exchange_rate_api_key: env::var("EXCHANGE_RATE_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            rate_limit_delay: secs_var("RATE_LIMIT_DELAY", 0.5),
            http_timeout: secs_var("HTTP_TIMEOUT", 10.0),
        }
    }
}

fn path_var(name: &str, default: &str) -> PathBuf {
    env::var(name).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

fn secs_var(name: &str, default: f64) -> Duration {
    let secs = env::var(name)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|s| *s >= 0.0)
        .unwrap_or(default);
    Duration::from_secs_f64(secs)
}
