use anyhow::Result;
use std::env;

use expensemail::{
    tally, Config, CsvLedger, CurrencyConverter, ExpenseParser, ExpenseTracker, MailDirSource,
    RuleStore,
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = Config::from_env();

    if args.len() > 1 && args[1] == "status" {
        run_status(&config)
    } else {
        run_batch(&config)
    }
}

fn run_batch(config: &Config) -> Result<()> {
    println!("📬 Expensemail - processing bank notifications");

    // Rule store unreachable here is batch-fatal
    let store = RuleStore::open(&config.database_path)?;
    if store.is_empty()? {
        println!("🔧 Empty rule database, installing defaults...");
        store.seed_defaults()?;
    }

    let source = MailDirSource::open(&config.inbox_dir, &config.processed_dir)?;
    let ledger = CsvLedger::open(&config.ledger_path)?;
    let converter = CurrencyConverter::with_default_sources(
        config.exchange_rate_api_key.clone(),
        config.http_timeout,
    )?;
    let parser = ExpenseParser::new(Box::new(store), converter);

    let mut tracker = ExpenseTracker::new(Box::new(source), Box::new(ledger), parser)
        .with_pacing(config.rate_limit_delay);

    let results = tracker.process_expenses()?;
    let (successful, failed) = tally(&results);

    println!("✓ Processing completed: {} successful, {} failed", successful, failed);
    for (index, result) in results.iter().enumerate() {
        let mark = if result.success { "✓" } else { "✗" };
        println!("  {}. {} {}", index + 1, mark, result.message);
        if let Some(error) = &result.error {
            println!("     Error: {}", error);
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_status(config: &Config) -> Result<()> {
    let store = RuleStore::open(&config.database_path)?;
    println!(
        "📈 Rule store: {} vendors, {} categories, {} active rules",
        store.vendor_count()?,
        store.category_count()?,
        store.get_all_category_rules()?.len()
    );

    if config.ledger_path.exists() {
        let ledger = CsvLedger::open(&config.ledger_path)?;
        println!("📊 Ledger: {} rows at {:?}", ledger.row_count(), config.ledger_path);
    } else {
        println!("📊 Ledger: not created yet ({:?})", config.ledger_path);
    }

    Ok(())
}
