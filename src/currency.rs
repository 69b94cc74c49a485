// 💱 Currency Conversion - prioritized rate sources with static fallbacks
//
// Network calls are expensive and unreliable for a per-email batch job, so
// live rates are cached for an hour and every failure falls through: next
// source, then the static table. Only a currency missing from the fallback
// table is an error.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::ParseError;

/// All stored amounts are normalized to Costa Rican colones.
pub const BASE_CURRENCY: &str = "CRC";

// ============================================================================
// RATE SOURCES
// ============================================================================

/// An external exchange-rate provider.
///
/// `Ok(None)` means the source is reachable but has no rate to offer (e.g.
/// a keyed API without a configured key); errors and `None` are treated the
/// same by the converter: try the next source.
pub trait RateSource {
    fn name(&self) -> &'static str;

    fn fetch_rate(&self, from: &str, to: &str) -> Result<Option<f64>>;
}

/// exchangerate-api.com - keyless, rates keyed by target currency.
pub struct ExchangeRateApi {
    client: Client,
}

#[derive(Deserialize)]
struct ExchangeRateApiResponse {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

impl ExchangeRateApi {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(ExchangeRateApi {
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

impl RateSource for ExchangeRateApi {
    fn name(&self) -> &'static str {
        "exchangerate-api"
    }

    fn fetch_rate(&self, from: &str, to: &str) -> Result<Option<f64>> {
        let url = format!("https://api.exchangerate-api.com/v4/latest/{}", from);
        let response = self.client.get(&url).send()?.error_for_status()?;
        let body: ExchangeRateApiResponse = response.json()?;
        Ok(body.rates.get(to).copied())
    }
}

/// fixer.io - requires an API key; reports success in the body.
pub struct FixerApi {
    client: Client,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct FixerResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

impl FixerApi {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(FixerApi {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
        })
    }
}

impl RateSource for FixerApi {
    fn name(&self) -> &'static str {
        "fixer.io"
    }

    fn fetch_rate(&self, from: &str, to: &str) -> Result<Option<f64>> {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => return Ok(None),
        };

        let response = self
            .client
            .get("http://data.fixer.io/api/latest")
            .query(&[("access_key", api_key.as_str()), ("base", from), ("symbols", to)])
            .send()?
            .error_for_status()?;

        let body: FixerResponse = response.json()?;
        if !body.success {
            return Ok(None);
        }
        Ok(body.rates.get(to).copied())
    }
}

/// currencyapi.com - requires an API key; nests the rate one level deeper.
pub struct CurrencyApi {
    client: Client,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct CurrencyApiResponse {
    #[serde(default)]
    data: HashMap<String, CurrencyApiQuote>,
}

#[derive(Deserialize)]
struct CurrencyApiQuote {
    value: f64,
}

impl CurrencyApi {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(CurrencyApi {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
        })
    }
}

impl RateSource for CurrencyApi {
    fn name(&self) -> &'static str {
        "currencyapi"
    }

    fn fetch_rate(&self, from: &str, to: &str) -> Result<Option<f64>> {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => return Ok(None),
        };

        let response = self
            .client
            .get("https://api.currencyapi.com/v3/latest")
            .query(&[("apikey", api_key.as_str()), ("base_currency", from), ("currencies", to)])
            .send()?
            .error_for_status()?;

        let body: CurrencyApiResponse = response.json()?;
        Ok(body.data.get(to).map(|quote| quote.value))
    }
}

// ============================================================================
// CONVERTER
// ============================================================================

struct CachedRate {
    rate: f64,
    fetched_at: DateTime<Utc>,
}

/// Converts foreign amounts to the base currency.
///
/// Rates are looked up through a priority-ordered source chain with a
/// process-local cache keyed by (from, to, calendar day); entries also
/// expire after one hour of wall-clock time. The cache does not survive
/// process restart and needs no synchronization (single-threaded batch).
pub struct CurrencyConverter {
    sources: Vec<Box<dyn RateSource>>,
    fallback_rates: HashMap<String, f64>,
    cache: HashMap<(String, String, NaiveDate), CachedRate>,
    cache_ttl: chrono::Duration,
}

impl CurrencyConverter {
    pub fn new(sources: Vec<Box<dyn RateSource>>, fallback_rates: HashMap<String, f64>) -> Self {
        CurrencyConverter {
            sources,
            fallback_rates,
            cache: HashMap::new(),
            cache_ttl: chrono::Duration::hours(1),
        }
    }

    /// Converter wired to the three production rate sources.
    pub fn with_default_sources(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let sources: Vec<Box<dyn RateSource>> = vec![
            Box::new(ExchangeRateApi::new(timeout)?),
            Box::new(FixerApi::new(api_key.clone(), timeout)?),
            Box::new(CurrencyApi::new(api_key, timeout)?),
        ];
        Ok(CurrencyConverter::new(sources, default_fallback_rates()))
    }

    /// Convert an amount to the base currency, returning the converted
    /// amount and the rate applied. The base currency itself is the
    /// identity conversion with rate exactly 1.0 and no lookup.
    pub fn convert(&mut self, amount: f64, from: &str) -> Result<(f64, f64), ParseError> {
        if from == BASE_CURRENCY {
            return Ok((amount, 1.0));
        }

        let rate = self.exchange_rate(from, BASE_CURRENCY)?;
        let converted = amount * rate;
        info!(
            "converted {} {} to {:.2} {} (rate: {})",
            amount, from, converted, BASE_CURRENCY, rate
        );
        Ok((converted, rate))
    }

    /// Look up an exchange rate: cache, then sources in order, then the
    /// static fallback table.
    pub fn exchange_rate(&mut self, from: &str, to: &str) -> Result<f64, ParseError> {
        let key = (from.to_string(), to.to_string(), Utc::now().date_naive());

        if let Some(cached) = self.cache.get(&key) {
            // Same-day hits are still checked against wall-clock freshness
            if Utc::now() - cached.fetched_at < self.cache_ttl {
                debug!("using cached exchange rate for {} to {}", from, to);
                return Ok(cached.rate);
            }
        }

        for source in &self.sources {
            match source.fetch_rate(from, to) {
                Ok(Some(rate)) => {
                    debug!("got rate from {}: {} to {} = {}", source.name(), from, to, rate);
                    self.cache.insert(key, CachedRate { rate, fetched_at: Utc::now() });
                    return Ok(rate);
                }
                Ok(None) => {
                    debug!("rate source {} has no rate for {} to {}", source.name(), from, to);
                }
                Err(err) => {
                    debug!("rate source {} failed: {:#}", source.name(), err);
                }
            }
        }

        if let Some(rate) = self.fallback_rates.get(from) {
            warn!("all rate sources failed, using fallback rate for {}: {}", from, rate);
            return Ok(*rate);
        }

        Err(ParseError::NoRateAvailable {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        info!("exchange rate cache cleared");
    }
}

/// Approximate rates to CRC, used when every live source fails.
pub fn default_fallback_rates() -> HashMap<String, f64> {
    HashMap::from([
        ("USD".to_string(), 500.0),
        ("EUR".to_string(), 550.0),
        ("GBP".to_string(), 650.0),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct FixedRate {
        rate: f64,
        calls: Rc<Cell<u32>>,
    }

    impl FixedRate {
        fn new(rate: f64) -> Self {
            FixedRate { rate, calls: Rc::new(Cell::new(0)) }
        }

        fn counted(rate: f64, calls: Rc<Cell<u32>>) -> Self {
            FixedRate { rate, calls }
        }
    }

    impl RateSource for FixedRate {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn fetch_rate(&self, _from: &str, _to: &str) -> Result<Option<f64>> {
            self.calls.set(self.calls.get() + 1);
            Ok(Some(self.rate))
        }
    }

    struct Unavailable;

    impl RateSource for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        fn fetch_rate(&self, _from: &str, _to: &str) -> Result<Option<f64>> {
            Ok(None)
        }
    }

    struct Broken;

    impl RateSource for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn fetch_rate(&self, _from: &str, _to: &str) -> Result<Option<f64>> {
            anyhow::bail!("transport error")
        }
    }

    #[test]
    fn test_base_currency_is_identity_with_rate_one() {
        let mut converter = CurrencyConverter::new(Vec::new(), HashMap::new());
        let (amount, rate) = converter.convert(1234.56, "CRC").unwrap();
        assert_eq!(amount, 1234.56);
        assert_eq!(rate, 1.0);
    }

    #[test]
    fn test_first_source_wins() {
        let sources: Vec<Box<dyn RateSource>> =
            vec![Box::new(FixedRate::new(510.0)), Box::new(FixedRate::new(999.0))];
        let mut converter = CurrencyConverter::new(sources, HashMap::new());
        assert_eq!(converter.exchange_rate("USD", "CRC").unwrap(), 510.0);
    }

    #[test]
    fn test_failing_sources_are_skipped() {
        let sources: Vec<Box<dyn RateSource>> = vec![
            Box::new(Broken),
            Box::new(Unavailable),
            Box::new(FixedRate::new(520.0)),
        ];
        let mut converter = CurrencyConverter::new(sources, HashMap::new());
        assert_eq!(converter.exchange_rate("USD", "CRC").unwrap(), 520.0);
    }

    #[test]
    fn test_all_sources_fail_falls_back_to_static_table() {
        let sources: Vec<Box<dyn RateSource>> =
            vec![Box::new(Broken), Box::new(Broken), Box::new(Unavailable)];
        let mut converter = CurrencyConverter::new(sources, default_fallback_rates());
        assert_eq!(converter.exchange_rate("EUR", "CRC").unwrap(), 550.0);
    }

    #[test]
    fn test_unknown_currency_with_no_fallback_is_an_error() {
        let mut converter = CurrencyConverter::new(vec![Box::new(Broken)], HashMap::new());
        let err = converter.exchange_rate("XXX", "CRC").unwrap_err();
        assert!(matches!(err, ParseError::NoRateAvailable { .. }));
    }

    #[test]
    fn test_convert_applies_rate() {
        let sources: Vec<Box<dyn RateSource>> = vec![Box::new(FixedRate::new(500.0))];
        let mut converter = CurrencyConverter::new(sources, HashMap::new());
        let (amount, rate) = converter.convert(9.99, "USD").unwrap();
        assert!((amount - 4995.0).abs() < 1e-9);
        assert_eq!(rate, 500.0);
    }

    #[test]
    fn test_fresh_cache_hit_skips_the_source() {
        let calls = Rc::new(Cell::new(0));
        let source = Box::new(FixedRate::counted(500.0, Rc::clone(&calls)));
        let mut converter = CurrencyConverter::new(vec![source], HashMap::new());

        assert_eq!(converter.exchange_rate("USD", "CRC").unwrap(), 500.0);
        assert_eq!(converter.exchange_rate("USD", "CRC").unwrap(), 500.0);

        // Second lookup must come from the cache
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_clear_cache_forces_refetch() {
        let calls = Rc::new(Cell::new(0));
        let source = Box::new(FixedRate::counted(500.0, Rc::clone(&calls)));
        let mut converter = CurrencyConverter::new(vec![source], HashMap::new());

        converter.exchange_rate("USD", "CRC").unwrap();
        converter.clear_cache();
        converter.exchange_rate("USD", "CRC").unwrap();

        assert_eq!(calls.get(), 2);
    }
}
