// 💰 Amount & Currency Extraction
//
// An ordered table of (pattern, currency hint) pairs, most specific first:
// explicit currency codes, then symbols, then bare labeled amounts. The
// FIRST pattern that matches wins; this is a deliberate precedence order
// reflecting observed BAC email formats, not a general currency parser.
//
// Post-match precedence: a currency symbol inside the captured substring
// overrides the pattern's nominal hint.

use log::debug;
use regex::Regex;

use crate::currency::{CurrencyConverter, BASE_CURRENCY};
use crate::error::ParseError;

/// Digit run with optional `,`/`.` separators ("5,650.00", "5650,00", "9").
const NUM: &str = r"(?:\d[\d.,]*\d|\d)";

/// Nominal currency carried by each pattern. `Unknown` resolves to the
/// base currency unless a symbol in the capture says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurrencyHint {
    Crc,
    Usd,
    Eur,
    Unknown,
}

/// A raw match before any conversion: the amount and its detected currency.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAmount {
    pub amount: f64,
    pub currency: String,
}

/// The assembled monetary result, normalized to the base currency. The
/// original_* fields are set only when a conversion actually happened.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedAmount {
    pub amount: f64,
    pub currency: String,
    pub original_amount: Option<f64>,
    pub original_currency: Option<String>,
    pub exchange_rate: Option<f64>,
}

/// Finds monetary amounts in notification email text.
pub struct AmountExtractor {
    patterns: Vec<(Regex, CurrencyHint)>,
}

impl AmountExtractor {
    pub fn new() -> Self {
        let table: [(String, CurrencyHint); 8] = [
            // "CRC 1,650.97" - BAC's own statement lines
            (format!(r"(?i)CRC\s+({NUM})"), CurrencyHint::Crc),
            // "Monto: USD 9.99"
            (format!(r"(?i)(?:Monto|Total):\s*USD\s+({NUM})"), CurrencyHint::Usd),
            // "USD 25.50"
            (format!(r"(?i)USD\s+({NUM})"), CurrencyHint::Usd),
            // "$19.99"
            (format!(r"\$\s*({NUM})"), CurrencyHint::Usd),
            // "€45.99"
            (format!(r"€\s*({NUM})"), CurrencyHint::Eur),
            // "₡15,500.50"
            (format!(r"₡\s*({NUM})"), CurrencyHint::Crc),
            // "25.50 USD"
            (format!(r"(?i)({NUM})\s+USD\b"), CurrencyHint::Usd),
            // "Monto: 5000.00" - label with no currency marker at all
            (format!(r"(?i)(?:Monto|Total):\s*([₡$€]?\s*{NUM})"), CurrencyHint::Unknown),
        ];

        let patterns = table
            .iter()
            .map(|(pattern, hint)| {
                (Regex::new(pattern).expect("invalid amount pattern"), *hint)
            })
            .collect();

        AmountExtractor { patterns }
    }

    /// Find the amount and its detected currency, before any conversion.
    pub fn extract_raw(&self, text: &str) -> Result<RawAmount, ParseError> {
        for (index, (matcher, hint)) in self.patterns.iter().enumerate() {
            if let Some(captures) = matcher.captures(text) {
                let raw = captures[1].trim();
                debug!("amount pattern {} matched '{}' (hint {:?})", index + 1, raw, hint);

                // A capture that fails to parse does not block later patterns
                match resolve_capture(raw, *hint) {
                    Some(found) => {
                        debug!("parsed amount: {} {}", found.amount, found.currency);
                        return Ok(found);
                    }
                    None => debug!("failed to parse amount '{}'", raw),
                }
            }
        }

        Err(ParseError::AmountNotFound)
    }

    /// Find the amount and normalize it to the base currency, delegating to
    /// the converter for foreign currencies. Conversion provenance is kept
    /// in the original_* fields.
    pub fn extract(
        &self,
        text: &str,
        converter: &mut CurrencyConverter,
    ) -> Result<ExtractedAmount, ParseError> {
        let raw = self.extract_raw(text)?;

        if raw.currency == BASE_CURRENCY {
            return Ok(ExtractedAmount {
                amount: raw.amount,
                currency: BASE_CURRENCY.to_string(),
                original_amount: None,
                original_currency: None,
                exchange_rate: None,
            });
        }

        let (converted, rate) = converter.convert(raw.amount, &raw.currency)?;
        Ok(ExtractedAmount {
            amount: converted,
            currency: BASE_CURRENCY.to_string(),
            original_amount: Some(raw.amount),
            original_currency: Some(raw.currency),
            exchange_rate: Some(rate),
        })
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn one captured substring into an amount and currency.
///
/// Precedence: symbol in the capture > pattern hint > base currency.
fn resolve_capture(captured: &str, hint: CurrencyHint) -> Option<RawAmount> {
    let currency = match symbol_currency(captured) {
        Some(code) => code,
        None => match hint {
            CurrencyHint::Crc => "CRC",
            CurrencyHint::Usd => "USD",
            CurrencyHint::Eur => "EUR",
            CurrencyHint::Unknown => BASE_CURRENCY,
        },
    };

    let stripped = captured.replace(['₡', '$', '€'], " ");
    let normalized = normalize_separators(stripped.trim());
    let amount = normalized.parse::<f64>().ok()?;

    Some(RawAmount { amount, currency: currency.to_string() })
}

fn symbol_currency(captured: &str) -> Option<&'static str> {
    if captured.contains('₡') {
        Some("CRC")
    } else if captured.contains('$') {
        Some("USD")
    } else if captured.contains('€') {
        Some("EUR")
    } else {
        None
    }
}

/// Disambiguate thousands vs. decimal separators.
///
/// Both `,` and `.` present: comma is a thousands separator. Only `,`:
/// a comma followed by exactly two digits is a decimal comma, anything
/// else is a thousands separator.
fn normalize_separators(raw: &str) -> String {
    let has_comma = raw.contains(',');
    let has_dot = raw.contains('.');

    if has_comma && has_dot {
        raw.replace(',', "")
    } else if has_comma {
        let after_first_comma = raw.splitn(2, ',').nth(1).unwrap_or("");
        if after_first_comma.len() == 2 {
            raw.replace(',', ".")
        } else {
            raw.replace(',', "")
        }
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::default_fallback_rates;
    use std::collections::HashMap;

    fn extractor() -> AmountExtractor {
        AmountExtractor::new()
    }

    // Offline converter: no live sources, static table only
    fn offline_converter() -> CurrencyConverter {
        CurrencyConverter::new(Vec::new(), default_fallback_rates())
    }

    #[test]
    fn test_us_format_thousands_and_decimal() {
        let raw = extractor().extract_raw("Monto: 5,650.00").unwrap();
        assert_eq!(raw.amount, 5650.00);
        assert_eq!(raw.currency, "CRC");
    }

    #[test]
    fn test_european_decimal_comma() {
        let raw = extractor().extract_raw("Monto: 5650,00").unwrap();
        assert_eq!(raw.amount, 5650.00);
    }

    #[test]
    fn test_thousands_comma_without_decimal() {
        let raw = extractor().extract_raw("Monto: 5,650").unwrap();
        assert_eq!(raw.amount, 5650.0);
    }

    #[test]
    fn test_crc_code_pattern_has_top_priority() {
        let raw = extractor()
            .extract_raw("CRC 1,650.97 cargado; equivalente USD 3.25")
            .unwrap();
        assert_eq!(raw.amount, 1650.97);
        assert_eq!(raw.currency, "CRC");
    }

    #[test]
    fn test_labeled_usd_amount() {
        let raw = extractor().extract_raw("Monto: USD 9.99").unwrap();
        assert_eq!(raw.amount, 9.99);
        assert_eq!(raw.currency, "USD");
    }

    #[test]
    fn test_dollar_symbol_assumes_usd() {
        let raw = extractor().extract_raw("Pago de $19.99 aplicado").unwrap();
        assert_eq!(raw.amount, 19.99);
        assert_eq!(raw.currency, "USD");
    }

    #[test]
    fn test_euro_symbol() {
        let raw = extractor().extract_raw("Total €45.99").unwrap();
        assert_eq!(raw.amount, 45.99);
        assert_eq!(raw.currency, "EUR");
    }

    #[test]
    fn test_colon_symbol_is_base_currency() {
        let raw = extractor().extract_raw("₡15,500.50").unwrap();
        assert_eq!(raw.amount, 15500.50);
        assert_eq!(raw.currency, "CRC");
    }

    #[test]
    fn test_trailing_currency_code() {
        let raw = extractor().extract_raw("se cargaron 25.50 USD a su tarjeta").unwrap();
        assert_eq!(raw.amount, 25.50);
        assert_eq!(raw.currency, "USD");
    }

    #[test]
    fn test_bare_labeled_amount_defaults_to_base_currency() {
        let raw = extractor().extract_raw("Total: 5000.00").unwrap();
        assert_eq!(raw.amount, 5000.00);
        assert_eq!(raw.currency, "CRC");
    }

    #[test]
    fn test_symbol_in_capture_overrides_pattern_hint() {
        let found = resolve_capture("₡5,000.00", CurrencyHint::Usd).unwrap();
        assert_eq!(found.currency, "CRC");
        assert_eq!(found.amount, 5000.00);

        let found = resolve_capture("$9.99", CurrencyHint::Unknown).unwrap();
        assert_eq!(found.currency, "USD");
    }

    #[test]
    fn test_no_amount_is_fatal() {
        let err = extractor().extract_raw("Gracias por su compra").unwrap_err();
        assert!(matches!(err, ParseError::AmountNotFound));
    }

    #[test]
    fn test_extract_converts_foreign_currency_with_provenance() {
        let mut converter = offline_converter();
        let result = extractor().extract("Monto: USD 9.99", &mut converter).unwrap();

        assert_eq!(result.currency, "CRC");
        assert!((result.amount - 9.99 * 500.0).abs() < 1e-9);
        assert_eq!(result.original_amount, Some(9.99));
        assert_eq!(result.original_currency, Some("USD".to_string()));
        assert_eq!(result.exchange_rate, Some(500.0));
    }

    #[test]
    fn test_extract_base_currency_sets_no_provenance() {
        let mut converter = offline_converter();
        let result = extractor().extract("₡15,500.50", &mut converter).unwrap();

        assert_eq!(result.amount, 15500.50);
        assert_eq!(result.currency, "CRC");
        assert_eq!(result.original_amount, None);
        assert_eq!(result.original_currency, None);
        assert_eq!(result.exchange_rate, None);
    }

    #[test]
    fn test_unconvertible_currency_aborts() {
        // EUR amount but the fallback table is empty and no sources exist
        let mut converter = CurrencyConverter::new(Vec::new(), HashMap::new());
        let err = extractor().extract("€45.99", &mut converter).unwrap_err();
        assert!(matches!(err, ParseError::NoRateAvailable { .. }));
    }

    #[test]
    fn test_separator_normalization_table() {
        assert_eq!(normalize_separators("5,650.00"), "5650.00");
        assert_eq!(normalize_separators("5650,00"), "5650.00");
        assert_eq!(normalize_separators("5,650"), "5650");
        assert_eq!(normalize_separators("1,234,567.89"), "1234567.89");
        assert_eq!(normalize_separators("9.99"), "9.99");
        assert_eq!(normalize_separators("5000"), "5000");
    }
}
