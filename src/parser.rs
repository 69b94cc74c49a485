// 🧩 Expense Assembly - one validated record per notification email
//
// Orchestrates the extractors in a fixed order: amount (fatal on failure),
// date (degrades to today), vendor (degrades to "Unknown"), category
// (degrades to the default), then notes and validation.

use log::{debug, info};
use regex::Regex;

use crate::amounts::{AmountExtractor, ExtractedAmount};
use crate::currency::CurrencyConverter;
use crate::dates::DateExtractor;
use crate::error::ParseError;
use crate::expense::{Expense, ExpenseInput};
use crate::rules::{Classifier, RuleRepository};
use crate::vendor::{VendorExtractor, UNKNOWN_VENDOR};

/// Fixed marker appended to every record's notes.
const RECEIPT_NOTE: &str = "Parsed from email receipt (CR)";

/// Parses expense records from BAC Credomatic notification email text.
pub struct ExpenseParser {
    dates: DateExtractor,
    amounts: AmountExtractor,
    vendor: VendorExtractor,
    classifier: Classifier,
    converter: CurrencyConverter,
    subject: Regex,
}

impl ExpenseParser {
    pub fn new(repo: Box<dyn RuleRepository>, converter: CurrencyConverter) -> Self {
        ExpenseParser {
            dates: DateExtractor::new(),
            amounts: AmountExtractor::new(),
            vendor: VendorExtractor::new(),
            classifier: Classifier::new(repo),
            converter,
            subject: Regex::new(r"(?i)Subject:\s*([^\r\n]+)").expect("invalid subject regex"),
        }
    }

    /// Parse one email body into a validated expense record.
    ///
    /// A missing amount (or an unconvertible currency) is fatal for the
    /// email; missing date, vendor or category degrade to their defaults.
    pub fn parse(&mut self, email_text: &str, email_id: Option<&str>) -> Result<Expense, ParseError> {
        debug!("parsing expense from email {}", email_id.unwrap_or("<unidentified>"));

        let money = self.amounts.extract(email_text, &mut self.converter)?;
        let date = self.dates.extract_date(email_text);
        let vendor = self.vendor.extract(email_text, self.classifier.repository());

        // Unknown vendors are classified from the whole email text instead
        let category = if vendor == UNKNOWN_VENDOR {
            self.classifier.classify(email_text)
        } else {
            self.classifier.classify(&vendor)
        };

        let notes = self.build_notes(email_text, &money);

        let expense = ExpenseInput {
            vendor,
            amount: money.amount,
            currency: money.currency.clone(),
            date,
            category,
            notes,
            email_id: email_id.map(str::to_string),
            original_amount: money.original_amount,
            original_currency: money.original_currency.clone(),
            exchange_rate: money.exchange_rate,
        }
        .build()?;

        info!(
            "parsed expense: {} - {} - {}",
            expense.vendor(),
            expense.display_amount(),
            expense.category()
        );
        Ok(expense)
    }

    /// Notes carry the subject line, the fixed receipt marker and, when a
    /// conversion happened, its provenance.
    fn build_notes(&self, email_text: &str, money: &ExtractedAmount) -> String {
        let mut parts = Vec::new();

        if let Some(captures) = self.subject.captures(email_text) {
            parts.push(format!("Email Subject: {}", captures[1].trim()));
        }

        parts.push(RECEIPT_NOTE.to_string());

        if let (Some(amount), Some(currency), Some(rate)) =
            (money.original_amount, money.original_currency.as_deref(), money.exchange_rate)
        {
            parts.push(format!("Original: {} {} (Rate: {})", amount, currency, rate));
        }

        parts.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::default_fallback_rates;
    use crate::rules::{InMemoryRules, RuleKind, DEFAULT_CATEGORY};
    use chrono::NaiveDate;

    fn fixture_parser() -> ExpenseParser {
        let mut repo = InMemoryRules::new();
        repo.add_keyword("uber eats", "Uber Eats");
        repo.add_keyword("uber", "Uber");
        repo.add_rule(RuleKind::VendorContains, "spotify", "Streaming", 100);
        repo.add_rule(RuleKind::VendorContains, "uber eats", "Food Delivery", 90);
        repo.add_rule(RuleKind::KeywordContains, "parqueo", "Transportation", 40);

        // No live sources: conversions resolve through the static table
        let converter = CurrencyConverter::new(Vec::new(), default_fallback_rates());
        ExpenseParser::new(Box::new(repo), converter)
    }

    #[test]
    fn test_usd_subscription_email() {
        let mut parser = fixture_parser();
        let text = "Subject: Notificacion de transaccion\n\
                    Comercio: SPOTIFY\n\
                    Monto: USD 9.99\n\
                    Fecha: Ago 15, 2025";

        let expense = parser.parse(text, Some("msg-1")).unwrap();

        assert_eq!(expense.vendor(), "SPOTIFY");
        assert_eq!(expense.date(), NaiveDate::from_ymd_opt(2025, 8, 15).unwrap());
        assert_eq!(expense.currency(), "CRC");
        assert!((expense.amount() - 9.99 * 500.0).abs() < 1e-9);
        assert_eq!(expense.original_currency(), Some("USD"));
        assert_eq!(expense.original_amount(), Some(9.99));
        assert_eq!(expense.category(), "Streaming");
        assert_eq!(expense.email_id(), Some("msg-1"));
        assert!(expense.notes().contains("Email Subject: Notificacion de transaccion"));
        assert!(expense.notes().contains("Original: 9.99 USD (Rate: 500)"));
    }

    #[test]
    fn test_base_currency_email_with_keyword_vendor() {
        let mut parser = fixture_parser();
        let text = "Su pago a UBER EATS fue aprobado\nMonto: ₡15,500.50\nFecha: Ago 6, 2025";

        let expense = parser.parse(text, None).unwrap();

        assert_eq!(expense.vendor(), "Uber Eats");
        assert_eq!(expense.amount(), 15500.50);
        assert_eq!(expense.currency(), "CRC");
        assert_eq!(expense.original_currency(), None);
        assert_eq!(expense.exchange_rate(), None);
        assert_eq!(expense.category(), "Food Delivery");
        assert!(!expense.notes().contains("Original:"));
    }

    #[test]
    fn test_missing_amount_is_fatal() {
        let mut parser = fixture_parser();
        let err = parser.parse("Gracias por su compra", Some("msg-2")).unwrap_err();
        assert!(matches!(err, ParseError::AmountNotFound));
    }

    #[test]
    fn test_unknown_vendor_classifies_full_text() {
        let mut parser = fixture_parser();
        let text = "Pago de parqueo municipal\nMonto: ₡1,200.00\nFecha: Ago 6, 2025";

        let expense = parser.parse(text, None).unwrap();

        assert_eq!(expense.vendor(), UNKNOWN_VENDOR);
        assert_eq!(expense.category(), "Transportation");
    }

    #[test]
    fn test_no_rules_matching_defaults_category() {
        let mut parser = fixture_parser();
        let text = "Comercio: FERRETERIA EL COLOCHO\nMonto: ₡8,000.00\nFecha: Ago 6, 2025";

        let expense = parser.parse(text, None).unwrap();

        assert_eq!(expense.vendor(), "FERRETERIA EL COLOCHO");
        assert_eq!(expense.category(), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_missing_date_degrades_to_today() {
        let mut parser = fixture_parser();
        let text = "Comercio: SPOTIFY\nMonto: USD 9.99";

        let expense = parser.parse(text, None).unwrap();

        let today = chrono::Local::now().date_naive();
        assert_eq!(expense.date(), today);
    }
}
