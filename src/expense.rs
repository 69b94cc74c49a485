// 💼 Expense Record - the validated, immutable output of the pipeline
//
// Built once per email by the assembler; every invariant is checked at
// construction and the record is never mutated afterwards. Ownership
// transfers to the persistence sink for storage.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ParseError;

/// Field values for building an [`Expense`].
///
/// Validation happens in [`build`](ExpenseInput::build); nothing else
/// constructs an `Expense`.
#[derive(Debug, Clone)]
pub struct ExpenseInput {
    pub vendor: String,
    pub amount: f64,
    pub currency: String,
    pub date: NaiveDate,
    pub category: String,
    pub notes: String,
    pub email_id: Option<String>,
    pub original_amount: Option<f64>,
    pub original_currency: Option<String>,
    pub exchange_rate: Option<f64>,
}

impl ExpenseInput {
    /// Validate every invariant and produce the immutable record.
    pub fn build(self) -> Result<Expense, ParseError> {
        let mut errors: Vec<&str> = Vec::new();

        if self.vendor.trim().is_empty() {
            errors.push("vendor cannot be empty");
        }
        if self.amount <= 0.0 || !self.amount.is_finite() {
            errors.push("amount must be positive");
        }
        if !is_currency_code(&self.currency) {
            errors.push("currency must be a 3-letter code (e.g. USD, CRC)");
        }
        if self.category.trim().is_empty() {
            errors.push("category cannot be empty");
        }
        if let Some(original) = &self.original_currency {
            if *original == self.currency {
                errors.push("original currency must differ from the stored currency");
            }
        }
        if matches!(self.original_amount, Some(amount) if amount <= 0.0) {
            errors.push("original amount must be positive");
        }
        if matches!(self.exchange_rate, Some(rate) if rate <= 0.0) {
            errors.push("exchange rate must be positive");
        }

        if !errors.is_empty() {
            return Err(ParseError::InvalidExpense(errors.join("; ")));
        }

        Ok(Expense {
            id: uuid::Uuid::new_v4().to_string(),
            vendor: self.vendor,
            amount: self.amount,
            currency: self.currency,
            date: self.date,
            category: self.category,
            notes: self.notes,
            email_id: self.email_id,
            original_amount: self.original_amount,
            original_currency: self.original_currency,
            exchange_rate: self.exchange_rate,
        })
    }
}

fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

/// A parsed expense transaction, normalized to the base currency.
#[derive(Debug, Clone, Serialize)]
pub struct Expense {
    /// Stable record identity.
    id: String,
    vendor: String,
    amount: f64,
    currency: String,
    date: NaiveDate,
    category: String,
    notes: String,
    email_id: Option<String>,
    original_amount: Option<f64>,
    original_currency: Option<String>,
    exchange_rate: Option<f64>,
}

impl Expense {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Canonical YYYY-MM-DD rendering of the date.
    pub fn date_str(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn email_id(&self) -> Option<&str> {
        self.email_id.as_deref()
    }

    pub fn original_amount(&self) -> Option<f64> {
        self.original_amount
    }

    pub fn original_currency(&self) -> Option<&str> {
        self.original_currency.as_deref()
    }

    pub fn exchange_rate(&self) -> Option<f64> {
        self.exchange_rate
    }

    /// Formatted amount for display and logs.
    pub fn display_amount(&self) -> String {
        match self.currency.as_str() {
            "CRC" => format!("₡{}", format_thousands(self.amount)),
            "USD" => format!("${}", format_thousands(self.amount)),
            "EUR" => format!("€{}", format_thousands(self.amount)),
            other => format!("{} {}", format_thousands(self.amount), other),
        }
    }
}

fn format_thousands(amount: f64) -> String {
    let formatted = format!("{:.2}", amount);
    let (int_part, dec_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut with_commas = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (index, ch) in int_part.chars().enumerate() {
        if index > 0 && (int_part.len() - index) % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(ch);
    }

    format!("{}.{}", with_commas, dec_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> ExpenseInput {
        ExpenseInput {
            vendor: "SPOTIFY".to_string(),
            amount: 4995.0,
            currency: "CRC".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 8, 15).unwrap(),
            category: "Streaming".to_string(),
            notes: "Parsed from email receipt (CR)".to_string(),
            email_id: Some("msg-123".to_string()),
            original_amount: Some(9.99),
            original_currency: Some("USD".to_string()),
            exchange_rate: Some(500.0),
        }
    }

    #[test]
    fn test_round_trip_field_access() {
        let expense = valid_input().build().unwrap();

        assert_eq!(expense.vendor(), "SPOTIFY");
        assert_eq!(expense.amount(), 4995.0);
        assert_eq!(expense.currency(), "CRC");
        assert_eq!(expense.date_str(), "2025-08-15");
        assert_eq!(expense.category(), "Streaming");
        assert_eq!(expense.notes(), "Parsed from email receipt (CR)");
        assert_eq!(expense.email_id(), Some("msg-123"));
        assert_eq!(expense.original_amount(), Some(9.99));
        assert_eq!(expense.original_currency(), Some("USD"));
        assert_eq!(expense.exchange_rate(), Some(500.0));
        assert!(!expense.id().is_empty());
    }

    #[test]
    fn test_empty_vendor_rejected() {
        let mut input = valid_input();
        input.vendor = "   ".to_string();
        assert!(matches!(input.build(), Err(ParseError::InvalidExpense(_))));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let mut input = valid_input();
        input.amount = 0.0;
        assert!(input.build().is_err());

        let mut input = valid_input();
        input.amount = -5.0;
        assert!(input.build().is_err());
    }

    #[test]
    fn test_bad_currency_code_rejected() {
        for bad in ["", "CR", "crc", "COLONES"] {
            let mut input = valid_input();
            input.currency = bad.to_string();
            assert!(input.build().is_err(), "currency '{}' should be rejected", bad);
        }
    }

    #[test]
    fn test_empty_category_rejected() {
        let mut input = valid_input();
        input.category = String::new();
        assert!(input.build().is_err());
    }

    #[test]
    fn test_original_currency_must_differ() {
        let mut input = valid_input();
        input.original_currency = Some("CRC".to_string());
        let err = input.build().unwrap_err();
        assert!(err.to_string().contains("original currency"));
    }

    #[test]
    fn test_validation_reports_all_errors() {
        let mut input = valid_input();
        input.vendor = String::new();
        input.amount = -1.0;
        let err = input.build().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("vendor"));
        assert!(message.contains("amount"));
    }

    #[test]
    fn test_display_amount_formats_by_currency() {
        let expense = valid_input().build().unwrap();
        assert_eq!(expense.display_amount(), "₡4,995.00");

        let mut input = valid_input();
        input.currency = "USD".to_string();
        input.original_currency = None;
        input.original_amount = None;
        input.exchange_rate = None;
        input.amount = 1234567.5;
        let expense = input.build().unwrap();
        assert_eq!(expense.display_amount(), "$1,234,567.50");
    }
}
