// 📅 Date Extraction - free text to canonical YYYY-MM-DD
//
// Handles the labeled BAC "Fecha:" field, ISO dates, numeric day-first
// dates and written-out month names, in Spanish or English. Patterns are
// tried in a fixed priority order; the first one whose capture parses wins.

use chrono::{Local, NaiveDate};
use log::{debug, warn};
use regex::Regex;

/// One entry in the priority-ordered pattern table: a matcher paired with
/// the chrono format its capture must parse under.
struct DatePattern {
    matcher: Regex,
    format: &'static str,
}

/// Spanish month names and abbreviations, rewritten to English 3-letter
/// forms before parsing. Abbreviations use word boundaries so "mar" never
/// touches "martes" or "marca".
const SPANISH_MONTHS: [(&str, &str); 24] = [
    ("enero", "Jan"),
    ("febrero", "Feb"),
    ("marzo", "Mar"),
    ("abril", "Apr"),
    ("mayo", "May"),
    ("junio", "Jun"),
    ("julio", "Jul"),
    ("agosto", "Aug"),
    ("septiembre", "Sep"),
    ("octubre", "Oct"),
    ("noviembre", "Nov"),
    ("diciembre", "Dec"),
    ("ene", "Jan"),
    ("feb", "Feb"),
    ("mar", "Mar"),
    ("abr", "Apr"),
    ("may", "May"),
    ("jun", "Jun"),
    ("jul", "Jul"),
    ("ago", "Aug"),
    ("sep", "Sep"),
    ("oct", "Oct"),
    ("nov", "Nov"),
    ("dic", "Dec"),
];

/// Extracts calendar dates from notification email text.
pub struct DateExtractor {
    patterns: Vec<DatePattern>,
    month_subs: Vec<(Regex, &'static str)>,
    time_suffix: Regex,
}

impl DateExtractor {
    pub fn new() -> Self {
        let table: [(&str, &str); 6] = [
            // BAC labeled field: "Fecha: Ago 6, 2025" (optionally ", 14:29")
            (
                r"(?i)Fecha:\s*([A-Za-z]{3,}\s+\d{1,2},\s+\d{4}(?:,\s*\d{1,2}:\d{2})?)",
                "%b %d, %Y",
            ),
            // ISO format: "2025-08-06"
            (r"(\d{4}-\d{2}-\d{2})", "%Y-%m-%d"),
            // DD/MM/YYYY
            (r"(\d{1,2}/\d{1,2}/\d{4})", "%d/%m/%Y"),
            // DD-MM-YYYY
            (r"(\d{1,2}-\d{1,2}-\d{4})", "%d-%m-%Y"),
            // Month DD, YYYY
            (r"(?i)([A-Za-z]{3,}\s+\d{1,2},\s+\d{4})", "%B %d, %Y"),
            // DD Month YYYY
            (r"(?i)(\d{1,2}\s+[A-Za-z]{3,}\s+\d{4})", "%d %B %Y"),
        ];

        let patterns = table
            .iter()
            .map(|&(pattern, format)| DatePattern {
                matcher: Regex::new(pattern).expect("invalid date pattern"),
                format,
            })
            .collect();

        let month_subs = SPANISH_MONTHS
            .iter()
            .map(|(spanish, english)| {
                let boundary = format!(r"(?i)\b{}\b", spanish);
                (Regex::new(&boundary).expect("invalid month regex"), *english)
            })
            .collect();

        DateExtractor {
            patterns,
            month_subs,
            time_suffix: Regex::new(r",\s*\d{1,2}:\d{2}\s*$").expect("invalid time suffix regex"),
        }
    }

    /// Extract a date from email text, falling back to today when nothing
    /// matches. The fallback is a loggable degraded mode, not an error.
    pub fn extract_date(&self, text: &str) -> NaiveDate {
        for entry in &self.patterns {
            for capture in entry.matcher.captures_iter(text) {
                let raw = capture[1].trim();
                match self.parse_candidate(raw, entry.format) {
                    Some(date) => {
                        debug!("date pattern matched '{}' -> {}", raw, date);
                        return date;
                    }
                    // A capture that fails its paired format is a non-match;
                    // keep trying the remaining captures and patterns.
                    None => debug!("date candidate '{}' failed format '{}'", raw, entry.format),
                }
            }
        }

        let today = Local::now().date_naive();
        warn!("no date patterns matched, using current date {}", today);
        today
    }

    /// Same as [`extract_date`](Self::extract_date), rendered canonically.
    pub fn extract(&self, text: &str) -> String {
        self.extract_date(text).format("%Y-%m-%d").to_string()
    }

    fn parse_candidate(&self, raw: &str, format: &str) -> Option<NaiveDate> {
        // Labeled matches may carry a ", HH:MM" time suffix; strip it first
        let without_time = self.time_suffix.replace(raw, "");
        let cleaned = self.anglicize_months(without_time.trim());
        NaiveDate::parse_from_str(&cleaned, format).ok()
    }

    /// Rewrite Spanish month names/abbreviations to English 3-letter forms.
    fn anglicize_months(&self, date_str: &str) -> String {
        let mut result = date_str.to_string();
        for (matcher, english) in &self.month_subs {
            if matcher.is_match(&result) {
                result = matcher.replace_all(&result, *english).into_owned();
            }
        }
        result
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Check that a string has exactly the canonical YYYY-MM-DD shape.
pub fn is_canonical_date(date_str: &str) -> bool {
    if date_str.len() != 10 {
        return false;
    }
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeled_bac_date_with_spanish_abbreviation() {
        let extractor = DateExtractor::new();
        assert_eq!(extractor.extract("Fecha: Ago 6, 2025"), "2025-08-06");
    }

    #[test]
    fn test_labeled_date_strips_time_suffix() {
        let extractor = DateExtractor::new();
        assert_eq!(extractor.extract("Fecha: Jul 31, 2025, 14:29"), "2025-07-31");
    }

    #[test]
    fn test_iso_date_passthrough_is_idempotent() {
        let extractor = DateExtractor::new();
        let canonical = "2025-08-06";
        assert_eq!(extractor.extract(canonical), canonical);
    }

    #[test]
    fn test_day_first_slash_format() {
        let extractor = DateExtractor::new();
        assert_eq!(extractor.extract("Pago recibido el 06/08/2025."), "2025-08-06");
    }

    #[test]
    fn test_day_first_dash_format() {
        let extractor = DateExtractor::new();
        assert_eq!(extractor.extract("vence 15-09-2025"), "2025-09-15");
    }

    #[test]
    fn test_full_spanish_month_name() {
        let extractor = DateExtractor::new();
        assert_eq!(extractor.extract("Agosto 15, 2025"), "2025-08-15");
    }

    #[test]
    fn test_day_month_year_spanish() {
        let extractor = DateExtractor::new();
        assert_eq!(extractor.extract("el 6 agosto 2025"), "2025-08-06");
    }

    #[test]
    fn test_labeled_field_wins_over_later_iso_date() {
        let extractor = DateExtractor::new();
        let text = "Fecha: Ene 2, 2025\nGenerado: 2025-08-06";
        assert_eq!(extractor.extract(text), "2025-01-02");
    }

    #[test]
    fn test_unparseable_match_does_not_block_next_pattern() {
        let extractor = DateExtractor::new();
        // "99/99/2025" matches the slash pattern but cannot parse; the
        // dash date later in the text must still be found.
        let text = "ref 99/99/2025 emitido 06-08-2025";
        assert_eq!(extractor.extract(text), "2025-08-06");
    }

    #[test]
    fn test_no_date_falls_back_to_today() {
        let extractor = DateExtractor::new();
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(extractor.extract("sin fecha alguna"), today);
    }

    #[test]
    fn test_month_boundary_substitution_is_safe() {
        let extractor = DateExtractor::new();
        // "mar" inside "martes" must not be rewritten
        assert_eq!(extractor.anglicize_months("martes mar 4"), "martes Mar 4");
    }

    #[test]
    fn test_is_canonical_date() {
        assert!(is_canonical_date("2025-08-06"));
        assert!(!is_canonical_date("2025-8-6"));
        assert!(!is_canonical_date("06/08/2025"));
        assert!(!is_canonical_date("2025-13-01"));
        assert!(!is_canonical_date(""));
    }
}
