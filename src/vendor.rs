// 🏪 Vendor Extraction - merchant name from the labeled field or keywords
//
// BAC notifications carry a "Comercio:" field; when it is present that
// value wins. Otherwise the vendor-keyword table is scanned, longest
// keyword first. The result is never empty: "Unknown" is the sentinel.

use log::{debug, warn};
use regex::Regex;

use crate::rules::RuleRepository;

/// Sentinel vendor when neither strategy matches.
pub const UNKNOWN_VENDOR: &str = "Unknown";

/// Extracts the merchant display name from notification email text.
pub struct VendorExtractor {
    comercio: Regex,
    label_cut: Regex,
    trailing_symbol_amount: Regex,
    trailing_code_amount: Regex,
    whitespace: Regex,
}

impl VendorExtractor {
    pub fn new() -> Self {
        VendorExtractor {
            comercio: Regex::new(r"(?i)Comercio:\s*([^\r\n]+)")
                .expect("invalid comercio regex"),
            // Another labeled field on the same line ends the vendor value
            label_cut: Regex::new(r"(?i)\b(?:Monto|Total|Fecha):")
                .expect("invalid label cut regex"),
            // Trailing "₡5,650.00", "$9.99 USD" etc. leaked into the field
            trailing_symbol_amount: Regex::new(
                r"(?i)\s*[$₡€]?\s*\d{1,3}(?:,\d{3})*(?:\.\d{2})?\s*(?:USD|EUR|CRC)?\s*$",
            )
            .expect("invalid trailing amount regex"),
            trailing_code_amount: Regex::new(
                r"(?i)\s*(?:USD|EUR|CRC)\s+\d{1,3}(?:,\d{3})*(?:\.\d{2})?\s*$",
            )
            .expect("invalid trailing code amount regex"),
            whitespace: Regex::new(r"\s+").expect("invalid whitespace regex"),
        }
    }

    /// Extract a vendor name, falling back to the keyword table and then
    /// to the "Unknown" sentinel. Never returns an empty string.
    pub fn extract(&self, text: &str, repo: &dyn RuleRepository) -> String {
        if let Some(captures) = self.comercio.captures(text) {
            let cleaned = self.clean_label_value(&captures[1]);
            if !cleaned.is_empty() {
                debug!("found vendor in Comercio field: '{}'", cleaned);
                return cleaned;
            }
        }

        match repo.find_vendor_by_text(text) {
            Ok(Some(vendor)) => {
                debug!("found vendor via keyword table: '{}'", vendor);
                vendor
            }
            Ok(None) => {
                debug!("no vendor keywords matched");
                UNKNOWN_VENDOR.to_string()
            }
            Err(err) => {
                warn!("vendor keyword lookup failed: {:#}", err);
                UNKNOWN_VENDOR.to_string()
            }
        }
    }

    /// Trim a captured "Comercio:" value: stop at the next field label,
    /// drop any trailing amount, collapse internal whitespace.
    fn clean_label_value(&self, raw: &str) -> String {
        let mut name = raw.to_string();
        if let Some(position) = self.label_cut.find(&name).map(|label| label.start()) {
            name.truncate(position);
        }

        let name = self.trailing_symbol_amount.replace(&name, "");
        let name = self.trailing_code_amount.replace(name.as_ref(), "");
        self.whitespace.replace_all(name.trim(), " ").into_owned()
    }
}

impl Default for VendorExtractor {
    fn default() -> Self {
        Self::new()
    }
}
