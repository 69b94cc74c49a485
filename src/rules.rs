// 🏷️ Category Rules - classification rules as data
//
// A priority-ordered rule set maps vendor names (or whole email text when
// the vendor is unknown) to spending categories. Rules live in the rule
// store and are read-only during classification.

use anyhow::Result;
use log::warn;
use serde::{Deserialize, Serialize};

/// Catch-all category assigned when no rule matches.
pub const DEFAULT_CATEGORY: &str = "Personal";

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// How a rule's pattern is tested against the subject text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Case-insensitive full-string equality against the vendor name.
    VendorExact,

    /// Case-insensitive substring containment in the vendor name.
    VendorContains,

    /// Case-insensitive substring containment in the full email text.
    KeywordContains,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::VendorExact => "vendor_exact",
            RuleKind::VendorContains => "vendor_contains",
            RuleKind::KeywordContains => "keyword_contains",
        }
    }

    pub fn parse(text: &str) -> Option<RuleKind> {
        match text {
            "vendor_exact" => Some(RuleKind::VendorExact),
            "vendor_contains" => Some(RuleKind::VendorContains),
            "keyword_contains" => Some(RuleKind::KeywordContains),
            _ => None,
        }
    }
}

/// One classification rule. Patterns are stored lowercase; deactivated
/// rules are kept for history but never match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: i64,
    pub kind: RuleKind,
    pub pattern: String,
    pub category: String,
    /// Higher priority rules are checked first.
    pub priority: i64,
    pub active: bool,
}

impl CategoryRule {
    /// Check whether this rule's condition holds for the given text.
    pub fn matches(&self, text: &str) -> bool {
        let text_lower = text.to_lowercase();
        match self.kind {
            RuleKind::VendorExact => text_lower == self.pattern,
            // Both containment kinds use the same test; they differ only in
            // what text the caller is expected to pass.
            RuleKind::VendorContains | RuleKind::KeywordContains => {
                text_lower.contains(&self.pattern)
            }
        }
    }
}

// ============================================================================
// RULE REPOSITORY
// ============================================================================

/// Read-only view of the rule/keyword tables, injected into the classifier
/// and the vendor extractor so tests can substitute an in-memory fixture.
pub trait RuleRepository {
    /// Canonical vendor name for the longest keyword found as a
    /// case-insensitive substring of the text, if any.
    fn find_vendor_by_text(&self, text: &str) -> Result<Option<String>>;

    /// All active category rules. Order is not guaranteed; the classifier
    /// sorts by priority itself.
    fn list_active_rules(&self) -> Result<Vec<CategoryRule>>;
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Applies the rule set to a subject text.
pub struct Classifier {
    repo: Box<dyn RuleRepository>,
}

impl Classifier {
    pub fn new(repo: Box<dyn RuleRepository>) -> Self {
        Classifier { repo }
    }

    pub fn repository(&self) -> &dyn RuleRepository {
        self.repo.as_ref()
    }

    /// Return the category of the first matching rule in descending
    /// priority order, or the default category.
    ///
    /// This is a pure function of (subject text, rule set): the same email
    /// always classifies identically under an unchanged rule set.
    pub fn classify(&self, text: &str) -> String {
        let rules = match self.repo.list_active_rules() {
            Ok(rules) => rules,
            Err(err) => {
                warn!("rule lookup failed, using default category: {:#}", err);
                return DEFAULT_CATEGORY.to_string();
            }
        };

        categorize(rules, text)
    }
}

/// First-match-wins evaluation shared by the classifier and the rule
/// store's direct categorization path.
pub fn categorize(mut rules: Vec<CategoryRule>, text: &str) -> String {
    rules.sort_by(|a, b| b.priority.cmp(&a.priority));

    for rule in &rules {
        if rule.active && rule.matches(text) {
            return rule.category.clone();
        }
    }

    DEFAULT_CATEGORY.to_string()
}

// ============================================================================
// IN-MEMORY REPOSITORY
// ============================================================================

/// Rule repository held entirely in memory. Used as a test fixture and for
/// embedding the pipeline without a database file.
#[derive(Default)]
pub struct InMemoryRules {
    /// (keyword, canonical vendor name), kept sorted longest keyword first.
    keywords: Vec<(String, String)>,
    rules: Vec<CategoryRule>,
    next_rule_id: i64,
}

impl InMemoryRules {
    pub fn new() -> Self {
        InMemoryRules { keywords: Vec::new(), rules: Vec::new(), next_rule_id: 1 }
    }

    pub fn add_keyword(&mut self, keyword: &str, vendor: &str) {
        let keyword = keyword.to_lowercase();
        self.keywords.retain(|(existing, _)| *existing != keyword);
        self.keywords.push((keyword, vendor.to_string()));
        self.keywords.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    pub fn add_rule(&mut self, kind: RuleKind, pattern: &str, category: &str, priority: i64) -> i64 {
        let id = self.next_rule_id;
        self.next_rule_id += 1;
        self.rules.push(CategoryRule {
            id,
            kind,
            pattern: pattern.to_lowercase(),
            category: category.to_string(),
            priority,
            active: true,
        });
        id
    }

    pub fn deactivate_rule(&mut self, id: i64) -> bool {
        match self.rules.iter_mut().find(|rule| rule.id == id) {
            Some(rule) => {
                rule.active = false;
                true
            }
            None => false,
        }
    }
}

impl RuleRepository for InMemoryRules {
    fn find_vendor_by_text(&self, text: &str) -> Result<Option<String>> {
        let text_lower = text.to_lowercase();
        for (keyword, vendor) in &self.keywords {
            if text_lower.contains(keyword) {
                return Ok(Some(vendor.clone()));
            }
        }
        Ok(None)
    }

    fn list_active_rules(&self) -> Result<Vec<CategoryRule>> {
        Ok(self.rules.iter().filter(|rule| rule.active).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier_with(setup: impl FnOnce(&mut InMemoryRules)) -> Classifier {
        let mut repo = InMemoryRules::new();
        setup(&mut repo);
        Classifier::new(Box::new(repo))
    }

    #[test]
    fn test_vendor_exact_is_case_insensitive_equality() {
        let rule = CategoryRule {
            id: 1,
            kind: RuleKind::VendorExact,
            pattern: "spotify".to_string(),
            category: "Streaming".to_string(),
            priority: 10,
            active: true,
        };

        assert!(rule.matches("SPOTIFY"));
        assert!(rule.matches("Spotify"));
        assert!(!rule.matches("SPOTIFY AB"));
    }

    #[test]
    fn test_contains_kinds_share_the_substring_test() {
        for kind in [RuleKind::VendorContains, RuleKind::KeywordContains] {
            let rule = CategoryRule {
                id: 1,
                kind,
                pattern: "uber".to_string(),
                category: "Transportation".to_string(),
                priority: 5,
                active: true,
            };
            assert!(rule.matches("DLC* UBER RIDES"));
            assert!(!rule.matches("LYFT"));
        }
    }

    #[test]
    fn test_higher_priority_wins_regardless_of_insertion_order() {
        let classifier = classifier_with(|repo| {
            repo.add_rule(RuleKind::VendorContains, "amazon", "Shopping", 1);
            repo.add_rule(RuleKind::VendorContains, "amazon prime", "Streaming", 100);
        });

        assert_eq!(classifier.classify("AMAZON PRIME VIDEO"), "Streaming");
    }

    #[test]
    fn test_no_match_returns_default_category() {
        let classifier = classifier_with(|_| {});
        assert_eq!(classifier.classify("FERRETERIA EL COLOCHO"), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_deactivated_rule_never_matches() {
        let mut repo = InMemoryRules::new();
        let id = repo.add_rule(RuleKind::VendorContains, "netflix", "Streaming", 50);
        assert!(repo.deactivate_rule(id));
        let classifier = Classifier::new(Box::new(repo));

        assert_eq!(classifier.classify("NETFLIX.COM"), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = classifier_with(|repo| {
            repo.add_rule(RuleKind::VendorContains, "spotify", "Streaming", 10);
        });

        let first = classifier.classify("SPOTIFY");
        for _ in 0..10 {
            assert_eq!(classifier.classify("SPOTIFY"), first);
        }
    }

    #[test]
    fn test_rule_kind_round_trip() {
        for kind in [RuleKind::VendorExact, RuleKind::VendorContains, RuleKind::KeywordContains] {
            assert_eq!(RuleKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RuleKind::parse("regex"), None);
    }

    #[test]
    fn test_longest_keyword_wins() {
        let mut repo = InMemoryRules::new();
        repo.add_keyword("kfc", "KFC");
        repo.add_keyword("kfc express", "KFC Express");

        let vendor = repo.find_vendor_by_text("compra en KFC EXPRESS escazu").unwrap();
        assert_eq!(vendor, Some("KFC Express".to_string()));
    }
}
