// 🗄️ Rule Store - SQLite tables for vendor keywords and category rules
//
// The store is administered out-of-band and read-only during a batch run.
// Patterns and keywords are normalized to lowercase on write and lookup;
// category rules are soft-deactivated rather than deleted.

use anyhow::{Context, Result};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::rules::{categorize, CategoryRule, RuleKind, RuleRepository};

/// A lowercase keyword mapped to a canonical vendor display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorKeyword {
    pub keyword: String,
    pub vendor_name: String,
    pub category: Option<String>,
}

/// SQLite-backed rule store.
pub struct RuleStore {
    conn: Connection,
}

impl RuleStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create database directory {:?}", parent))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open rule database {:?}", path))?;
        setup_schema(&conn)?;
        Ok(RuleStore { conn })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        setup_schema(&conn)?;
        Ok(RuleStore { conn })
    }

    // ========================================================================
    // VENDOR KEYWORDS
    // ========================================================================

    /// Insert or replace a vendor keyword. Keywords are unique and stored
    /// lowercase.
    pub fn add_vendor_keyword(&self, keyword: &str, vendor_name: &str, category: Option<&str>) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO vendor_keywords
                 (keyword, vendor_name, category, updated_at)
                 VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)",
                params![keyword.to_lowercase(), vendor_name, category],
            )
            .context("Failed to add vendor keyword")?;
        Ok(())
    }

    /// Update an existing keyword; returns false when it does not exist.
    pub fn update_vendor_keyword(&self, keyword: &str, vendor_name: &str, category: Option<&str>) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE vendor_keywords
                 SET vendor_name = ?1, category = ?2, updated_at = CURRENT_TIMESTAMP
                 WHERE keyword = ?3",
                params![vendor_name, category, keyword.to_lowercase()],
            )
            .context("Failed to update vendor keyword")?;
        Ok(changed > 0)
    }

    /// Delete a keyword; returns false when it does not exist.
    pub fn delete_vendor_keyword(&self, keyword: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM vendor_keywords WHERE keyword = ?1",
                params![keyword.to_lowercase()],
            )
            .context("Failed to delete vendor keyword")?;
        Ok(changed > 0)
    }

    /// Canonical vendor name for an exact keyword, if registered.
    pub fn get_vendor_by_keyword(&self, keyword: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT vendor_name FROM vendor_keywords WHERE keyword = ?1",
                params![keyword.to_lowercase()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up vendor keyword")
    }

    /// Scan keywords longest-first for a case-insensitive substring of the
    /// text; the first hit's canonical name wins.
    pub fn vendor_for_text(&self, text: &str) -> Result<Option<String>> {
        let text_lower = text.to_lowercase();

        let mut statement = self
            .conn
            .prepare("SELECT keyword, vendor_name FROM vendor_keywords ORDER BY LENGTH(keyword) DESC")?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (keyword, vendor_name) = row?;
            if text_lower.contains(&keyword) {
                return Ok(Some(vendor_name));
            }
        }
        Ok(None)
    }

    pub fn get_all_vendors(&self) -> Result<Vec<VendorKeyword>> {
        let mut statement = self
            .conn
            .prepare("SELECT keyword, vendor_name, category FROM vendor_keywords ORDER BY keyword")?;
        let rows = statement.query_map([], |row| {
            Ok(VendorKeyword {
                keyword: row.get(0)?,
                vendor_name: row.get(1)?,
                category: row.get(2)?,
            })
        })?;

        let mut vendors = Vec::new();
        for row in rows {
            vendors.push(row?);
        }
        Ok(vendors)
    }

    // ========================================================================
    // CATEGORIES
    // ========================================================================

    pub fn add_category(&self, name: &str, description: Option<&str>) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO categories (name, description) VALUES (?1, ?2)",
                params![name, description],
            )
            .context("Failed to add category")?;
        Ok(())
    }

    pub fn get_all_categories(&self) -> Result<Vec<String>> {
        let mut statement = self.conn.prepare("SELECT name FROM categories ORDER BY name")?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }
        Ok(categories)
    }

    // ========================================================================
    // CATEGORY RULES
    // ========================================================================

    /// Add a rule; patterns are stored lowercase. Returns the new rule id.
    pub fn add_category_rule(&self, kind: RuleKind, pattern: &str, category: &str, priority: i64) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO category_rules (rule_type, pattern, category, priority)
                 VALUES (?1, ?2, ?3, ?4)",
                params![kind.as_str(), pattern.to_lowercase(), category, priority],
            )
            .context("Failed to add category rule")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Soft-delete: the rule stops matching but its row stays for history.
    pub fn deactivate_category_rule(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE category_rules SET active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
                params![id],
            )
            .context("Failed to deactivate category rule")?;
        Ok(changed > 0)
    }

    /// All active rules, highest priority first.
    pub fn get_all_category_rules(&self) -> Result<Vec<CategoryRule>> {
        let mut statement = self.conn.prepare(
            "SELECT id, rule_type, pattern, category, priority, active
             FROM category_rules WHERE active = 1 ORDER BY priority DESC",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, bool>(5)?,
            ))
        })?;

        let mut rules = Vec::new();
        for row in rows {
            let (id, rule_type, pattern, category, priority, active) = row?;
            match RuleKind::parse(&rule_type) {
                Some(kind) => rules.push(CategoryRule { id, kind, pattern, category, priority, active }),
                None => warn!("skipping rule {} with unknown type '{}'", id, rule_type),
            }
        }
        Ok(rules)
    }

    /// Categorize a vendor (or free text) directly against the stored rules.
    pub fn categorize_vendor(&self, text: &str) -> Result<String> {
        Ok(categorize(self.get_all_category_rules()?, text))
    }

    // ========================================================================
    // COUNTS & SEEDING
    // ========================================================================

    pub fn vendor_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM vendor_keywords", [], |row| row.get(0))
            .context("Failed to count vendor keywords")
    }

    pub fn category_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
            .context("Failed to count categories")
    }

    pub fn rule_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM category_rules", [], |row| row.get(0))
            .context("Failed to count category rules")
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.vendor_count()? == 0 && self.rule_count()? == 0 && self.category_count()? == 0)
    }

    /// Install the Costa Rica starter set: common vendors, categories and
    /// classification rules. Vendors and categories use insert-or-replace;
    /// rules are only seeded into an empty rule table.
    pub fn seed_defaults(&self) -> Result<()> {
        for (name, description) in DEFAULT_CATEGORIES {
            self.add_category(name, Some(description))?;
        }

        for (keyword, vendor_name, category) in DEFAULT_VENDORS {
            self.add_vendor_keyword(keyword, vendor_name, Some(category))?;
        }

        if self.rule_count()? == 0 {
            for (kind, pattern, category, priority) in default_rules() {
                self.add_category_rule(kind, pattern, category, priority)?;
            }
        }

        Ok(())
    }
}

impl RuleRepository for RuleStore {
    fn find_vendor_by_text(&self, text: &str) -> Result<Option<String>> {
        self.vendor_for_text(text)
    }

    fn list_active_rules(&self) -> Result<Vec<CategoryRule>> {
        self.get_all_category_rules()
    }
}

fn setup_schema(conn: &Connection) -> Result<()> {
    // WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS vendor_keywords (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            keyword TEXT NOT NULL UNIQUE,
            vendor_name TEXT NOT NULL,
            category TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS category_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rule_type TEXT NOT NULL, -- 'vendor_exact', 'vendor_contains', 'keyword_contains'
            pattern TEXT NOT NULL,
            category TEXT NOT NULL,
            priority INTEGER DEFAULT 1, -- higher priority rules are checked first
            active BOOLEAN DEFAULT 1,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_vendor_keywords_keyword ON vendor_keywords(keyword)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_category_rules_pattern ON category_rules(pattern)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_category_rules_priority ON category_rules(priority DESC)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// DEFAULT DATA (Costa Rica starter set)
// ============================================================================

const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Personal", "Catch-all for uncategorized spending"),
    ("Groceries", "Supermarkets and convenience stores"),
    ("Restaurants", "Dining and fast food"),
    ("Food Delivery", "Delivery platforms"),
    ("Transportation", "Ride sharing, parking, shuttles"),
    ("Streaming", "Media subscriptions"),
    ("Education", "Courses, books, tuition"),
    ("Pets", "Veterinary and pet supplies"),
    ("Gifts", "Presents and flowers"),
];

const DEFAULT_VENDORS: &[(&str, &str, &str)] = &[
    // Fast food
    ("kfc", "KFC", "Restaurants"),
    ("kfc express", "KFC Express", "Restaurants"),
    ("mcdonalds", "McDonalds CR", "Restaurants"),
    ("burger king", "Burger King CR", "Restaurants"),
    ("pizza hut", "Pizza Hut CR", "Restaurants"),
    ("subway", "Subway CR", "Restaurants"),
    // Supermarkets
    ("automercado", "Automercado", "Groceries"),
    ("mas x menos", "Mas x Menos", "Groceries"),
    ("maxi pali", "Maxi Pali", "Groceries"),
    ("pali", "Pali", "Groceries"),
    ("pricesmart", "PriceSmart", "Groceries"),
    ("walmart", "Walmart Costa Rica", "Groceries"),
    ("am pm", "AM PM (Convenience)", "Groceries"),
    ("fresh market", "Fresh Market (Convenience)", "Groceries"),
    // Transportation
    ("uber", "Uber", "Transportation"),
    ("dlc* uber rides", "Uber Rides", "Transportation"),
    ("didi", "DiDi (Transportation)", "Transportation"),
    ("interbus", "Interbus (Shuttle)", "Transportation"),
    // Delivery & dining
    ("uber eats", "Uber Eats", "Food Delivery"),
    ("dlc* uber eats", "Uber Eats", "Food Delivery"),
    ("rappi", "Rappi (Delivery)", "Food Delivery"),
    // Subscriptions
    ("netflix", "Netflix", "Streaming"),
    ("spotify", "Spotify", "Streaming"),
    ("amazon prime", "Amazon Prime", "Streaming"),
    ("disney", "Disney+", "Streaming"),
];

fn default_rules() -> Vec<(RuleKind, &'static str, &'static str, i64)> {
    vec![
        (RuleKind::VendorContains, "spotify", "Streaming", 100),
        (RuleKind::VendorContains, "netflix", "Streaming", 100),
        (RuleKind::VendorContains, "amazon prime", "Streaming", 100),
        (RuleKind::VendorContains, "disney", "Streaming", 100),
        (RuleKind::VendorContains, "uber eats", "Food Delivery", 95),
        (RuleKind::VendorContains, "rappi", "Food Delivery", 95),
        (RuleKind::VendorContains, "kfc", "Restaurants", 60),
        (RuleKind::VendorContains, "mcdonalds", "Restaurants", 60),
        (RuleKind::VendorContains, "burger king", "Restaurants", 60),
        (RuleKind::VendorContains, "pizza hut", "Restaurants", 60),
        (RuleKind::VendorContains, "subway", "Restaurants", 60),
        (RuleKind::VendorContains, "automercado", "Groceries", 60),
        (RuleKind::VendorContains, "mas x menos", "Groceries", 60),
        (RuleKind::VendorContains, "pali", "Groceries", 60),
        (RuleKind::VendorContains, "pricesmart", "Groceries", 60),
        (RuleKind::VendorContains, "walmart", "Groceries", 60),
        // "uber" must stay below "uber eats"
        (RuleKind::VendorContains, "uber", "Transportation", 50),
        (RuleKind::VendorContains, "didi", "Transportation", 50),
        (RuleKind::KeywordContains, "parquimetro", "Transportation", 40),
        (RuleKind::KeywordContains, "parqueo", "Transportation", 40),
        (RuleKind::KeywordContains, "parking", "Transportation", 40),
        (RuleKind::KeywordContains, "veterinaria", "Pets", 40),
        (RuleKind::KeywordContains, "mascotas", "Pets", 40),
        (RuleKind::KeywordContains, "universidad", "Education", 40),
        (RuleKind::KeywordContains, "libreria", "Education", 40),
        (RuleKind::KeywordContains, "curso", "Education", 40),
        (RuleKind::KeywordContains, "floreria", "Gifts", 40),
        (RuleKind::KeywordContains, "regalo", "Gifts", 40),
    ]
}
