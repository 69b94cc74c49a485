// Rule store administration tool - pure pass-through CRUD
//
// Usage:
//   expensemail-admin list-vendors
//   expensemail-admin list-categories
//   expensemail-admin list-rules
//   expensemail-admin add-vendor <keyword> <name> [category]
//   expensemail-admin delete-vendor <keyword>
//   expensemail-admin add-category <name> [description]
//   expensemail-admin add-rule <kind> <pattern> <category> <priority>
//   expensemail-admin deactivate-rule <id>
//   expensemail-admin test-vendor <text...>
//   expensemail-admin seed

use anyhow::{bail, Result};
use std::env;

use expensemail::{Config, RuleKind, RuleStore, UNKNOWN_VENDOR};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = Config::from_env();
    let store = RuleStore::open(&config.database_path)?;

    match args.first().map(String::as_str) {
        Some("list-vendors") => list_vendors(&store),
        Some("list-categories") => list_categories(&store),
        Some("list-rules") => list_rules(&store),
        Some("add-vendor") => add_vendor(&store, &args[1..]),
        Some("delete-vendor") => delete_vendor(&store, &args[1..]),
        Some("add-category") => add_category(&store, &args[1..]),
        Some("add-rule") => add_rule(&store, &args[1..]),
        Some("deactivate-rule") => deactivate_rule(&store, &args[1..]),
        Some("test-vendor") => test_vendor(&store, &args[1..]),
        Some("seed") => {
            store.seed_defaults()?;
            println!("✓ Installed default vendors, categories and rules");
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn list_vendors(store: &RuleStore) -> Result<()> {
    let vendors = store.get_all_vendors()?;
    println!("=== VENDOR KEYWORDS ({}) ===", vendors.len());
    for vendor in vendors {
        match vendor.category {
            Some(category) => {
                println!("'{}' → '{}' [{}]", vendor.keyword, vendor.vendor_name, category)
            }
            None => println!("'{}' → '{}'", vendor.keyword, vendor.vendor_name),
        }
    }
    Ok(())
}

fn list_categories(store: &RuleStore) -> Result<()> {
    let categories = store.get_all_categories()?;
    println!("=== CATEGORIES ({}) ===", categories.len());
    for category in categories {
        println!("- {}", category);
    }
    Ok(())
}

fn list_rules(store: &RuleStore) -> Result<()> {
    let rules = store.get_all_category_rules()?;
    println!("=== CATEGORY RULES ({}) ===", rules.len());
    println!("{:<5} {:<18} {:<26} {:<17} Priority", "Id", "Rule Type", "Pattern", "Category");
    for rule in rules {
        println!(
            "{:<5} {:<18} {:<26} {:<17} {}",
            rule.id,
            rule.kind.as_str(),
            rule.pattern,
            rule.category,
            rule.priority
        );
    }
    Ok(())
}

fn add_vendor(store: &RuleStore, args: &[String]) -> Result<()> {
    let (keyword, name) = match (args.first(), args.get(1)) {
        (Some(keyword), Some(name)) => (keyword, name),
        _ => bail!("usage: add-vendor <keyword> <name> [category]"),
    };

    store.add_vendor_keyword(keyword, name, args.get(2).map(String::as_str))?;
    println!("✓ Added vendor keyword: '{}' → '{}'", keyword.to_lowercase(), name);
    Ok(())
}

fn delete_vendor(store: &RuleStore, args: &[String]) -> Result<()> {
    let keyword = match args.first() {
        Some(keyword) => keyword,
        None => bail!("usage: delete-vendor <keyword>"),
    };

    if store.delete_vendor_keyword(keyword)? {
        println!("✓ Deleted vendor keyword: '{}'", keyword.to_lowercase());
    } else {
        println!("✗ Vendor keyword not found: '{}'", keyword.to_lowercase());
    }
    Ok(())
}

fn add_category(store: &RuleStore, args: &[String]) -> Result<()> {
    let name = match args.first() {
        Some(name) => name,
        None => bail!("usage: add-category <name> [description]"),
    };

    store.add_category(name, args.get(1).map(String::as_str))?;
    println!("✓ Added category: '{}'", name);
    Ok(())
}

fn add_rule(store: &RuleStore, args: &[String]) -> Result<()> {
    let (kind, pattern, category, priority) =
        match (args.first(), args.get(1), args.get(2), args.get(3)) {
            (Some(kind), Some(pattern), Some(category), Some(priority)) => {
                (kind, pattern, category, priority)
            }
            _ => bail!("usage: add-rule <kind> <pattern> <category> <priority>"),
        };

    let kind = match RuleKind::parse(kind) {
        Some(kind) => kind,
        None => bail!("invalid rule kind '{}': expected vendor_exact, vendor_contains or keyword_contains", kind),
    };
    let priority: i64 = priority.parse()?;

    let id = store.add_category_rule(kind, pattern, category, priority)?;
    println!(
        "✓ Added rule {}: {} '{}' → '{}' (priority: {})",
        id,
        kind.as_str(),
        pattern.to_lowercase(),
        category,
        priority
    );
    Ok(())
}

fn deactivate_rule(store: &RuleStore, args: &[String]) -> Result<()> {
    let id: i64 = match args.first() {
        Some(id) => id.parse()?,
        None => bail!("usage: deactivate-rule <id>"),
    };

    if store.deactivate_category_rule(id)? {
        println!("✓ Deactivated rule {}", id);
    } else {
        println!("✗ Rule {} not found", id);
    }
    Ok(())
}

fn test_vendor(store: &RuleStore, args: &[String]) -> Result<()> {
    if args.is_empty() {
        bail!("usage: test-vendor <text...>");
    }
    let text = args.join(" ");

    match store.vendor_for_text(&text)? {
        Some(vendor) => {
            println!("Vendor:   {}", vendor);
            println!("Category: {}", store.categorize_vendor(&vendor)?);
        }
        None => {
            println!("Vendor:   {} (no keyword match)", UNKNOWN_VENDOR);
            println!("Category: {}", store.categorize_vendor(&text)?);
        }
    }
    Ok(())
}

fn print_usage() {
    println!("Expensemail rule store administration");
    println!();
    println!("Commands:");
    println!("  list-vendors                                 Show all vendor keywords");
    println!("  list-categories                              Show all categories");
    println!("  list-rules                                   Show active category rules");
    println!("  add-vendor <keyword> <name> [category]       Register a vendor keyword");
    println!("  delete-vendor <keyword>                      Remove a vendor keyword");
    println!("  add-category <name> [description]            Register a category");
    println!("  add-rule <kind> <pattern> <category> <prio>  Add a classification rule");
    println!("  deactivate-rule <id>                         Soft-delete a rule");
    println!("  test-vendor <text...>                        Dry-run vendor/category lookup");
    println!("  seed                                         Install the default data set");
}
