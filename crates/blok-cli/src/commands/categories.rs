//! Category and rule command implementations

use anyhow::{bail, Context, Result};
use blok_core::db::Database;
use blok_core::models::Category;

use super::{print_json, truncate};

/// Look up a category by name, failing with a hint when it does not exist
fn resolve_category(db: &Database, name: &str) -> Result<Category> {
    match db.get_category_by_name(name)? {
        Some(category) => Ok(category),
        None => bail!(
            "Category '{}' not found. List categories with: blok categories",
            name
        ),
    }
}

// ========== Categories ==========

pub fn cmd_categories_list(db: &Database, json: bool) -> Result<()> {
    let categories = db.list_categories()?;

    if json {
        return print_json(&categories);
    }

    if categories.is_empty() {
        println!("No categories defined. Seed the defaults with: blok init");
        return Ok(());
    }

    println!();
    println!("🏷️  Categories");
    println!("   ─────────────────────────────────────────────────────────────");

    for category in categories {
        match category.description {
            Some(description) => println!("   {:20} {}", category.name, description),
            None => println!("   {}", category.name),
        }
    }

    Ok(())
}

pub fn cmd_categories_add(db: &Database, name: &str, description: Option<&str>) -> Result<()> {
    let id = db
        .create_category(name, description)
        .with_context(|| format!("Failed to create category '{}'", name))?;
    println!("✅ Created category #{} '{}'", id, name.trim());
    Ok(())
}

pub fn cmd_categories_delete(db: &Database, name: &str) -> Result<()> {
    let category = resolve_category(db, name)?;
    db.delete_category(category.id)?;
    println!("✅ Deleted category '{}' and its rules", category.name);
    Ok(())
}

// ========== Rules ==========

pub fn cmd_rules_list(db: &Database, json: bool) -> Result<()> {
    let rules = db.list_rules()?;

    if json {
        return print_json(&rules);
    }

    if rules.is_empty() {
        println!("No rules defined. Add one with:");
        println!("  blok rules add <category> <pattern> [--priority N]");
        return Ok(());
    }

    println!();
    println!("📋 Classification Rules (checked top to bottom)");
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {:>4} │ {:>4} │ {:20} │ {}",
        "ID", "Pri", "Category", "Pattern"
    );
    println!("   ─────┼──────┼──────────────────────┼─────────────────");

    for rule in rules {
        println!(
            "   {:>4} │ {:>4} │ {:20} │ {}",
            rule.rule.id,
            rule.rule.priority,
            truncate(&rule.category_name, 20),
            truncate(&rule.rule.pattern, 30)
        );
    }

    Ok(())
}

pub fn cmd_rules_add(db: &Database, category_name: &str, pattern: &str, priority: i32) -> Result<()> {
    let category = resolve_category(db, category_name)?;

    let rule_id = db
        .create_rule(category.id, pattern, priority)
        .with_context(|| format!("Failed to create rule '{}'", pattern))?;
    println!(
        "✅ Created rule #{} for category '{}': {} (priority {})",
        rule_id,
        category.name,
        pattern.trim().to_lowercase(),
        priority
    );

    Ok(())
}

pub fn cmd_rules_delete(db: &Database, id: i64) -> Result<()> {
    if !db.delete_rule(id)? {
        bail!("Rule #{} not found", id);
    }
    println!("✅ Deleted rule #{}", id);

    Ok(())
}

pub fn cmd_rules_test(db: &Database, item: &str, merchant: Option<&str>, json: bool) -> Result<()> {
    let matches = db.test_rules(item, merchant)?;

    if json {
        return print_json(&matches);
    }

    let label = match merchant {
        Some(m) => format!("{} @ {}", item, m),
        None => item.to_string(),
    };

    if matches.is_empty() {
        println!("No rules match \"{}\"", label);
        return Ok(());
    }

    println!();
    println!("🔍 Rules matching \"{}\":", label);
    println!("   ─────────────────────────────────────────────────────────────");

    for (i, m) in matches.iter().enumerate() {
        let marker = if i == 0 { "→" } else { " " };
        println!(
            " {} Rule #{} (priority {}) -> {} ({})",
            marker, m.rule.id, m.rule.priority, m.category_name, m.rule.pattern
        );
    }

    Ok(())
}
