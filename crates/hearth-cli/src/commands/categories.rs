//! Category command implementations

use anyhow::{Context, Result};
use hearth_core::categories::{is_personal_category, is_pet_category, is_transfer_category};
use hearth_core::models::Category;

use super::Session;

fn resolve_category(s: &Session, name: &str) -> Result<Category> {
    s.db
        .find_category(&s.ctx, name)?
        .ok_or_else(|| anyhow::anyhow!("Category '{}' not found", name))
}

pub fn cmd_categories_list(s: &Session) -> Result<()> {
    let categories = s.db.list_categories(&s.ctx)?;

    println!();
    println!("🏷️  Categories ({})", categories.len());
    println!("   ─────────────────────────────");
    for category in categories {
        let kind = if is_transfer_category(&category.name) {
            "transfer"
        } else if is_personal_category(&category.name) {
            "personal"
        } else if is_pet_category(&category.name) {
            "pet"
        } else {
            ""
        };
        println!("   [{:>3}] {:<32} {}", category.id, category.name, kind);
    }

    Ok(())
}

pub fn cmd_categories_add(s: &Session, name: &str) -> Result<()> {
    let category = s
        .db
        .add_category(&s.ctx, name)
        .with_context(|| format!("Failed to add category '{}'", name))?;
    println!("✅ Added category {} (id {})", category.name, category.id);
    Ok(())
}

pub fn cmd_categories_rename(s: &Session, old_name: &str, new_name: &str) -> Result<()> {
    let category = resolve_category(s, old_name)?;
    let renamed = s.db.rename_category(&s.ctx, category.id, new_name)?;
    println!("✅ Renamed {} to {}", category.name, renamed.name);
    Ok(())
}

pub fn cmd_categories_delete(s: &Session, name: &str) -> Result<()> {
    let category = resolve_category(s, name)?;
    s.db.delete_category(&s.ctx, category.id)?;
    println!("🗑️  Deleted category {}", category.name);
    println!("   Its transactions are now uncategorized.");
    Ok(())
}
