//! Learned rule command implementations

use anyhow::Result;

use super::{truncate, Session};

pub fn cmd_rules_list(s: &Session) -> Result<()> {
    let rules = s.db.list_rules(&s.ctx)?;

    if rules.is_empty() {
        println!("No learned rules yet. Rules are learned when you correct a category.");
        return Ok(());
    }

    println!();
    println!("📐 Learned rules");
    println!("   ─────────────────────────────────────────────────────────────");
    for rule in rules {
        println!(
            "   [{:>3}] {:<11} {:<28} → {:<24} hits {:>4}  {}{}",
            rule.id,
            rule.key_type,
            truncate(&rule.pattern, 28),
            truncate(&rule.category, 24),
            rule.hits,
            rule.source,
            if rule.enabled { "" } else { " (disabled)" }
        );
    }

    Ok(())
}

pub fn cmd_rules_retarget(s: &Session, id: i64, category: &str) -> Result<()> {
    s.db.update_rule(&s.ctx, id, Some(category), None)?;
    println!("✅ Rule {} now assigns {}", id, category);
    Ok(())
}

pub fn cmd_rules_set_enabled(s: &Session, id: i64, enabled: bool) -> Result<()> {
    s.db.update_rule(&s.ctx, id, None, Some(enabled))?;
    println!(
        "✅ Rule {} {}",
        id,
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

pub fn cmd_rules_delete(s: &Session, id: i64) -> Result<()> {
    if !s.db.delete_rule(&s.ctx, id)? {
        anyhow::bail!("Rule {} not found", id);
    }
    println!("🗑️  Deleted rule {}", id);
    Ok(())
}
