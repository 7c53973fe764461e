//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` / `Session` - Shared setup: database, config and acting user
//! - `cmd_init` - Initialize the database
//! - `cmd_health` - Schema health check
//! - `cmd_members_*` - Household membership
//! - `cmd_categorize` - Dry-run the categorizer

use std::path::Path;

use anyhow::{Context, Result};
use hearth_core::{Database, EngineOptions, HearthConfig, RequestContext};

/// Open (and migrate) the database at `db_path`
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    Database::new(path_str).context("Failed to open database")
}

/// Everything a command needs: the database, the configuration and who is acting
pub struct Session {
    pub db: Database,
    pub config: HearthConfig,
    pub ctx: RequestContext,
}

impl Session {
    pub fn open(db_path: &Path, user: Option<&str>, config_path: Option<&Path>) -> Result<Self> {
        let config = HearthConfig::load(config_path).context("Failed to load configuration")?;
        let db = open_db(db_path)?;
        Self::with_database(db, config, user)
    }

    pub fn with_database(db: Database, config: HearthConfig, user: Option<&str>) -> Result<Self> {
        let user = user.unwrap_or(&config.default_user).to_string();
        let ctx = db
            .request_context(&user, EngineOptions::from(&config))
            .with_context(|| format!("Failed to resolve user '{}'", user))?;
        Ok(Self { db, config, ctx })
    }
}

pub fn cmd_init(s: &Session) -> Result<()> {
    println!("🔧 Initializing database at {}...", s.db.path());

    let categories = s.db.list_categories(&s.ctx)?;
    println!("   User: {} (household {})", s.ctx.user_name, s.ctx.household_id);
    println!("   Categories: {}", categories.len());

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Stage a bank export: hearth import preview --file statement.csv");
    println!("  2. Confirm it:          hearth import confirm <import-id> --paid-by DK");
    println!("  3. Settle up:           hearth settle summary");

    Ok(())
}

pub fn cmd_health(s: &Session) -> Result<()> {
    let health = s.db.schema_health()?;

    println!();
    println!("🩺 Schema health (version {})", health.schema_version);
    println!("   ─────────────────────────────");

    if health.ok {
        println!("   ✅ All tables, columns and indexes present");
        return Ok(());
    }

    for table in &health.missing_tables {
        println!("   ❌ Missing table: {}", table);
    }
    for column in &health.missing_columns {
        println!("   ❌ Missing column: {}", column);
    }
    for index in &health.missing_indexes {
        println!("   ⚠️  Missing index: {}", index);
    }

    anyhow::bail!("Schema is incomplete")
}

pub fn cmd_members_list(s: &Session) -> Result<()> {
    let members = s.db.household_members(&s.ctx)?;

    println!();
    println!("🏠 Household {}", s.ctx.household_id);
    println!("   ─────────────────────────────");
    for member in members {
        let marker = if member.user_id == s.ctx.user_id { " (you)" } else { "" };
        println!("   {:<20} {}{}", member.user_name, member.role, marker);
    }

    Ok(())
}

pub fn cmd_members_add(s: &Session, name: &str) -> Result<()> {
    let member = s
        .db
        .add_household_member(&s.ctx, name)
        .with_context(|| format!("Failed to add '{}'", name))?;
    println!(
        "✅ Added {} to household {}",
        member.user_name, s.ctx.household_id
    );
    Ok(())
}

pub fn cmd_categorize(s: &Session, description: &str, vendor: Option<&str>) -> Result<()> {
    let result = s.db.categorize(&s.ctx, description, vendor.unwrap_or(""), "")?;

    if result.category.is_empty() {
        println!("❓ No category for '{}'", description);
    } else {
        println!(
            "🏷️  {} ({}, {} confidence {}%)",
            result.category,
            result.source,
            result.label(),
            result.confidence
        );
    }

    Ok(())
}
