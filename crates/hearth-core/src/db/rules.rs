//! Learned categorization rules
//!
//! Rules are written only when a person corrects a category (a manual edit
//! or an import override) and are read by the categorizer's learned-rule
//! strategies. Lookup tries an exact pattern first, then the longest stored
//! pattern that prefixes the candidate.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use super::categories::find_category;
use super::Database;
use crate::categories::{is_transfer_category, pick_existing_category};
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::models::{CategoryRule, RuleKeyType, RuleSource};
use crate::normalize::{
    extract_pattern, is_stopword, DESCRIPTION_PATTERN_WORDS, VENDOR_PATTERN_WORDS,
};

/// A rule written or refreshed by [`learn_rule`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LearnedPattern {
    pub key_type: RuleKeyType,
    pub pattern: String,
    pub category_id: i64,
}

fn find_rule(
    conn: &Connection,
    user_id: i64,
    key_type: RuleKeyType,
    pattern: &str,
) -> Result<Option<(i64, String)>> {
    let exact = conn
        .query_row(
            r#"
            SELECT cr.id, c.name
            FROM category_rules cr
            JOIN categories c ON c.id = cr.category_id
            WHERE cr.user_id = ? AND cr.key_type = ? AND cr.pattern = ? AND cr.is_enabled = 1
            ORDER BY cr.priority ASC, cr.hits DESC, cr.updated_at DESC
            LIMIT 1
            "#,
            params![user_id, key_type.as_str(), pattern],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    if exact.is_some() {
        return Ok(exact);
    }

    let prefix = conn
        .query_row(
            r#"
            SELECT cr.id, c.name
            FROM category_rules cr
            JOIN categories c ON c.id = cr.category_id
            WHERE cr.user_id = ? AND cr.key_type = ? AND ? LIKE cr.pattern || '%' AND cr.is_enabled = 1
            ORDER BY LENGTH(cr.pattern) DESC, cr.priority ASC, cr.hits DESC
            LIMIT 1
            "#,
            params![user_id, key_type.as_str(), pattern],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(prefix)
}

/// Category learned for a pattern, or empty
///
/// A hit increments the rule's counter and stamps `last_used_at`. Rules whose
/// category the user no longer has are ignored.
pub(crate) fn resolve_learned_category(
    conn: &Connection,
    user_id: i64,
    key_type: RuleKeyType,
    pattern: &str,
    available: &[String],
) -> Result<String> {
    if pattern.is_empty() {
        return Ok(String::new());
    }

    let Some((rule_id, category_name)) = find_rule(conn, user_id, key_type, pattern)? else {
        return Ok(String::new());
    };

    let category = pick_existing_category(&category_name, available, None);
    if category.is_empty() {
        return Ok(String::new());
    }

    conn.execute(
        "UPDATE category_rules SET hits = hits + 1, last_used_at = CURRENT_TIMESTAMP WHERE id = ?",
        params![rule_id],
    )?;
    debug!("Rule {} hit for {} '{}'", rule_id, key_type, pattern);

    Ok(category)
}

/// Record a person's category choice as a rule
///
/// The vendor pattern is preferred; the description pattern is used when no
/// vendor pattern can be extracted. Nothing is learned when learning is off,
/// when the category is a transfer category, or when the pattern is too
/// short or generic.
pub(crate) fn learn_rule(
    conn: &Connection,
    ctx: &RequestContext,
    description: &str,
    vendor: &str,
    category_id: i64,
    source: RuleSource,
) -> Result<Option<LearnedPattern>> {
    if !ctx.options.learning_enabled {
        return Ok(None);
    }

    let category_name: Option<String> = conn
        .query_row(
            "SELECT name FROM categories WHERE id = ? AND user_id = ?",
            params![category_id, ctx.user_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(category_name) = category_name else {
        return Ok(None);
    };
    if is_transfer_category(&category_name) {
        return Ok(None);
    }

    let vendor_pattern = extract_pattern(vendor, VENDOR_PATTERN_WORDS);
    let (key_type, pattern) = if vendor_pattern.is_empty() {
        (
            RuleKeyType::Description,
            extract_pattern(description, DESCRIPTION_PATTERN_WORDS),
        )
    } else {
        (RuleKeyType::Vendor, vendor_pattern)
    };
    if pattern.is_empty() || is_stopword(&pattern) || pattern.chars().count() < 3 {
        return Ok(None);
    }

    conn.execute(
        r#"
        INSERT INTO category_rules (user_id, key_type, pattern, category_id, source)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(user_id, key_type, pattern) DO UPDATE SET
            category_id = excluded.category_id,
            source = excluded.source,
            is_enabled = 1,
            updated_at = CURRENT_TIMESTAMP
        "#,
        params![
            ctx.user_id,
            key_type.as_str(),
            pattern,
            category_id,
            source.as_str()
        ],
    )?;
    info!(
        "Learned {} rule '{}' -> {} ({})",
        key_type, pattern, category_name, source
    );

    Ok(Some(LearnedPattern {
        key_type,
        pattern,
        category_id,
    }))
}

impl Database {
    /// Rules owned by the caller, most used first
    pub fn list_rules(&self, ctx: &RequestContext) -> Result<Vec<CategoryRule>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT cr.id, cr.key_type, cr.pattern, cr.category_id, c.name, cr.priority,
                   cr.hits, cr.source, cr.is_enabled, cr.last_used_at, cr.updated_at
            FROM category_rules cr
            JOIN categories c ON c.id = cr.category_id
            WHERE cr.user_id = ?
            ORDER BY cr.hits DESC, cr.updated_at DESC
            "#,
        )?;

        let rules = stmt
            .query_map(params![ctx.user_id], |row| {
                let key_type: String = row.get(1)?;
                let source: String = row.get(7)?;
                Ok(CategoryRule {
                    id: row.get(0)?,
                    key_type: key_type.parse().unwrap_or(RuleKeyType::Description),
                    pattern: row.get(2)?,
                    category_id: row.get(3)?,
                    category: row.get(4)?,
                    priority: row.get(5)?,
                    hits: row.get(6)?,
                    source: source.parse().unwrap_or(RuleSource::ManualEdit),
                    enabled: row.get(8)?,
                    last_used_at: row.get(9)?,
                    updated_at: row.get(10)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rules)
    }

    /// Retarget and/or enable or disable a rule
    pub fn update_rule(
        &self,
        ctx: &RequestContext,
        rule_id: i64,
        category: Option<&str>,
        enabled: Option<bool>,
    ) -> Result<()> {
        let conn = self.conn()?;

        let category_id = match category {
            Some(name) => Some(
                find_category(&conn, ctx.user_id, name)?
                    .ok_or_else(|| Error::NotFound(format!("Category '{}'", name)))?
                    .id,
            ),
            None => None,
        };

        let updated = conn.execute(
            r#"
            UPDATE category_rules
            SET category_id = COALESCE(?, category_id),
                is_enabled = COALESCE(?, is_enabled),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND user_id = ?
            "#,
            params![category_id, enabled, rule_id, ctx.user_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Rule {}", rule_id)));
        }

        Ok(())
    }

    /// Delete a rule
    pub fn delete_rule(&self, ctx: &RequestContext, rule_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM category_rules WHERE id = ? AND user_id = ?",
            params![rule_id, ctx.user_id],
        )?;
        Ok(deleted > 0)
    }

    /// Learn a rule outside of an edit or import
    pub fn learn_rule(
        &self,
        ctx: &RequestContext,
        description: &str,
        vendor: &str,
        category_id: i64,
        source: RuleSource,
    ) -> Result<Option<LearnedPattern>> {
        let conn = self.conn()?;
        learn_rule(&conn, ctx, description, vendor, category_id, source)
    }
}
