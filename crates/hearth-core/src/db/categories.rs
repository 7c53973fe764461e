//! Category operations

use std::collections::HashMap;

use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::Database;
use crate::categories::{
    is_personal_category, is_transfer_category, is_transfer_transaction, DEFAULT_CATEGORIES, LEGACY_CATEGORY_MAPPING,
};
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::models::Category;
use crate::normalize::normalize_description;

fn load_categories(conn: &Connection, user_id: i64) -> Result<Vec<Category>> {
    let mut stmt =
        conn.prepare("SELECT id, name FROM categories WHERE user_id = ? ORDER BY name")?;
    let categories = stmt
        .query_map(params![user_id], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(categories)
}

/// Category names a user owns
pub(crate) fn category_names(conn: &Connection, user_id: i64) -> Result<Vec<String>> {
    Ok(load_categories(conn, user_id)?
        .into_iter()
        .map(|c| c.name)
        .collect())
}

/// Look up a category by name, ignoring case and accents
pub(crate) fn find_category(conn: &Connection, user_id: i64, name: &str) -> Result<Option<Category>> {
    let wanted = normalize_description(name);
    if wanted.is_empty() {
        return Ok(None);
    }
    Ok(load_categories(conn, user_id)?
        .into_iter()
        .find(|c| normalize_description(&c.name) == wanted))
}

/// Seed the default categories and fold legacy names into them
///
/// Transactions and rules pointing at a legacy category are moved to its
/// replacement before the legacy category is deleted. The derived
/// transfer/personal flags of categorized transactions are then recomputed.
pub(crate) fn ensure_default_categories(conn: &Connection, user_id: i64) -> Result<()> {
    let existing: HashMap<String, i64> = load_categories(conn, user_id)?
        .into_iter()
        .map(|c| (normalize_description(&c.name), c.id))
        .collect();

    let mut inserted = 0;
    for name in DEFAULT_CATEGORIES {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO categories (user_id, name) VALUES (?, ?)",
            params![user_id, name],
        )?;
    }
    if inserted > 0 {
        debug!("Seeded {} categories for user {}", inserted, user_id);
    }

    let current: HashMap<String, i64> = load_categories(conn, user_id)?
        .into_iter()
        .map(|c| (c.name, c.id))
        .collect();

    for (legacy, replacement) in LEGACY_CATEGORY_MAPPING {
        let (Some(&old_id), Some(&new_id)) = (existing.get(*legacy), current.get(*replacement))
        else {
            continue;
        };
        if old_id == new_id {
            continue;
        }
        conn.execute(
            "UPDATE transactions SET category_id = ? WHERE user_id = ? AND category_id = ?",
            params![new_id, user_id, old_id],
        )?;
        conn.execute(
            "UPDATE category_rules SET category_id = ? WHERE user_id = ? AND category_id = ?",
            params![new_id, user_id, old_id],
        )?;
        conn.execute(
            "DELETE FROM categories WHERE id = ? AND user_id = ?",
            params![old_id, user_id],
        )?;
        info!("Remapped legacy category '{}' to '{}'", legacy, replacement);
    }

    refresh_derived_flags(conn, user_id)
}

/// Recompute transfer/personal flags from category names
fn refresh_derived_flags(conn: &Connection, user_id: i64) -> Result<()> {
    for category in load_categories(conn, user_id)? {
        conn.execute(
            r#"
            UPDATE transactions SET is_transfer = ?, is_personal = ?
            WHERE user_id = ? AND category_id = ?
              AND (is_transfer <> ? OR is_personal <> ?)
            "#,
            params![
                is_transfer_category(&category.name),
                is_personal_category(&category.name),
                user_id,
                category.id,
                is_transfer_category(&category.name),
                is_personal_category(&category.name),
            ],
        )?;
    }
    Ok(())
}

impl Database {
    /// Categories owned by the caller
    pub fn list_categories(&self, ctx: &RequestContext) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        load_categories(&conn, ctx.user_id)
    }

    /// Find a category by name, ignoring case and accents
    pub fn find_category(&self, ctx: &RequestContext, name: &str) -> Result<Option<Category>> {
        let conn = self.conn()?;
        find_category(&conn, ctx.user_id, name)
    }

    /// Create a category; names are unique per user
    pub fn add_category(&self, ctx: &RequestContext, name: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("Category name is required".into()));
        }

        let conn = self.conn()?;
        if find_category(&conn, ctx.user_id, name)?.is_some() {
            return Err(Error::InvalidData(format!(
                "Category '{}' already exists",
                name
            )));
        }

        conn.execute(
            "INSERT INTO categories (user_id, name) VALUES (?, ?)",
            params![ctx.user_id, name],
        )?;

        Ok(Category {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    /// Rename a category and refresh the flags derived from its name
    pub fn rename_category(&self, ctx: &RequestContext, id: i64, name: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("Category name is required".into()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if let Some(other) = find_category(&tx, ctx.user_id, name)? {
            if other.id != id {
                return Err(Error::InvalidData(format!(
                    "Category '{}' already exists",
                    name
                )));
            }
        }

        let updated = tx.execute(
            "UPDATE categories SET name = ? WHERE id = ? AND user_id = ?",
            params![name, id, ctx.user_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Category {}", id)));
        }
        refresh_derived_flags(&tx, ctx.user_id)?;
        tx.commit()?;

        Ok(Category {
            id,
            name: name.to_string(),
        })
    }

    /// Delete a category; its transactions become uncategorized
    pub fn delete_category(&self, ctx: &RequestContext, id: i64) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let affected: Vec<(i64, String)> = {
            let mut stmt = tx.prepare(
                "SELECT id, description FROM transactions WHERE user_id = ? AND category_id = ?",
            )?;
            let rows = stmt
                .query_map(params![ctx.user_id, id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        for (transaction_id, description) in affected {
            tx.execute(
                "UPDATE transactions SET category_id = NULL, is_transfer = ?, is_personal = 0 WHERE id = ?",
                params![is_transfer_transaction(&description, ""), transaction_id],
            )?;
        }
        let deleted = tx.execute(
            "DELETE FROM categories WHERE id = ? AND user_id = ?",
            params![id, ctx.user_id],
        )?;
        tx.commit()?;

        Ok(deleted > 0)
    }
}
