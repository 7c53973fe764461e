//! Users, households and request context resolution

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use super::categories::ensure_default_categories;
use super::Database;
use crate::context::{EngineOptions, RequestContext};
use crate::error::{Error, Result};

/// A member of a household
#[derive(Debug, Clone, Serialize)]
pub struct HouseholdMember {
    pub user_id: i64,
    pub user_name: String,
    pub role: String,
}

fn ensure_user(conn: &Connection, user_name: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO users (name) VALUES (?)",
        params![user_name],
    )?;
    let id = conn.query_row(
        "SELECT id FROM users WHERE name = ?",
        params![user_name],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn household_of(conn: &Connection, user_id: i64) -> Result<Option<i64>> {
    let household_id = conn
        .query_row(
            "SELECT household_id FROM household_members WHERE user_id = ? ORDER BY id LIMIT 1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(household_id)
}

impl Database {
    /// Resolve who is acting and in which household
    ///
    /// Creates the user on first use, enrolls them as the owner of a new
    /// household if they belong to none, and makes sure their default
    /// categories exist.
    pub fn request_context(&self, user_name: &str, options: EngineOptions) -> Result<RequestContext> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(Error::InvalidData("User name is required".into()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let user_id = ensure_user(&tx, user_name)?;
        let household_id = match household_of(&tx, user_id)? {
            Some(id) => id,
            None => {
                tx.execute(
                    "INSERT INTO households (name) VALUES (?)",
                    params![format!("{}'s household", user_name)],
                )?;
                let household_id = tx.last_insert_rowid();
                tx.execute(
                    "INSERT INTO household_members (household_id, user_id, role) VALUES (?, ?, 'owner')",
                    params![household_id, user_id],
                )?;
                info!("Created household {} for {}", household_id, user_name);
                household_id
            }
        };

        ensure_default_categories(&tx, user_id)?;
        tx.commit()?;

        Ok(RequestContext {
            user_id,
            user_name: user_name.to_string(),
            household_id,
            options,
        })
    }

    /// Add another user to the caller's household
    ///
    /// The user must not already belong to a different household.
    pub fn add_household_member(&self, ctx: &RequestContext, user_name: &str) -> Result<HouseholdMember> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(Error::InvalidData("User name is required".into()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let user_id = ensure_user(&tx, user_name)?;
        match household_of(&tx, user_id)? {
            Some(existing) if existing == ctx.household_id => {}
            Some(_) => {
                return Err(Error::InvalidData(format!(
                    "{} already belongs to another household",
                    user_name
                )))
            }
            None => {
                tx.execute(
                    "INSERT INTO household_members (household_id, user_id, role) VALUES (?, ?, 'member')",
                    params![ctx.household_id, user_id],
                )?;
                ensure_default_categories(&tx, user_id)?;
                info!("Added {} to household {}", user_name, ctx.household_id);
            }
        }

        let role: String = tx.query_row(
            "SELECT role FROM household_members WHERE household_id = ? AND user_id = ?",
            params![ctx.household_id, user_id],
            |row| row.get(0),
        )?;
        tx.commit()?;

        Ok(HouseholdMember {
            user_id,
            user_name: user_name.to_string(),
            role,
        })
    }

    /// Members of the caller's household
    pub fn household_members(&self, ctx: &RequestContext) -> Result<Vec<HouseholdMember>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT u.id, u.name, hm.role
            FROM household_members hm
            JOIN users u ON u.id = hm.user_id
            WHERE hm.household_id = ?
            ORDER BY hm.id
            "#,
        )?;

        let members = stmt
            .query_map(params![ctx.household_id], |row| {
                Ok(HouseholdMember {
                    user_id: row.get(0)?,
                    user_name: row.get(1)?,
                    role: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(members)
    }
}
