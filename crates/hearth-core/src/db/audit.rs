//! Audit log operations

use rusqlite::{params, Connection};

use super::{AuditEntry, Database};
use crate::context::RequestContext;
use crate::error::Result;

/// Append an audit event inside the caller's transaction
pub(crate) fn log_audit(
    conn: &Connection,
    ctx: &RequestContext,
    action: &str,
    entity_type: Option<&str>,
    entity_id: Option<i64>,
    details: Option<&str>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO audit_log (household_id, user_id, action, entity_type, entity_id, details)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![ctx.household_id, ctx.user_id, action, entity_type, entity_id, details],
    )?;

    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Log an audit event
    pub fn log_audit(
        &self,
        ctx: &RequestContext,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<i64>,
        details: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        log_audit(&conn, ctx, action, entity_type, entity_id, details)
    }

    /// Recent audit entries for the caller's household, newest first
    pub fn list_audit_log(&self, ctx: &RequestContext, limit: i64) -> Result<Vec<AuditEntry>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT a.id, a.timestamp, a.household_id, u.name, a.action,
                   a.entity_type, a.entity_id, a.details
            FROM audit_log a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE a.household_id = ?
            ORDER BY a.timestamp DESC, a.id DESC
            LIMIT ?
            "#,
        )?;

        let entries = stmt
            .query_map(params![ctx.household_id, limit], |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    household_id: row.get(2)?,
                    user_name: row.get(3)?,
                    action: row.get(4)?,
                    entity_type: row.get(5)?,
                    entity_id: row.get(6)?,
                    details: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}
