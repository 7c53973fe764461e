//! Saved column mappings, keyed by file signature

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::Database;
use crate::context::RequestContext;
use crate::error::Result;
use crate::format::{ColumnMapping, DetectedFormat, FormatDetection};

/// The mapping last used for files with a given signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedMapping {
    pub file_signature: String,
    pub mapping: ColumnMapping,
    pub detected_format: DetectedFormat,
    pub has_header: bool,
    pub updated_at: String,
}

pub(crate) fn load_column_mapping(
    conn: &Connection,
    user_id: i64,
    file_signature: &str,
) -> Result<Option<SavedMapping>> {
    let row: Option<(String, String, bool, String)> = conn
        .query_row(
            r#"
            SELECT mapping_json, detected_format, has_header, updated_at
            FROM column_mappings
            WHERE user_id = ? AND file_signature = ?
            "#,
            params![user_id, file_signature],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let Some((mapping_json, format, has_header, updated_at)) = row else {
        return Ok(None);
    };

    Ok(Some(SavedMapping {
        file_signature: file_signature.to_string(),
        mapping: serde_json::from_str(&mapping_json)?,
        detected_format: format.parse().unwrap_or(DetectedFormat::Header),
        has_header,
        updated_at,
    }))
}

pub(crate) fn save_column_mapping(
    conn: &Connection,
    user_id: i64,
    file_signature: &str,
    detection: &FormatDetection,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO column_mappings (user_id, file_signature, mapping_json, detected_format, has_header)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(user_id, file_signature) DO UPDATE SET
            mapping_json = excluded.mapping_json,
            detected_format = excluded.detected_format,
            has_header = excluded.has_header,
            updated_at = CURRENT_TIMESTAMP
        "#,
        params![
            user_id,
            file_signature,
            serde_json::to_string(&detection.mapping)?,
            detection.format.as_str(),
            detection.has_header,
        ],
    )?;
    Ok(())
}

impl Database {
    /// Mapping saved for a file signature, if any
    pub fn get_column_mapping(
        &self,
        ctx: &RequestContext,
        file_signature: &str,
    ) -> Result<Option<SavedMapping>> {
        let conn = self.conn()?;
        load_column_mapping(&conn, ctx.user_id, file_signature)
    }
}
