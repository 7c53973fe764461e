//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `migrations` - Versioned schema and schema health
//! - `households` - Users, households, request context resolution
//! - `categories` - Category seeding, legacy remapping, lookups
//! - `rules` - Learned categorization rules
//! - `transactions` - Transaction CRUD and bulk actions
//! - `staging` - Import preview, staged edits, confirm
//! - `mappings` - Saved column mappings per file signature
//! - `settlement` - Settlement aggregates and repayments
//! - `audit` - Audit log

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::Serialize;

use crate::error::Result;

mod audit;
mod categories;
mod households;
mod mappings;
mod migrations;
mod reports;
mod rules;
mod settlement;
mod staging;
mod transactions;

pub(crate) use categories::category_names;
pub(crate) use rules::resolve_learned_category;

pub use households::HouseholdMember;
pub use mappings::SavedMapping;
pub use migrations::{SchemaHealth, MIGRATIONS};
pub use rules::LearnedPattern;
pub use staging::{ConfirmOptions, ImportPreview, ImportSummary, PreviewOptions, StagedEdit, StagedRow};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Read a DK/YZ column, failing on any other code
pub(crate) fn party_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<crate::models::Party> {
    let code: String = row.get(idx)?;
    code.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

/// Fresh optimistic-lock token, strictly later than `previous`
///
/// Tokens are RFC 3339 UTC timestamps with microseconds, so two edits in the
/// same second still get distinct values.
pub(crate) fn next_updated_at(previous: Option<&str>) -> String {
    let mut now = Utc::now();
    if let Some(prev) = previous.and_then(|p| DateTime::parse_from_rfc3339(p).ok()) {
        let prev = prev.with_timezone(&Utc);
        if now <= prev {
            now = prev + Duration::microseconds(1);
        }
    }
    now.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) a database file and bring its schema up to date
    pub fn new(path: &str) -> Result<Self> {
        // Pragmas are per-connection, so set them on every pooled connection
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                r#"
                PRAGMA foreign_keys = ON;
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA temp_store = MEMORY;
                "#,
            )
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Create a throwaway database for tests
    ///
    /// Each call gets its own temp file so pooled connections share state.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir()
            .join(format!("hearth_test_{}_{}.db", std::process::id(), id))
            .to_string_lossy()
            .into_owned();

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn()?;
        migrations::apply(&mut conn)
    }

    /// Report missing tables, columns and indexes
    pub fn schema_health(&self) -> Result<SchemaHealth> {
        let conn = self.conn()?;
        migrations::schema_health(&conn)
    }
}

/// Audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub household_id: Option<i64>,
    pub user_name: Option<String>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
}
