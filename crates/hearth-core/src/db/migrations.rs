//! Versioned schema migrations and schema health
//!
//! Migrations run in order, each inside its own transaction, and are
//! recorded in `schema_version`. A migration lists the tables it must leave
//! behind; if any is missing after its SQL runs, the transaction is rolled
//! back and the error surfaces instead of recording the version.

use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// One schema step
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
    /// Tables that must exist once the step is applied
    pub creates: &'static [&'static str],
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "users_categories",
        sql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, name)
            );

            CREATE INDEX IF NOT EXISTS idx_categories_user ON categories(user_id);
        "#,
        creates: &["users", "categories"],
    },
    Migration {
        version: 2,
        name: "households",
        sql: r#"
            CREATE TABLE IF NOT EXISTS households (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS household_members (
                id INTEGER PRIMARY KEY,
                household_id INTEGER NOT NULL REFERENCES households(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role TEXT NOT NULL DEFAULT 'owner',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(household_id, user_id)
            );

            CREATE INDEX IF NOT EXISTS idx_household_members_user ON household_members(user_id);
        "#,
        creates: &["households", "household_members"],
    },
    Migration {
        version: 3,
        name: "transactions",
        sql: r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                household_id INTEGER NOT NULL REFERENCES households(id),
                date DATE NOT NULL,
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                vendor TEXT NOT NULL DEFAULT '',
                vendor_normalized TEXT NOT NULL DEFAULT '',
                category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
                is_transfer BOOLEAN NOT NULL DEFAULT 0,
                is_personal BOOLEAN NOT NULL DEFAULT 0,
                paid_by TEXT CHECK (paid_by IS NULL OR paid_by IN ('DK', 'YZ')),
                category_confidence INTEGER NOT NULL DEFAULT 25,
                category_source TEXT NOT NULL DEFAULT 'unknown',
                tags TEXT NOT NULL DEFAULT '[]',           -- JSON array of tag labels
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL                   -- optimistic-lock token
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
            CREATE INDEX IF NOT EXISTS idx_transactions_household_date ON transactions(household_id, date);
            CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category_id);
        "#,
        creates: &["transactions"],
    },
    Migration {
        version: 4,
        name: "category_rules",
        sql: r#"
            CREATE TABLE IF NOT EXISTS category_rules (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                key_type TEXT NOT NULL CHECK (key_type IN ('vendor', 'description')),
                pattern TEXT NOT NULL,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                priority INTEGER NOT NULL DEFAULT 100,
                hits INTEGER NOT NULL DEFAULT 0,
                source TEXT NOT NULL,                      -- manual_edit, import_override
                is_enabled BOOLEAN NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                last_used_at DATETIME,
                UNIQUE(user_id, key_type, pattern)
            );

            CREATE INDEX IF NOT EXISTS idx_category_rules_lookup
                ON category_rules(user_id, key_type, is_enabled);
        "#,
        creates: &["category_rules"],
    },
    Migration {
        version: 5,
        name: "import_staging",
        sql: r#"
            CREATE TABLE IF NOT EXISTS import_staging (
                id INTEGER PRIMARY KEY,
                import_id TEXT NOT NULL,
                household_id INTEGER NOT NULL REFERENCES households(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                row_index INTEGER NOT NULL,
                row_json TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'preview',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                expires_at DATETIME NOT NULL,
                UNIQUE(import_id, row_index)
            );

            CREATE INDEX IF NOT EXISTS idx_import_staging_import ON import_staging(import_id);
            CREATE INDEX IF NOT EXISTS idx_import_staging_expires ON import_staging(expires_at);
        "#,
        creates: &["import_staging"],
    },
    Migration {
        version: 6,
        name: "settlement_payments",
        sql: r#"
            CREATE TABLE IF NOT EXISTS settlement_payments (
                id INTEGER PRIMARY KEY,
                household_id INTEGER NOT NULL REFERENCES households(id) ON DELETE CASCADE,
                date DATE NOT NULL,
                from_person TEXT NOT NULL CHECK (from_person IN ('DK', 'YZ')),
                to_person TEXT NOT NULL CHECK (to_person IN ('DK', 'YZ')),
                amount REAL NOT NULL CHECK (amount > 0),
                note TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                CHECK (from_person <> to_person)
            );

            CREATE INDEX IF NOT EXISTS idx_settlement_payments_household_date
                ON settlement_payments(household_id, date);
        "#,
        creates: &["settlement_payments"],
    },
    Migration {
        version: 7,
        name: "column_mappings_audit_log",
        sql: r#"
            CREATE TABLE IF NOT EXISTS column_mappings (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                file_signature TEXT NOT NULL,
                mapping_json TEXT NOT NULL,
                detected_format TEXT NOT NULL,
                has_header BOOLEAN NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, file_signature)
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                household_id INTEGER REFERENCES households(id) ON DELETE CASCADE,
                user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                action TEXT NOT NULL,
                entity_type TEXT,
                entity_id INTEGER,
                details TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_household ON audit_log(household_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_log_action ON audit_log(action);
        "#,
        creates: &["column_mappings", "audit_log"],
    },
];

/// Columns every table must carry
const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("users", &["id", "name"]),
    ("categories", &["id", "user_id", "name"]),
    ("households", &["id", "name"]),
    ("household_members", &["household_id", "user_id", "role"]),
    (
        "transactions",
        &[
            "id",
            "user_id",
            "household_id",
            "date",
            "amount",
            "description",
            "vendor",
            "category_id",
            "is_transfer",
            "is_personal",
            "paid_by",
            "category_confidence",
            "category_source",
            "tags",
            "updated_at",
        ],
    ),
    (
        "category_rules",
        &[
            "id",
            "user_id",
            "key_type",
            "pattern",
            "category_id",
            "priority",
            "hits",
            "source",
            "is_enabled",
            "last_used_at",
        ],
    ),
    (
        "import_staging",
        &["import_id", "household_id", "user_id", "row_index", "row_json", "created_at", "expires_at"],
    ),
    (
        "settlement_payments",
        &["id", "household_id", "date", "from_person", "to_person", "amount", "note"],
    ),
    (
        "column_mappings",
        &["user_id", "file_signature", "mapping_json", "detected_format", "has_header"],
    ),
    ("audit_log", &["id", "timestamp", "action", "details"]),
];

const REQUIRED_INDEXES: &[&str] = &[
    "idx_categories_user",
    "idx_household_members_user",
    "idx_transactions_date",
    "idx_transactions_household_date",
    "idx_category_rules_lookup",
    "idx_import_staging_import",
    "idx_import_staging_expires",
    "idx_settlement_payments_household_date",
    "idx_audit_log_household",
];

/// Result of comparing the live schema against what the code needs
#[derive(Debug, Clone, Serialize)]
pub struct SchemaHealth {
    pub ok: bool,
    pub schema_version: i64,
    pub missing_tables: Vec<String>,
    /// `table.column`
    pub missing_columns: Vec<String>,
    pub missing_indexes: Vec<String>,
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn index_exists(conn: &Connection, index: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?",
        params![index],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?)")?;
    let columns = stmt
        .query_map(params![table], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(columns)
}

pub(crate) fn current_version(conn: &Connection) -> Result<i64> {
    if !table_exists(conn, "schema_version")? {
        return Ok(0);
    }
    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Apply every migration newer than the recorded version
pub(crate) fn apply(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )?;

    let current = current_version(conn)?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;

        for table in migration.creates {
            if !table_exists(&tx, table)? {
                return Err(Error::InvalidData(format!(
                    "Migration {} ({}) did not create table {}",
                    migration.version, migration.name, table
                )));
            }
        }

        tx.execute(
            "INSERT INTO schema_version (version, name) VALUES (?, ?)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
        info!(
            "Applied migration {} ({})",
            migration.version, migration.name
        );
    }

    debug!("Schema at version {}", current_version(conn)?);
    Ok(())
}

/// Compare the live schema with the required tables, columns and indexes
pub(crate) fn schema_health(conn: &Connection) -> Result<SchemaHealth> {
    let mut missing_tables = Vec::new();
    let mut missing_columns = Vec::new();
    let mut missing_indexes = Vec::new();

    for (table, columns) in REQUIRED_COLUMNS {
        if !table_exists(conn, table)? {
            missing_tables.push(table.to_string());
            continue;
        }
        let present = table_columns(conn, table)?;
        for column in *columns {
            if !present.iter().any(|c| c == column) {
                missing_columns.push(format!("{}.{}", table, column));
            }
        }
    }

    for index in REQUIRED_INDEXES {
        if !index_exists(conn, index)? {
            missing_indexes.push(index.to_string());
        }
    }

    Ok(SchemaHealth {
        ok: missing_tables.is_empty() && missing_columns.is_empty() && missing_indexes.is_empty(),
        schema_version: current_version(conn)?,
        missing_tables,
        missing_columns,
        missing_indexes,
    })
}
