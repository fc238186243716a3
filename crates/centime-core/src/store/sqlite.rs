//! SQLite storage adapter
//!
//! Reference implementation of the [`Storage`] trait over rusqlite. The
//! surrounding application feeds merchant occurrences and verified labels as
//! imports and user confirmations happen; the classifier reads them back
//! through the trait.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{ExpenseNature, KnowledgeEntry};
use crate::store::{Occurrence, Storage, VerifiedLabel};

/// Schema version, bumped with every migration
const SCHEMA_VERSION: i64 = 1;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and migrate) a database file
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// In-memory database, for tests
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock();
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS merchant_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    merchant_key TEXT NOT NULL,
                    date TEXT NOT NULL,
                    amount REAL NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_history_key
                    ON merchant_history(merchant_key, date);

                CREATE TABLE IF NOT EXISTS knowledge_entries (
                    merchant_key TEXT PRIMARY KEY,
                    classification TEXT NOT NULL,
                    confidence REAL NOT NULL,
                    usage_count INTEGER NOT NULL DEFAULT 0,
                    verified_by_user INTEGER NOT NULL DEFAULT 0,
                    last_updated TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS verified_labels (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    label TEXT NOT NULL,
                    classification TEXT NOT NULL
                );",
            )?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            info!(version = SCHEMA_VERSION, "initialized classifier storage schema");
        }

        Ok(())
    }

    /// Record one merchant occurrence; called by the import side of the
    /// surrounding application
    pub fn record_occurrence(&self, merchant_key: &str, date: NaiveDate, amount: f64) -> Result<()> {
        self.lock().execute(
            "INSERT INTO merchant_history (merchant_key, date, amount) VALUES (?1, ?2, ?3)",
            params![merchant_key, date.format("%Y-%m-%d").to_string(), amount],
        )?;
        Ok(())
    }

    /// Record a user-verified label for the n-gram corpus
    pub fn record_verified_label(&self, label: &str, classification: ExpenseNature) -> Result<()> {
        self.lock().execute(
            "INSERT INTO verified_labels (label, classification) VALUES (?1, ?2)",
            params![label, classification.as_str()],
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_nature(s: &str) -> Result<ExpenseNature> {
    s.parse::<ExpenseNature>().map_err(Error::InvalidData)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::InvalidData(format!("bad date {:?}: {}", s, e)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidData(format!("bad timestamp {:?}: {}", s, e)))
}

impl Storage for SqliteStore {
    fn get_transaction_history(&self, merchant_key: &str) -> Result<Vec<Occurrence>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT date, amount FROM merchant_history
             WHERE merchant_key = ?1 ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(params![merchant_key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;

        let mut history = Vec::new();
        for row in rows {
            let (date, amount) = row?;
            history.push(Occurrence {
                date: parse_date(&date)?,
                amount,
            });
        }
        Ok(history)
    }

    fn get_knowledge_entry(&self, merchant_key: &str) -> Result<Option<KnowledgeEntry>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT merchant_key, classification, confidence, usage_count,
                        verified_by_user, last_updated
                 FROM knowledge_entries WHERE merchant_key = ?1",
                params![merchant_key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, bool>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((key, classification, confidence, usage_count, verified, updated)) = row else {
            return Ok(None);
        };

        Ok(Some(KnowledgeEntry {
            merchant_key: key,
            learned_classification: parse_nature(&classification)?,
            confidence,
            usage_count,
            verified_by_user: verified,
            last_updated: parse_timestamp(&updated)?,
        }))
    }

    fn put_knowledge_entry(&self, entry: &KnowledgeEntry) -> Result<()> {
        self.lock().execute(
            "INSERT INTO knowledge_entries
                 (merchant_key, classification, confidence, usage_count,
                  verified_by_user, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(merchant_key) DO UPDATE SET
                 classification = excluded.classification,
                 confidence = excluded.confidence,
                 usage_count = excluded.usage_count,
                 verified_by_user = excluded.verified_by_user,
                 last_updated = excluded.last_updated",
            params![
                entry.merchant_key,
                entry.learned_classification.as_str(),
                entry.confidence,
                entry.usage_count,
                entry.verified_by_user,
                entry.last_updated.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_verified_corpus(&self) -> Result<Vec<VerifiedLabel>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT label, classification FROM verified_labels ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut corpus = Vec::new();
        for row in rows {
            let (label, classification) = row?;
            corpus.push(VerifiedLabel {
                label,
                classification: parse_nature(&classification)?,
            });
        }
        Ok(corpus)
    }
}
