//! SQLite key-value store for operator notes
//!
//! The only durable client-side state is free-text behavioural notes, stored
//! under `insights_{horseId}` with no expiry and no sync back to the server.

mod insights;
mod migrations;

use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Open (or create) the database at `path`
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::from_connection(conn)
    }

    /// Open a throwaway in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ========== Key-Value Methods ==========

    /// Read a raw value
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        insights::get_value(&conn, key)
    }

    /// Insert or replace a raw value
    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        insights::set_value(&conn, key, value)
    }

    /// Remove a value; returns whether it existed
    pub fn delete_value(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        insights::delete_value(&conn, key)
    }

    // ========== Insights Methods ==========

    /// Saved behavioural notes for a horse
    pub fn get_insights(&self, horse_id: &str) -> Result<Option<String>> {
        self.get_value(&insights::insights_key(horse_id))
    }

    /// Save behavioural notes for a horse
    pub fn save_insights(&self, horse_id: &str, text: &str) -> Result<()> {
        self.set_value(&insights::insights_key(horse_id), text)
    }

    /// Drop saved notes for a horse
    pub fn clear_insights(&self, horse_id: &str) -> Result<bool> {
        self.delete_value(&insights::insights_key(horse_id))
    }
}
