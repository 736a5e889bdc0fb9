//! Key-value rows backing behavioural insights

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// Storage key for a horse's notes
pub fn insights_key(horse_id: &str) -> String {
    format!("insights_{}", horse_id)
}

pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| row.get(0))
        .optional()?;

    Ok(value)
}

pub fn set_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value],
    )?;

    Ok(())
}

pub fn delete_value(conn: &Connection, key: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM kv_store WHERE key = ?", [key])?;
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insights_key_format() {
        assert_eq!(insights_key("h1"), "insights_h1");
    }
}
