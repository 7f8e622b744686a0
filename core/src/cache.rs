use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use crate::models::Recipe;

/// Key under which the whole recipe collection is stored.
pub const RECIPES_KEY: &str = "recipes";

/// Durable on-device key/value slot holding the last known recipe collection.
pub struct LocalCache {
    conn: Connection,
}

impl LocalCache {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open cache: {}", path.display()))?;
        let cache = LocalCache { conn };
        cache.migrate()?;
        Ok(cache)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = LocalCache { conn };
        cache.migrate()?;
        Ok(cache)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Raw slot access ---

    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn delete_raw(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    // --- Recipe collection ---

    /// The cached collection, or `None` when nothing usable is stored.
    /// Unreadable or malformed content counts as a miss.
    #[must_use]
    pub fn load(&self) -> Option<Vec<Recipe>> {
        let raw = match self.get_raw(RECIPES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "failed to read recipe cache");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(recipes) => Some(recipes),
            Err(e) => {
                warn!(error = %e, "ignoring malformed recipe cache");
                None
            }
        }
    }

    /// Overwrite the cached collection as a whole.
    pub fn save(&self, recipes: &[Recipe]) -> Result<()> {
        let json = serde_json::to_string(recipes).context("Failed to serialize recipes")?;
        self.set_raw(RECIPES_KEY, &json)
            .context("Failed to write recipe cache")
    }

    pub fn clear(&self) -> Result<bool> {
        self.delete_raw(RECIPES_KEY)
    }
}
