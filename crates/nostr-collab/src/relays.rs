//! User-selected relay list persisted in SQLite.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::config::DEFAULT_RELAYS;
use crate::events::unix_timestamp;
use crate::Error;

/// Handle to the relay list; open once per process and pass it around.
#[derive(Clone)]
pub struct RelayStore {
    db: Arc<Mutex<Connection>>,
}

impl RelayStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, Error> {
        init_schema(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// `false` when the relay was already present.
    pub fn add(&self, url: &str) -> Result<bool, Error> {
        let url = normalize_relay_url(url)?;
        let conn = self.db.lock().map_err(|_| Error::MutexPoisoned)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO relays (url, added_at) VALUES (?1, ?2)",
            params![&url, unix_timestamp() as i64],
        )?;
        if inserted > 0 {
            info!(url = %url, "Added relay");
        }
        Ok(inserted > 0)
    }

    /// `false` when the relay was not in the list.
    pub fn remove(&self, url: &str) -> Result<bool, Error> {
        let url = normalize_relay_url(url)?;
        let conn = self.db.lock().map_err(|_| Error::MutexPoisoned)?;
        let removed = conn.execute("DELETE FROM relays WHERE url = ?1", params![&url])?;
        Ok(removed > 0)
    }

    /// Clears the list so the defaults apply again.
    pub fn reset(&self) -> Result<(), Error> {
        let conn = self.db.lock().map_err(|_| Error::MutexPoisoned)?;
        conn.execute("DELETE FROM relays", [])?;
        info!("Reset relay list to defaults");
        Ok(())
    }

    /// Stored relays in insertion order.
    pub fn list(&self) -> Result<Vec<String>, Error> {
        let conn = self.db.lock().map_err(|_| Error::MutexPoisoned)?;
        let mut stmt = conn.prepare("SELECT url FROM relays ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut relays = Vec::new();
        for row in rows {
            relays.push(row?);
        }
        Ok(relays)
    }

    pub fn contains(&self, url: &str) -> Result<bool, Error> {
        let url = normalize_relay_url(url)?;
        let conn = self.db.lock().map_err(|_| Error::MutexPoisoned)?;
        let found = conn
            .query_row("SELECT 1 FROM relays WHERE url = ?1", params![&url], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// The stored list, or [`DEFAULT_RELAYS`] when it is empty.
    pub fn effective(&self) -> Result<Vec<String>, Error> {
        let relays = self.list()?;
        if relays.is_empty() {
            return Ok(DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect());
        }
        Ok(relays)
    }
}

/// Trims, drops trailing slashes and requires a `ws://` or `wss://` scheme.
pub fn normalize_relay_url(url: &str) -> Result<String, Error> {
    let trimmed = url.trim().trim_end_matches('/');
    let lower = trimmed.to_ascii_lowercase();
    let host = lower
        .strip_prefix("wss://")
        .or_else(|| lower.strip_prefix("ws://"))
        .ok_or_else(|| Error::InvalidRelayUrl(url.to_string()))?;
    if host.is_empty() {
        return Err(Error::InvalidRelayUrl(url.to_string()));
    }
    Ok(trimmed.to_string())
}

fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS relays (\
            url TEXT PRIMARY KEY,\
            added_at INTEGER NOT NULL\
        );",
    )?;
    Ok(())
}
