//! SQLite journal store for kernel events.
//!
//! The journal is diagnostic history, not authority: the kernel never reads
//! it back to reconstruct state (locks on vehicles are the source of truth).

use std::fmt;
use std::path::Path;

use contracts::Event;
use rusqlite::{params, Connection};

#[derive(Debug)]
pub enum PersistenceError {
    NotAttached,
    Sqlite(rusqlite::Error),
    Encoding(serde_json::Error),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::NotAttached => write!(f, "persistence store is not attached"),
            PersistenceError::Sqlite(err) => write!(f, "sqlite error: {err}"),
            PersistenceError::Encoding(err) => write!(f, "event encoding error: {err}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encoding(value)
    }
}

#[derive(Debug)]
pub struct SqliteJournal {
    connection: Connection,
}

impl SqliteJournal {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let connection = Connection::open(path)?;
        Self::init(&connection)?;
        Ok(Self { connection })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let connection = Connection::open_in_memory()?;
        Self::init(&connection)?;
        Ok(Self { connection })
    }

    fn init(connection: &Connection) -> Result<(), PersistenceError> {
        connection.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                sequence   INTEGER PRIMARY KEY,
                tick       INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                event_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_tick ON events (tick);",
        )?;
        Ok(())
    }

    /// Append events idempotently; an already-persisted sequence is
    /// overwritten with identical content.
    pub fn append_events(&mut self, events: &[Event]) -> Result<(), PersistenceError> {
        if events.is_empty() {
            return Ok(());
        }
        let tx = self.connection.transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO events (sequence, tick, event_type, event_json)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for event in events {
                let type_label = serde_json::to_value(event.event_type)?
                    .as_str()
                    .unwrap_or("unknown")
                    .to_string();
                let event_json = serde_json::to_string(event)?;
                insert.execute(params![
                    event.sequence as i64,
                    event.tick as i64,
                    type_label,
                    event_json
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Events with sequence strictly greater than `sequence`, in order.
    pub fn load_events_since(&self, sequence: u64) -> Result<Vec<Event>, PersistenceError> {
        let mut statement = self
            .connection
            .prepare("SELECT event_json FROM events WHERE sequence > ?1 ORDER BY sequence")?;
        let rows = statement.query_map(params![sequence as i64], |row| {
            row.get::<_, String>(0)
        })?;

        let mut events = Vec::new();
        for raw in rows {
            events.push(serde_json::from_str(&raw?)?);
        }
        Ok(events)
    }

    pub fn event_count(&self) -> Result<usize, PersistenceError> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
