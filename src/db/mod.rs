mod schema;
pub mod albums;
pub mod processed;

use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;

use crate::error::Result;

pub use albums::{
    Album, AlbumLookup, AlbumUpdate, EnrichField, Enrichment, NewAlbum, SearchCriteria, SortKey,
    StoreFingerprint,
};
pub use schema::{ALBUM_MIGRATIONS, SCHEMA};

/// The record store: a single SQLite file holding albums and processed images.
pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Create tables if absent and add any missing columns. Safe on every startup.
    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        self.run_migrations()?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        let existing: HashSet<String> = {
            let mut stmt = self.conn.prepare("PRAGMA table_info(albums)")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<rusqlite::Result<_>>()?;
            names
        };

        for (column, declaration) in ALBUM_MIGRATIONS {
            if !existing.contains(*column) {
                self.conn.execute(
                    &format!("ALTER TABLE albums ADD COLUMN {} {}", column, declaration),
                    [],
                )?;
                tracing::info!("Added missing column albums.{}", column);
            }
        }
        Ok(())
    }
}

pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
