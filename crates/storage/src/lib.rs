//! Sqlite-backed book store and file-backed preference store.

mod preferences;

use std::path::Path;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use libris_core::{BookFormat, BookId, BookMetadata, BookRecord, BookStore};
use rusqlite::{Connection, OptionalExtension as _, Row};

pub use preferences::PreferenceFile;

const SCHEMA_VERSION: i64 = 2;

#[derive(Debug)]
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite db at {}", path.as_ref().display()))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }

        tracing::info!(from = version, to = SCHEMA_VERSION, "upgrading library schema");
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                format TEXT NOT NULL,
                content BLOB NOT NULL,
                last_opened_at INTEGER NOT NULL,
                cover_image TEXT,
                metadata_json TEXT
            );
            "#,
        )?;
        self.conn
            .pragma_update(None, "user_version", SCHEMA_VERSION)
            .context("record schema version")?;
        Ok(())
    }
}

impl BookStore for Storage {
    fn put(&self, record: &BookRecord) -> anyhow::Result<()> {
        let metadata_json = record
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn
            .execute(
                r#"
                INSERT INTO books (id, title, format, content, last_opened_at, cover_image, metadata_json)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    format = excluded.format,
                    content = excluded.content,
                    last_opened_at = excluded.last_opened_at,
                    cover_image = excluded.cover_image,
                    metadata_json = excluded.metadata_json
                "#,
                (
                    record.id.as_str(),
                    &record.title,
                    record.format.as_str(),
                    &record.content,
                    record.last_opened_at.timestamp_millis(),
                    &record.cover_image,
                    metadata_json,
                ),
            )
            .with_context(|| format!("store book {}", record.id))?;
        tracing::debug!(id = %record.id, bytes = record.content.len(), "stored book");
        Ok(())
    }

    fn get(&self, id: &BookId) -> anyhow::Result<Option<BookRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, format, content, last_opened_at, cover_image, metadata_json FROM books WHERE id = ?",
                [id.as_str()],
                RawRecord::from_row,
            )
            .optional()
            .with_context(|| format!("load book {id}"))?;
        row.map(RawRecord::into_record).transpose()
    }

    fn list(&self) -> anyhow::Result<Vec<BookRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, format, content, last_opened_at, cover_image, metadata_json FROM books",
        )?;
        let rows = stmt.query_map([], RawRecord::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_record()?);
        }
        Ok(out)
    }

    fn ids(&self) -> anyhow::Result<Vec<BookId>> {
        let mut stmt = self.conn.prepare("SELECT id FROM books")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|id| id.map(BookId))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn delete(&self, id: &BookId) -> anyhow::Result<()> {
        let removed = self
            .conn
            .execute("DELETE FROM books WHERE id = ?", [id.as_str()])
            .with_context(|| format!("delete book {id}"))?;
        tracing::debug!(id = %id, removed, "deleted book");
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        self.conn
            .execute("DELETE FROM books", [])
            .context("clear books")?;
        Ok(())
    }
}

struct RawRecord {
    id: String,
    title: String,
    format: String,
    content: Vec<u8>,
    last_opened_at: i64,
    cover_image: Option<String>,
    metadata_json: Option<String>,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            format: row.get(2)?,
            content: row.get(3)?,
            last_opened_at: row.get(4)?,
            cover_image: row.get(5)?,
            metadata_json: row.get(6)?,
        })
    }

    fn into_record(self) -> anyhow::Result<BookRecord> {
        let format = self
            .format
            .parse::<BookFormat>()
            .map_err(|err| anyhow::anyhow!("book {}: {err} {:?}", self.id, self.format))?;
        let last_opened_at =
            DateTime::<Utc>::from_timestamp_millis(self.last_opened_at).unwrap_or_default();
        let metadata = match self.metadata_json.as_deref() {
            Some(json) => match serde_json::from_str::<BookMetadata>(json) {
                Ok(metadata) => Some(metadata),
                Err(err) => {
                    tracing::warn!(id = %self.id, error = %err, "ignoring unreadable book metadata");
                    None
                }
            },
            None => None,
        };

        Ok(BookRecord {
            id: BookId(self.id),
            title: self.title,
            format,
            content: self.content,
            last_opened_at,
            cover_image: self.cover_image,
            metadata,
        })
    }
}
