//! SQLite persistence for generation history.
//!
//! Every generation attempt lands in a single `command_history` table. Rows
//! are append-only apart from the `favorite` flag and explicit deletes.
//! Deleting a row never touches rows whose `parent_id` points at it, so
//! continuation links may dangle.

use crate::{Result, TellError};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;
use tell_types::{CommandResponse, HistoryEntry, LlmUsage};

const SELECT_COLUMNS: &str = r#"
    SELECT id, timestamp, prompt, command, details, show_details, error_message,
           model, input_tokens, output_tokens, favorite, parent_id
    FROM command_history
"#;

/// Format SQLite uses for `CURRENT_TIMESTAMP`.
const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Connection tuning for the history database.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long to wait on a lock held by another `tell` process.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

/// Filters for [`HistoryStore::list`].
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    pub limit: usize,
    pub offset: usize,
    pub favorites_only: bool,
    /// Case-sensitive substring matched against prompt or command.
    /// Empty means no filter.
    pub search: String,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
            favorites_only: false,
            search: String::new(),
        }
    }
}

impl HistoryFilter {
    /// Filter for a listing that may carry a search query. A query that is
    /// present but empty is rejected, as in [`HistoryStore::search`].
    pub fn with_query(
        query: Option<&str>,
        limit: usize,
        offset: usize,
        favorites_only: bool,
    ) -> Result<Self> {
        let search = match query {
            Some("") => {
                return Err(TellError::InvalidArgument(
                    "search query cannot be empty".into(),
                ));
            }
            Some(q) => q.to_string(),
            None => String::new(),
        };
        Ok(Self {
            limit,
            offset,
            favorites_only,
            search,
        })
    }
}

/// SQLite-backed history of generation attempts.
pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path, options: &StoreOptions) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!(target: "tell::history", "Opening history database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.busy_timeout(options.busy_timeout)?;
        Self::from_connection(conn)
    }

    /// Open a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.init_schema()?;
        store.migrate()?;
        Ok(store)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS command_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                prompt TEXT NOT NULL,
                command TEXT NOT NULL,
                details TEXT,
                show_details BOOLEAN DEFAULT 0,
                error_message TEXT,
                model TEXT,
                input_tokens INTEGER DEFAULT 0,
                output_tokens INTEGER DEFAULT 0,
                favorite BOOLEAN DEFAULT 0,
                parent_id INTEGER NULL REFERENCES command_history(id)
            );

            CREATE INDEX IF NOT EXISTS idx_command_history_prompt ON command_history(prompt);
            CREATE INDEX IF NOT EXISTS idx_command_history_command ON command_history(command);
            CREATE INDEX IF NOT EXISTS idx_command_history_timestamp ON command_history(timestamp);
            "#,
        )?;
        Ok(())
    }

    /// Bring databases created before continuation support up to date.
    fn migrate(&self) -> Result<()> {
        let has_parent_id: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('command_history') WHERE name = 'parent_id'",
                [],
                |row| row.get(0),
            )?;

        if !has_parent_id {
            tracing::info!(target: "tell::history", "Adding parent_id column to command_history");
            self.conn.execute_batch(
                "ALTER TABLE command_history ADD COLUMN parent_id INTEGER NULL REFERENCES command_history(id);",
            )?;
        }

        Ok(())
    }

    /// Record one generation attempt and return its id.
    ///
    /// A missing `response` stores an empty command; missing `usage` stores
    /// an empty model and zero token counts.
    pub fn add(
        &self,
        prompt: &str,
        response: Option<&CommandResponse>,
        usage: Option<&LlmUsage>,
        error_message: Option<&str>,
        parent_id: Option<i64>,
    ) -> Result<i64> {
        if prompt.trim().is_empty() {
            return Err(TellError::InvalidArgument("prompt cannot be empty".into()));
        }

        let (command, details, show_details) = match response {
            Some(r) => (r.command.as_str(), r.details.as_str(), r.show_details),
            None => ("", "", false),
        };
        let (model, input_tokens, output_tokens) = match usage {
            Some(u) => (u.model.as_str(), u.input_tokens, u.output_tokens),
            None => ("", 0, 0),
        };
        let error_message = error_message.filter(|msg| !msg.is_empty());

        self.conn.execute(
            r#"
            INSERT INTO command_history (
                prompt, command, details, show_details, error_message,
                model, input_tokens, output_tokens, parent_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                prompt,
                command,
                details,
                show_details,
                error_message,
                model,
                input_tokens as i64,
                output_tokens as i64,
                parent_id,
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        tracing::debug!(
            target: "tell::history",
            "Added history entry {} (failed: {}, parent: {:?})",
            id,
            error_message.is_some(),
            parent_id
        );
        Ok(id)
    }

    /// Get an entry by id.
    pub fn get(&self, id: i64) -> Result<HistoryEntry> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], Self::row_to_entry)
            .optional()?
            .ok_or(TellError::EntryNotFound(id))
    }

    /// List entries, newest first.
    pub fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut args: Vec<Value> = Vec::new();

        if filter.favorites_only {
            sql.push_str(" AND favorite = 1");
        }

        // instr() is case-sensitive and needs no wildcard escaping, unlike LIKE
        if !filter.search.is_empty() {
            sql.push_str(" AND (instr(prompt, ?) > 0 OR instr(command, ?) > 0)");
            args.push(Value::Text(filter.search.clone()));
            args.push(Value::Text(filter.search.clone()));
        }

        sql.push_str(" ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?");
        args.push(Value::Integer(to_sql_count(filter.limit)));
        args.push(Value::Integer(to_sql_count(filter.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(args.iter()), Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Search prompts and commands for a substring.
    pub fn search(&self, term: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        if term.is_empty() {
            return Err(TellError::InvalidArgument(
                "search query cannot be empty".into(),
            ));
        }

        self.list(&HistoryFilter {
            limit,
            offset: 0,
            favorites_only: false,
            search: term.to_string(),
        })
    }

    /// Mark or unmark an entry as favorite.
    pub fn set_favorite(&self, id: i64, favorite: bool) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE command_history SET favorite = ?1 WHERE id = ?2",
            params![favorite, id],
        )?;
        if updated == 0 {
            return Err(TellError::EntryNotFound(id));
        }
        Ok(())
    }

    /// Delete an entry. Children keep their now-dangling `parent_id`.
    pub fn delete(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM command_history WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(TellError::EntryNotFound(id));
        }
        tracing::debug!(target: "tell::history", "Deleted history entry {}", id);
        Ok(())
    }

    /// The latest entry with a command and no recorded error.
    pub fn most_recent_successful(&self) -> Result<HistoryEntry> {
        let sql = format!(
            "{SELECT_COLUMNS}
            WHERE command <> '' AND (error_message IS NULL OR error_message = '')
            ORDER BY timestamp DESC, id DESC
            LIMIT 1"
        );
        self.conn
            .query_row(&sql, [], Self::row_to_entry)
            .optional()?
            .ok_or(TellError::NoSuccessfulEntry)
    }

    /// Total number of recorded attempts.
    pub fn count(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM command_history", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<HistoryEntry> {
        let timestamp: Option<String> = row.get("timestamp")?;
        let timestamp = match timestamp {
            Some(raw) => parse_timestamp(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
            })?,
            None => DateTime::<Utc>::default(),
        };
        let input_tokens: Option<i64> = row.get("input_tokens")?;
        let output_tokens: Option<i64> = row.get("output_tokens")?;

        Ok(HistoryEntry {
            id: row.get("id")?,
            timestamp,
            prompt: row.get("prompt")?,
            command: row.get("command")?,
            details: row.get::<_, Option<String>>("details")?.unwrap_or_default(),
            show_details: row.get::<_, Option<bool>>("show_details")?.unwrap_or(false),
            error_message: row
                .get::<_, Option<String>>("error_message")?
                .filter(|msg| !msg.is_empty()),
            model: row.get::<_, Option<String>>("model")?.unwrap_or_default(),
            input_tokens: input_tokens.unwrap_or(0).max(0) as u64,
            output_tokens: output_tokens.unwrap_or(0).max(0) as u64,
            favorite: row.get::<_, Option<bool>>("favorite")?.unwrap_or(false),
            parent_id: row.get("parent_id")?,
        })
    }
}

/// Parse a stored timestamp. Rows written by SQLite use `CURRENT_TIMESTAMP`
/// (UTC, second precision); RFC 3339 is accepted for imported rows.
fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    match NaiveDateTime::parse_from_str(raw, SQLITE_TIMESTAMP_FORMAT) {
        Ok(naive) => Ok(naive.and_utc()),
        Err(e) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| e),
    }
}

/// SQLite takes signed integers for LIMIT/OFFSET.
fn to_sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
