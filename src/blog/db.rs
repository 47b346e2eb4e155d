use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction, params};
use tracing::error;

use crate::errors::ServiceError;

/// Preference key holding the default editor type for new pages.
pub const EDITOR_TYPE_SETTING: &str = "editorType";

/// Async-safe handle to the blog database.
///
/// Wraps `SoloDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O
/// never ties up async worker threads. The mutex also serializes writers,
/// which is what makes "check permalink uniqueness, then write" atomic.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<SoloDb>>,
}

impl DbHandle {
    pub fn new(db: SoloDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R, ServiceError>
    where
        F: FnOnce(&SoloDb) -> Result<R, ServiceError> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| ServiceError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct SoloDb {
    conn: Connection,
}

impl SoloDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS pages (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL DEFAULT '',
                    page_order INTEGER NOT NULL,
                    permalink TEXT NOT NULL,
                    comment_count INTEGER NOT NULL DEFAULT 0,
                    commentable INTEGER NOT NULL DEFAULT 1,
                    page_type TEXT NOT NULL DEFAULT 'page',
                    editor_type TEXT NOT NULL DEFAULT '',
                    icon TEXT NOT NULL DEFAULT '',
                    open_target TEXT NOT NULL DEFAULT ''
                );

                CREATE TABLE IF NOT EXISTS articles (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    abstract TEXT NOT NULL DEFAULT '',
                    content TEXT NOT NULL DEFAULT '',
                    permalink TEXT NOT NULL,
                    published INTEGER NOT NULL DEFAULT 0,
                    had_been_published INTEGER NOT NULL DEFAULT 0,
                    top INTEGER NOT NULL DEFAULT 0,
                    tags TEXT NOT NULL DEFAULT '',
                    author_id TEXT NOT NULL,
                    commentable INTEGER NOT NULL DEFAULT 1,
                    view_pwd TEXT NOT NULL DEFAULT '',
                    comment_count INTEGER NOT NULL DEFAULT 0,
                    created TEXT NOT NULL,
                    updated TEXT NOT NULL
                );

                -- Reply linkage columns stay nullable: rows written before
                -- replies existed carry NULL until the next permalink cascade.
                CREATE TABLE IF NOT EXISTS comments (
                    id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    owner_type TEXT NOT NULL,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL DEFAULT '',
                    url TEXT NOT NULL DEFAULT '',
                    content TEXT NOT NULL,
                    created TEXT NOT NULL,
                    sharp_url TEXT NOT NULL,
                    original_comment_id TEXT,
                    original_comment_name TEXT
                );

                CREATE TABLE IF NOT EXISTS statistic (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    blog_article_count INTEGER NOT NULL DEFAULT 0,
                    published_blog_article_count INTEGER NOT NULL DEFAULT 0,
                    blog_comment_count INTEGER NOT NULL DEFAULT 0,
                    published_blog_comment_count INTEGER NOT NULL DEFAULT 0
                );
                INSERT OR IGNORE INTO statistic (id) VALUES (1);

                CREATE TABLE IF NOT EXISTS tags (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL UNIQUE
                );

                CREATE TABLE IF NOT EXISTS tag_article (
                    tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    article_id TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                    PRIMARY KEY (tag_id, article_id)
                );

                CREATE TABLE IF NOT EXISTS archive_dates (
                    id TEXT PRIMARY KEY,
                    month TEXT NOT NULL UNIQUE,
                    article_count INTEGER NOT NULL DEFAULT 0,
                    published_article_count INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS archive_date_article (
                    archive_date_id TEXT NOT NULL REFERENCES archive_dates(id) ON DELETE CASCADE,
                    article_id TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                    PRIMARY KEY (archive_date_id, article_id)
                );

                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_pages_order ON pages(page_order);
                CREATE INDEX IF NOT EXISTS idx_pages_permalink ON pages(permalink);
                CREATE INDEX IF NOT EXISTS idx_articles_permalink ON articles(permalink);
                CREATE INDEX IF NOT EXISTS idx_comments_owner ON comments(owner_id);
                CREATE INDEX IF NOT EXISTS idx_tag_article_article ON tag_article(article_id);
                CREATE INDEX IF NOT EXISTS idx_archive_date_article_article ON archive_date_article(article_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    /// Run `f` inside one transaction: commit when it returns `Ok`, roll back
    /// when it returns `Err`. The error is handed back unchanged.
    pub fn in_transaction<R, F>(&self, f: F) -> Result<R, ServiceError>
    where
        F: FnOnce(&Connection) -> Result<R, ServiceError>,
    {
        let tx = self.begin()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit().context("Failed to commit transaction")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!(error = %rollback_err, "Failed to roll back transaction");
                }
                Err(err)
            }
        }
    }

    /// Begin a transaction for operations that need to decide between
    /// commit and rollback themselves. Dropping the guard rolls back.
    pub fn begin(&self) -> Result<Transaction<'_>, ServiceError> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        Ok(tx)
    }

    /// Direct read access for queries that need no transaction.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ── Settings ──────────────────────────────────────────────────────

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        get_setting(&self.conn, key)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                params![key, value],
            )
            .context("Failed to upsert setting")?;
        Ok(())
    }

    /// Store `value` under `key` unless the key already has a value.
    pub fn seed_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .context("Failed to seed setting")?;
        Ok(())
    }
}

pub(crate) fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn
        .prepare("SELECT value FROM settings WHERE key = ?1")
        .context("Failed to prepare get_setting")?;
    let mut rows = stmt
        .query_map(params![key], |row| row.get::<_, String>(0))
        .context("Failed to query setting")?;
    match rows.next() {
        Some(row) => Ok(Some(row.context("Failed to read setting")?)),
        None => Ok(None),
    }
}
