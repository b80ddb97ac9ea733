//! Local dictionary storage.
//!
//! Stores are opaque word -> row lookups. Rows are column-name -> text maps;
//! turning them into responses is the job of [`super::transform`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row};

use super::error::{DictionaryError, Result};

/// One stored headword as column -> text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictRow {
    columns: BTreeMap<String, String>,
}

impl DictRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: impl Into<String>) {
        self.columns.insert(column.to_string(), value.into());
    }

    /// Column text, empty when absent.
    pub fn get(&self, column: &str) -> &str {
        self.columns.get(column).map(String::as_str).unwrap_or("")
    }

    /// First non-empty value among `columns`.
    pub fn first_of(&self, columns: &[&str]) -> &str {
        columns
            .iter()
            .map(|c| self.get(c))
            .find(|v| !v.is_empty())
            .unwrap_or("")
    }

    pub fn get_i64(&self, column: &str) -> i64 {
        self.get(column).trim().parse().unwrap_or(0)
    }

    pub fn word(&self) -> &str {
        self.get("word")
    }
}

/// Exact-match word storage behind a local provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalDictStore: Send + Sync {
    /// Case-insensitive exact lookup.
    async fn query_exact(&self, word: &str) -> Result<Option<DictRow>>;

    async fn count(&self) -> Result<u64>;

    /// Up to `limit` headwords ordered from the first one `>= word`.
    async fn scan_from(&self, word: &str, limit: usize) -> Result<Vec<String>>;

    async fn close(&self);
}

// ============================================================================
// SQLite
// ============================================================================

pub const DEFAULT_TABLE: &str = "stardict";

/// Read-only SQLite dictionary (one row per headword, `word` column keyed).
pub struct SqliteDictStore {
    pool: SqlitePool,
    table: String,
    path: Option<PathBuf>,
}

fn validate_table(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DictionaryError::config(format!("invalid table name '{table}'")))
    }
}

impl SqliteDictStore {
    pub async fn open(path: &Path, table: &str) -> Result<Self> {
        validate_table(table)?;
        if !path.is_file() {
            return Err(DictionaryError::unavailable(format!(
                "dictionary file not found: {}",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::debug!(path = %path.display(), table, "Opened SQLite dictionary");
        Ok(Self {
            pool,
            table: table.to_string(),
            path: Some(path.to_path_buf()),
        })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool, table: &str) -> Result<Self> {
        validate_table(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn row_to_dict(row: &SqliteRow) -> DictRow {
        let mut dict = DictRow::new();
        for (i, column) in row.columns().iter().enumerate() {
            let value = if let Ok(v) = row.try_get::<Option<String>, _>(i) {
                v.unwrap_or_default()
            } else if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
                v.map(|n| n.to_string()).unwrap_or_default()
            } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
                v.map(|n| n.to_string()).unwrap_or_default()
            } else {
                String::new()
            };
            dict.insert(column.name(), value);
        }
        dict
    }
}

#[async_trait]
impl LocalDictStore for SqliteDictStore {
    async fn query_exact(&self, word: &str) -> Result<Option<DictRow>> {
        let sql = format!(
            "SELECT * FROM {} WHERE word = ? COLLATE NOCASE LIMIT 1",
            self.table
        );
        let row = sqlx::query(&sql)
            .bind(word.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::row_to_dict))
    }

    async fn count(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) AS n FROM {}", self.table);
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        let n: i64 = row.try_get("n")?;
        Ok(n.max(0) as u64)
    }

    async fn scan_from(&self, word: &str, limit: usize) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT word FROM {} WHERE word >= ? COLLATE NOCASE \
             ORDER BY word COLLATE NOCASE LIMIT ?",
            self.table
        );
        let rows = sqlx::query(&sql)
            .bind(word.trim().to_lowercase())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("word").map_err(DictionaryError::from))
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Ordered in-memory store keyed by lower-cased headword.
#[derive(Default)]
pub struct MemoryDictStore {
    rows: RwLock<BTreeMap<String, DictRow>>,
}

impl MemoryDictStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row(self, row: DictRow) -> Self {
        self.insert(row);
        self
    }

    pub fn insert(&self, row: DictRow) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(row.word().to_lowercase(), row);
        }
    }
}

#[async_trait]
impl LocalDictStore for MemoryDictStore {
    async fn query_exact(&self, word: &str) -> Result<Option<DictRow>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| DictionaryError::internal("dictionary lock poisoned"))?;
        Ok(rows.get(&word.trim().to_lowercase()).cloned())
    }

    async fn count(&self) -> Result<u64> {
        let rows = self
            .rows
            .read()
            .map_err(|_| DictionaryError::internal("dictionary lock poisoned"))?;
        Ok(rows.len() as u64)
    }

    async fn scan_from(&self, word: &str, limit: usize) -> Result<Vec<String>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| DictionaryError::internal("dictionary lock poisoned"))?;
        Ok(rows
            .range(word.trim().to_lowercase()..)
            .take(limit)
            .map(|(_, row)| row.word().to_string())
            .collect())
    }

    async fn close(&self) {}
}
