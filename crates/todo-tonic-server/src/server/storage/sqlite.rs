use super::{StoreError, ToDoStore};
use crate::server::config::ServerConfig;
use core::str::FromStr;
use sqlx::{
    Row,
    migrate::{MigrateError, Migrator},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
};
use todo_tonic_core::types::{ToDoDraft, ToDoRecord};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const INSERT: &str = "INSERT INTO todo (title, description, reminder) VALUES (?, ?, ?)";
const SELECT_ONE: &str = "SELECT id, title, description, reminder FROM todo WHERE id = ?";
const SELECT_ALL: &str = "SELECT id, title, description, reminder FROM todo";
const UPDATE: &str = "UPDATE todo SET title = ?, description = ?, reminder = ? WHERE id = ?";
const DELETE: &str = "DELETE FROM todo WHERE id = ?";

/// [`ToDoStore`] backed by a pooled SQLite database.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens a connection pool according to `config`.
    ///
    /// In-memory databases exist per connection, so they are pinned to a
    /// single connection that is never recycled.
    pub async fn connect(config: &ServerConfig) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?;
        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout);

        if config.is_in_memory() {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        Ok(Self::from_pool(pool))
    }

    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        MIGRATOR.run(&self.pool).await
    }
}

fn columns(row: &SqliteRow) -> Result<ToDoRecord, sqlx::Error> {
    Ok(ToDoRecord {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        reminder: row.try_get("reminder")?,
    })
}

fn decode(row: &SqliteRow) -> Result<ToDoRecord, StoreError> {
    columns(row).map_err(StoreError::Scan)
}

#[tonic::async_trait]
impl ToDoStore for SqliteStore {
    async fn insert(&self, draft: &ToDoDraft) -> Result<i64, StoreError> {
        let result = sqlx::query(INSERT)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(draft.reminder)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingId);
        }
        Ok(result.last_insert_rowid())
    }

    async fn fetch(&self, id: i64) -> Result<Option<ToDoRecord>, StoreError> {
        sqlx::query(SELECT_ONE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(decode)
            .transpose()
    }

    async fn fetch_all(&self) -> Result<Vec<ToDoRecord>, StoreError> {
        let rows = sqlx::query(SELECT_ALL).fetch_all(&self.pool).await?;
        rows.iter().map(decode).collect()
    }

    async fn update(&self, record: &ToDoRecord) -> Result<u64, StoreError> {
        let result = sqlx::query(UPDATE)
            .bind(&record.title)
            .bind(&record.description)
            .bind(record.reminder)
            .bind(record.id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(DELETE).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
