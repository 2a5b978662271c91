//! Storage capability used by the request handler.
//!
//! The handler never talks to a database driver directly. It issues exactly
//! one call per RPC against a [`ToDoStore`], and maps the outcome onto a gRPC
//! status. [`SqliteStore`] is the production implementation.
//!
//! ## Structure
//!
//! - [`sqlite`] - `sqlx`-backed store over a SQLite connection pool.

pub mod sqlite;

pub use sqlite::SqliteStore;

use todo_tonic_core::types::{ToDoDraft, ToDoRecord};

/// Failures surfaced by a [`ToDoStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The driver failed to run a statement or to iterate its results.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// A row was returned but could not be decoded into a [`ToDoRecord`].
    #[error(transparent)]
    Scan(sqlx::Error),

    /// An insert completed without reporting a generated id.
    #[error("insert did not report a generated row id")]
    MissingId,
}

/// Single-table persistence for to-do items.
///
/// Implementations must be safe to share across concurrent requests. Each
/// method corresponds to exactly one statement against the `todo` table.
#[tonic::async_trait]
pub trait ToDoStore: Send + Sync + 'static {
    /// Inserts a new row and returns its generated id.
    async fn insert(&self, draft: &ToDoDraft) -> Result<i64, StoreError>;

    /// Looks up a single row by id.
    async fn fetch(&self, id: i64) -> Result<Option<ToDoRecord>, StoreError>;

    /// Returns every row in storage order.
    async fn fetch_all(&self) -> Result<Vec<ToDoRecord>, StoreError>;

    /// Overwrites title, description and reminder of the row with
    /// `record.id`. Returns the number of affected rows.
    async fn update(&self, record: &ToDoRecord) -> Result<u64, StoreError>;

    /// Removes the row with `id`. Returns the number of affected rows.
    async fn delete(&self, id: i64) -> Result<u64, StoreError>;

    /// Releases pooled resources. Later calls fail.
    async fn close(&self) {}
}
