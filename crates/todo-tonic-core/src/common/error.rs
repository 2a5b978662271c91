//! Error types for the to-do service.
//!
//! This module defines the central `Error` enum returned by every request
//! handler. It implements `From<Error>` for `tonic::Status` so handlers can
//! propagate failures to clients with the right status code and message.
//!
//! ## Error Cases
//! - `InvalidRequest`: a caller-supplied field failed validation
//!   (`InvalidArgument`).
//! - `NotFound`: the targeted id has no row (`NotFound`).
//! - Every other variant is a storage failure (`Internal`) and carries the
//!   underlying driver text after an operation-specific prefix.

use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the to-do service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The client request failed a precondition.
    #[error("{reason}")]
    InvalidRequest { reason: String },

    /// No row matches the requested id.
    #[error("todo not found")]
    NotFound,

    #[error("failed to insert into todo: {0}")]
    Insert(String),

    /// The insert succeeded but storage did not report the generated id.
    #[error("failed to retrieve id for created todo: {0}")]
    GeneratedId(String),

    #[error("failed to retrieve todo: {0}")]
    Read(String),

    #[error("failed to retrieve todos: {0}")]
    ReadAll(String),

    /// A row came back from a scan but could not be decoded.
    #[error("failed to scan todo item: {0}")]
    Scan(String),

    #[error("failed to update todo: {0}")]
    Update(String),

    #[error("failed to delete todo: {0}")]
    Delete(String),
}

impl Error {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn missing_id() -> Self {
        Self::invalid("todo id is required")
    }

    pub fn empty_title() -> Self {
        Self::invalid("title cannot be empty")
    }

    /// The gRPC status code this error is reported with.
    pub const fn code(&self) -> Code {
        match self {
            Self::InvalidRequest { .. } => Code::InvalidArgument,
            Self::NotFound => Code::NotFound,
            Self::Insert(_)
            | Self::GeneratedId(_)
            | Self::Read(_)
            | Self::ReadAll(_)
            | Self::Scan(_)
            | Self::Update(_)
            | Self::Delete(_) => Code::Internal,
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        Status::new(err.code(), err.to_string())
    }
}
