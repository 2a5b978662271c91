//! # Item Types and Wire Conversions
//!
//! The generated [`ToDo`](crate::proto::ToDo) message is what crosses the
//! wire. Storage works with two plain Rust types instead:
//!
//! - [`ToDoDraft`] - an item that has not been persisted yet (no id)
//! - [`ToDoRecord`] - a persisted row, id included
//!
//! Reminders are held as [`DateTime<Utc>`] on the storage side and as
//! [`prost_types::Timestamp`] on the wire. Conversion is lossless at
//! nanosecond precision in both directions.

use crate::{Error, Result, proto::ToDo};
use chrono::{DateTime, Utc};
use prost_types::Timestamp;

const NANOS_PER_SECOND: i32 = 1_000_000_000;

/// A to-do item about to be inserted. Storage assigns the id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToDoDraft {
    pub title: String,
    pub description: String,
    pub reminder: DateTime<Utc>,
}

/// A persisted to-do row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToDoRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub reminder: DateTime<Utc>,
}

/// Rejects an empty title. Whitespace-only titles are accepted.
pub fn validate_title(title: &str) -> Result<()> {
    if title.is_empty() {
        return Err(Error::empty_title());
    }
    Ok(())
}

/// Rejects the unset id sentinel `0`.
pub fn require_id(id: i64) -> Result<i64> {
    if id == 0 {
        return Err(Error::missing_id());
    }
    Ok(id)
}

/// Converts a wire timestamp into the storage representation.
///
/// An absent timestamp maps to the Unix epoch, matching how proto3 treats an
/// unset message field.
pub fn reminder_from_wire(reminder: Option<&Timestamp>) -> Result<DateTime<Utc>> {
    let Some(ts) = reminder else {
        return Ok(DateTime::UNIX_EPOCH);
    };

    if !(0..NANOS_PER_SECOND).contains(&ts.nanos) {
        return Err(Error::invalid("invalid reminder timestamp"));
    }

    DateTime::from_timestamp(ts.seconds, ts.nanos as u32)
        .ok_or_else(|| Error::invalid("invalid reminder timestamp"))
}

pub fn reminder_to_wire(reminder: &DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: reminder.timestamp(),
        // Always below 2e9 so it fits in an i32.
        nanos: reminder.timestamp_subsec_nanos() as i32,
    }
}

impl TryFrom<ToDo> for ToDoDraft {
    type Error = Error;

    /// Any client-supplied id is dropped.
    fn try_from(to_do: ToDo) -> Result<Self> {
        validate_title(&to_do.title)?;
        let reminder = reminder_from_wire(to_do.reminder.as_ref())?;
        Ok(Self {
            title: to_do.title,
            description: to_do.description,
            reminder,
        })
    }
}

impl TryFrom<ToDo> for ToDoRecord {
    type Error = Error;

    fn try_from(to_do: ToDo) -> Result<Self> {
        let id = require_id(to_do.id)?;
        validate_title(&to_do.title)?;
        let reminder = reminder_from_wire(to_do.reminder.as_ref())?;
        Ok(Self {
            id,
            title: to_do.title,
            description: to_do.description,
            reminder,
        })
    }
}

impl From<ToDoRecord> for ToDo {
    fn from(record: ToDoRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            reminder: Some(reminder_to_wire(&record.reminder)),
        }
    }
}
