//! Raw community message model.
//!
//! Raw events are written by ingestion and never mutated by the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Natural identity of a raw event, shared by its annotation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    pub reaction_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl EventKey {
    #[must_use]
    pub fn new(reaction_id: Uuid, timestamp: DateTime<Utc>) -> Self {
        Self {
            reaction_id,
            timestamp,
        }
    }
}

/// A stored community message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RawEventRecord {
    /// Opaque unique token assigned by the store
    pub reaction_id: Uuid,
    /// When the message was posted
    pub timestamp: DateTime<Utc>,
    /// Message body with newlines flattened to spaces
    pub reaction_text: String,
    /// Source channel name
    pub chat_name: String,
    /// Originating sender
    pub sender: String,
    /// Source system tag (e.g., "Telegram")
    pub source: String,
}

impl RawEventRecord {
    #[must_use]
    pub fn key(&self) -> EventKey {
        EventKey::new(self.reaction_id, self.timestamp)
    }
}

/// A message awaiting insertion; the store assigns its id.
///
/// Re-importing the same export is a no-op because
/// `(timestamp, chat_name, sender)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRawEvent {
    pub timestamp: DateTime<Utc>,
    pub reaction_text: String,
    pub chat_name: String,
    pub sender: String,
    pub source: String,
}

impl NewRawEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        reaction_text: impl Into<String>,
        chat_name: impl Into<String>,
        sender: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            reaction_text: reaction_text.into(),
            chat_name: chat_name.into(),
            sender: sender.into(),
            source: source.into(),
        }
    }
}

/// A unit of annotation work: one raw event and its text.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct WorkItem {
    pub reaction_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub reaction_text: String,
}

impl WorkItem {
    #[must_use]
    pub fn key(&self) -> EventKey {
        EventKey::new(self.reaction_id, self.timestamp)
    }
}

impl From<&RawEventRecord> for WorkItem {
    fn from(event: &RawEventRecord) -> Self {
        Self {
            reaction_id: event.reaction_id,
            timestamp: event.timestamp,
            reaction_text: event.reaction_text.clone(),
        }
    }
}
