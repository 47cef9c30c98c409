//! Telegram chat export ingestion.
//!
//! Reads the `result.json` written by Telegram Desktop's export and stores
//! each message as a raw event. Export dates carry no offset and are read
//! in the configured local timezone.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use coin_pulse_data::{EventStore, NewRawEvent};
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Source tag stored on imported events.
pub const TELEGRAM_SOURCE: &str = "Telegram";

/// Rows per insert transaction.
pub const IMPORT_BATCH_SIZE: usize = 1000;

const UNKNOWN_CHAT: &str = "Unknown Chat";
const EXPORT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Deserialize)]
struct ChatExport {
    name: Option<String>,
    #[serde(default)]
    messages: Vec<ExportMessage>,
}

#[derive(Debug, Deserialize)]
struct ExportMessage {
    date: Option<String>,
    from: Option<String>,
    #[serde(default)]
    text: Option<MessageText>,
}

/// Plain string, or a list of plain and formatted fragments.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageText {
    Plain(String),
    Parts(Vec<TextPart>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextPart {
    Plain(String),
    Formatted { text: String },
    Other(IgnoredAny),
}

impl MessageText {
    fn flatten(&self) -> String {
        let joined = match self {
            MessageText::Plain(s) => s.clone(),
            MessageText::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    TextPart::Plain(s) | TextPart::Formatted { text: s } => s.as_str(),
                    TextPart::Other(_) => "",
                })
                .collect(),
        };
        joined.replace('\n', " ")
    }
}

/// Parsed events plus the number of messages that could not be used.
#[derive(Debug, Clone, Default)]
pub struct ParsedExport {
    pub chat_name: String,
    pub events: Vec<NewRawEvent>,
    pub skipped: u64,
}

/// Parses one export file's contents.
///
/// Service messages (no sender), messages without a readable date, and
/// messages with no text are skipped.
///
/// # Errors
/// Returns an error if the document is not a chat export.
pub fn parse_export(json: &str, tz: Tz) -> Result<ParsedExport> {
    let export: ChatExport = serde_json::from_str(json).context("Not a Telegram chat export")?;
    let chat_name = export.name.unwrap_or_else(|| UNKNOWN_CHAT.to_string());

    let mut parsed = ParsedExport {
        chat_name: chat_name.clone(),
        ..Default::default()
    };

    for message in export.messages {
        let text = message.text.as_ref().map(MessageText::flatten).unwrap_or_default();
        let timestamp = message.date.as_deref().and_then(|d| parse_local(d, tz));

        match (timestamp, message.from) {
            (Some(timestamp), Some(sender)) if !text.trim().is_empty() => {
                parsed.events.push(NewRawEvent::new(
                    timestamp,
                    text,
                    chat_name.clone(),
                    sender,
                    TELEGRAM_SOURCE,
                ));
            }
            _ => parsed.skipped += 1,
        }
    }

    Ok(parsed)
}

fn parse_local(date: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(date, EXPORT_DATE_FORMAT).ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Statistics for an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub files: u64,
    pub messages: u64,
    pub skipped: u64,
    pub inserted: u64,
}

impl ImportStats {
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Files: {}, Messages: {}, Skipped: {}, Inserted: {}, Duplicates: {}",
            self.files,
            self.messages,
            self.skipped,
            self.inserted,
            self.messages - self.inserted
        )
    }
}

/// Loads chat exports into the raw event table.
pub struct ChatImporter {
    store: Arc<dyn EventStore>,
    tz: Tz,
}

impl ChatImporter {
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, tz: Tz) -> Self {
        Self { store, tz }
    }

    /// Imports one export file. Re-importing a file inserts nothing.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or a batch insert fails.
    pub async fn import_file(&self, path: &Path) -> Result<ImportStats> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let parsed = parse_export(&json, self.tz)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let mut stats = ImportStats {
            files: 1,
            messages: parsed.events.len() as u64,
            skipped: parsed.skipped,
            ..Default::default()
        };

        for (index, batch) in parsed.events.chunks(IMPORT_BATCH_SIZE).enumerate() {
            let inserted = self
                .store
                .insert_events(batch)
                .await
                .with_context(|| format!("Failed to insert batch {}", index + 1))?;
            stats.inserted += inserted;
            tracing::debug!(batch = index + 1, inserted, "Import batch committed");
        }

        tracing::info!(
            chat = %parsed.chat_name,
            path = %path.display(),
            "Import complete: {}",
            stats.summary()
        );
        Ok(stats)
    }
}
