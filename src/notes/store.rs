//! Notes persisted as one JSON array under a single storage key.
//!
//! The array is treated as foreign data: elements are decoded leniently for display, and
//! writes only replace the element being saved, leaving every other element byte-for-byte
//! as it was read.

use super::storage::{KeyValueStorage, StorageError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use time::OffsetDateTime;

/// Storage key holding the notes array.
pub const NOTES_KEY: &str = "SmartNotes";

/// Note identifier as stored. Ids assigned here are strings; ids written by other clients
/// keep their JSON type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Value);

impl NoteId {
    /// Whether the textual form of this id equals `id`.
    pub fn matches(&self, id: &str) -> bool {
        text_matches(&self.0, id)
    }

    /// The id when it is stored as a string.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }
}

impl From<String> for NoteId {
    fn from(id: String) -> Self {
        Self(Value::String(id))
    }
}

impl From<&str> for NoteId {
    fn from(id: &str) -> Self {
        Self(Value::String(id.to_string()))
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(id) => f.write_str(id),
            other => write!(f, "{other}"),
        }
    }
}

/// A note as stored. Timestamps are epoch milliseconds set by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Identifier assigned on first save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NoteId>,
    /// Title line.
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    /// Body text.
    #[serde(default, deserialize_with = "lenient_text")]
    pub content: String,
    /// Creation time, set once.
    #[serde(
        default,
        deserialize_with = "lenient_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<i64>,
    /// Last write time.
    #[serde(
        default,
        deserialize_with = "lenient_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<i64>,
    /// Fields written by other clients, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Note {
    /// Unsaved note with the given title and content.
    pub fn draft(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// True when both title and content are empty.
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }
}

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Clock frozen at `start`.
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Move the clock forward by `millis`.
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// List / upsert / delete over the notes array.
///
/// There is no locking: each write replaces the whole array, so concurrent writers from
/// separate processes resolve as last-write-wins.
pub struct NoteStore {
    storage: Box<dyn KeyValueStorage>,
    clock: Box<dyn Clock>,
}

impl NoteStore {
    /// Store over `storage` using wall-clock time.
    pub fn new(storage: impl KeyValueStorage + 'static) -> Self {
        Self::with_clock(storage, SystemClock)
    }

    /// Store over `storage` using `clock` for ids and timestamps.
    pub fn with_clock(
        storage: impl KeyValueStorage + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        Self {
            storage: Box::new(storage),
            clock: Box::new(clock),
        }
    }

    /// The stored array exactly as read; empty when nothing has been saved yet.
    pub fn list_raw(&self) -> Result<Vec<Value>, StorageError> {
        let Some(raw) = self.storage.get(NOTES_KEY)? else {
            return Ok(Vec::new());
        };
        let entries: Option<Vec<Value>> =
            serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
                key: NOTES_KEY.to_string(),
                source,
            })?;
        Ok(entries.unwrap_or_default())
    }

    /// Stored notes in insertion order. Elements that are not JSON objects are skipped.
    pub fn list(&self) -> Result<Vec<Note>, StorageError> {
        Ok(self
            .list_raw()?
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Note>(entry) {
                Ok(note) => Some(note),
                Err(error) => {
                    tracing::warn!(error = %error, "Skipping stored note that is not an object");
                    None
                }
            })
            .collect())
    }

    /// Insert or replace `note`, returning the stored version.
    ///
    /// A note whose id equals a stored id replaces that element, keeping the stored creation
    /// time and refreshing the update time. Anything else is appended with a fresh
    /// time-derived id.
    pub fn upsert(&self, note: Note) -> Result<Note, StorageError> {
        let mut entries = self.list_raw()?;
        let now = self.clock.now_millis();
        let position = note
            .id
            .as_ref()
            .and_then(|id| entries.iter().position(|entry| entry_id(entry) == Some(&id.0)));

        let saved = match position {
            Some(index) => {
                let saved = Note {
                    created_at: entries[index].get("createdAt").and_then(millis),
                    updated_at: Some(now),
                    ..note
                };
                entries[index] = serde_json::to_value(&saved)?;
                tracing::debug!(id = ?saved.id, "Note updated");
                saved
            }
            None => {
                let saved = Note {
                    id: Some(NoteId::from(fresh_id(now, &entries))),
                    created_at: Some(now),
                    updated_at: Some(now),
                    ..note
                };
                entries.push(serde_json::to_value(&saved)?);
                tracing::debug!(id = ?saved.id, "Note created");
                saved
            }
        };

        self.write(&entries)?;
        Ok(saved)
    }

    /// Remove every element whose id reads as `id`. Unknown ids leave the list unchanged.
    pub fn delete(&self, id: &str) -> Result<(), StorageError> {
        let mut entries = self.list_raw()?;
        let before = entries.len();
        entries.retain(|entry| !entry_id(entry).is_some_and(|stored| text_matches(stored, id)));
        tracing::debug!(id, removed = before - entries.len(), "Note delete");
        self.write(&entries)
    }

    fn write(&self, entries: &[Value]) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(entries)?;
        self.storage.set(NOTES_KEY, &encoded)
    }
}

fn entry_id(entry: &Value) -> Option<&Value> {
    entry.get("id").filter(|id| !id.is_null())
}

fn text_matches(stored: &Value, id: &str) -> bool {
    match stored {
        Value::String(stored) => stored == id,
        Value::Number(stored) => stored.to_string() == id,
        _ => false,
    }
}

fn millis(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|float| float as i64))
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    })
}

fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(millis))
}

/// Millisecond timestamp as a string, nudged forward past ids already in use.
fn fresh_id(now: i64, entries: &[Value]) -> String {
    let mut candidate = now;
    while entries.iter().any(|entry| {
        entry_id(entry).is_some_and(|stored| text_matches(stored, &candidate.to_string()))
    }) {
        candidate += 1;
    }
    candidate.to_string()
}
