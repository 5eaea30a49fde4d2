//! Notes CRUD over a flat key-value store.

mod editor;
pub mod storage;
mod store;

pub use editor::NotesEditor;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use store::{Clock, ManualClock, NOTES_KEY, Note, NoteId, NoteStore, SystemClock};
