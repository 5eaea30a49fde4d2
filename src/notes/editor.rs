//! Editing session over a [`NoteStore`]: the note list plus the draft being edited.

use super::storage::StorageError;
use super::store::{Note, NoteStore};

/// Single owner of the notes list and the current draft.
pub struct NotesEditor {
    store: NoteStore,
    notes: Vec<Note>,
    draft: Note,
}

impl NotesEditor {
    /// Open an editor and load the stored notes.
    pub fn open(store: NoteStore) -> Result<Self, StorageError> {
        let notes = store.list()?;
        Ok(Self {
            store,
            notes,
            draft: Note::default(),
        })
    }

    /// Notes as last loaded from the store.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// The draft currently being edited.
    pub fn draft(&self) -> &Note {
        &self.draft
    }

    /// Discard the draft and start a blank note.
    pub fn new_note(&mut self) {
        self.draft = Note::default();
    }

    /// Load a stored note into the draft. Returns false for unknown ids.
    pub fn select(&mut self, id: &str) -> bool {
        match self
            .notes
            .iter()
            .find(|note| note.id.as_ref().is_some_and(|stored| stored.matches(id)))
        {
            Some(note) => {
                self.draft = note.clone();
                true
            }
            None => false,
        }
    }

    /// Replace the draft title.
    pub fn edit_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
    }

    /// Replace the draft content.
    pub fn edit_content(&mut self, content: impl Into<String>) {
        self.draft.content = content.into();
    }

    /// Persist the draft, reload the list and reset the draft.
    ///
    /// A draft with neither title nor content is not saved and `Ok(None)` is returned.
    pub fn save(&mut self) -> Result<Option<Note>, StorageError> {
        if self.draft.is_blank() {
            return Ok(None);
        }
        let draft = std::mem::take(&mut self.draft);
        let saved = match self.store.upsert(draft.clone()) {
            Ok(saved) => saved,
            Err(error) => {
                self.draft = draft;
                return Err(error);
            }
        };
        self.reload()?;
        Ok(Some(saved))
    }

    /// Delete a note, reload the list, and reset the draft if it was the deleted note.
    pub fn delete(&mut self, id: &str) -> Result<(), StorageError> {
        self.store.delete(id)?;
        self.reload()?;
        if self.draft.id.as_ref().is_some_and(|stored| stored.matches(id)) {
            self.draft = Note::default();
        }
        Ok(())
    }

    /// Re-read the list from the store.
    pub fn reload(&mut self) -> Result<(), StorageError> {
        self.notes = self.store.list()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::storage::MemoryStorage;
    use crate::notes::store::ManualClock;

    fn editor() -> NotesEditor {
        NotesEditor::open(NoteStore::with_clock(
            MemoryStorage::new(),
            ManualClock::new(500),
        ))
        .expect("open")
    }

    #[test]
    fn blank_draft_is_not_saved() {
        let mut editor = editor();
        assert_eq!(editor.save().expect("save"), None);
        assert!(editor.notes().is_empty());
    }

    #[test]
    fn save_persists_reloads_and_resets_draft() {
        let mut editor = editor();
        editor.edit_title("Standup");
        editor.edit_content("- shipped parser");

        let saved = editor.save().expect("save").expect("saved note");

        assert_eq!(editor.notes(), &[saved.clone()]);
        assert_eq!(editor.draft(), &Note::default());
        assert!(editor.select(&saved.id.expect("id").to_string()));
        assert_eq!(editor.draft().title, "Standup");
    }

    #[test]
    fn deleting_selected_note_clears_draft() {
        let mut editor = editor();
        editor.edit_title("Temp");
        let saved = editor.save().expect("save").expect("saved");
        let id = saved.id.expect("id").to_string();

        assert!(editor.select(&id));
        editor.delete(&id).expect("delete");

        assert!(editor.notes().is_empty());
        assert_eq!(editor.draft(), &Note::default());
        assert!(!editor.select(&id));
    }
}
