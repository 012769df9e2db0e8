//! Library store: book records plus the per-book pointers kept beside them.

use std::rc::Rc;

use libris_core::{
    BookId, BookRecord, BookStore, LibraryError, PreferenceStore, ReadingPosition, SortOrder,
    sort_books,
};

pub const LAST_OPENED_KEY: &str = "lastOpenedBook";

pub fn position_key(id: &BookId) -> String {
    format!("location-{id}")
}

enum Backend {
    Ready(Rc<dyn BookStore>),
    Unavailable(String),
}

pub struct Library {
    backend: Backend,
    prefs: Rc<dyn PreferenceStore>,
}

impl Library {
    pub fn new(books: Rc<dyn BookStore>, prefs: Rc<dyn PreferenceStore>) -> Self {
        Self {
            backend: Backend::Ready(books),
            prefs,
        }
    }

    /// A library whose record store failed to open. Every record operation
    /// reports [`LibraryError::StorageUnavailable`].
    pub fn unavailable(reason: impl Into<String>, prefs: Rc<dyn PreferenceStore>) -> Self {
        Self {
            backend: Backend::Unavailable(reason.into()),
            prefs,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.backend, Backend::Ready(_))
    }

    fn books(&self) -> Result<&dyn BookStore, LibraryError> {
        match &self.backend {
            Backend::Ready(store) => Ok(store.as_ref()),
            Backend::Unavailable(reason) => Err(LibraryError::StorageUnavailable(reason.clone())),
        }
    }

    pub fn put(&self, record: &BookRecord) -> Result<(), LibraryError> {
        self.books()?.put(record)?;
        Ok(())
    }

    pub fn get(&self, id: &BookId) -> Result<Option<BookRecord>, LibraryError> {
        Ok(self.books()?.get(id)?)
    }

    pub fn list(&self) -> Result<Vec<BookRecord>, LibraryError> {
        Ok(self.books()?.list()?)
    }

    pub fn sorted(&self, order: SortOrder) -> Result<Vec<BookRecord>, LibraryError> {
        let mut books = self.list()?;
        sort_books(&mut books, order);
        Ok(books)
    }

    /// Removes the record and its reading position. Deleting an absent id
    /// succeeds.
    pub fn delete(&self, id: &BookId) -> Result<(), LibraryError> {
        self.books()?.delete(id)?;
        self.prefs.remove_item(&position_key(id))?;
        if self.last_opened()?.as_ref() == Some(id) {
            self.prefs.remove_item(LAST_OPENED_KEY)?;
        }
        tracing::info!(id = %id, "deleted book");
        Ok(())
    }

    /// Removes every record and every reading position.
    pub fn clear(&self) -> Result<(), LibraryError> {
        let books = self.books()?;
        let ids = books.ids()?;
        books.clear()?;
        for id in &ids {
            self.prefs.remove_item(&position_key(id))?;
        }
        self.prefs.remove_item(LAST_OPENED_KEY)?;
        tracing::info!(count = ids.len(), "cleared library");
        Ok(())
    }

    pub fn position(&self, id: &BookId) -> Result<Option<ReadingPosition>, LibraryError> {
        Ok(self.prefs.get_item(&position_key(id))?.map(ReadingPosition))
    }

    pub fn save_position(&self, id: &BookId, position: &ReadingPosition) -> Result<(), LibraryError> {
        self.prefs.set_item(&position_key(id), position.as_str())?;
        Ok(())
    }

    pub fn last_opened(&self) -> Result<Option<BookId>, LibraryError> {
        Ok(self.prefs.get_item(LAST_OPENED_KEY)?.map(BookId))
    }

    pub fn set_last_opened(&self, id: &BookId) -> Result<(), LibraryError> {
        self.prefs.set_item(LAST_OPENED_KEY, id.as_str())?;
        Ok(())
    }
}
