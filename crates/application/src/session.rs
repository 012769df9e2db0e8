//! The book currently open for reading.

use std::rc::Rc;

use chrono::Utc;
use libris_core::{
    BookFormat, BookId, LibraryError, Presenter, ReadingPosition, Rendition, TocItem, filter_toc,
};

use crate::library::Library;
use crate::settings::SettingsManager;

struct OpenBook {
    id: BookId,
    format: BookFormat,
    title: String,
    rendition: Box<dyn Rendition>,
}

pub struct Session {
    presenter: Rc<dyn Presenter>,
    current: Option<OpenBook>,
}

impl Session {
    pub fn new(presenter: Rc<dyn Presenter>) -> Self {
        Self {
            presenter,
            current: None,
        }
    }

    pub fn current_id(&self) -> Option<&BookId> {
        self.current.as_ref().map(|book| &book.id)
    }

    pub fn current_format(&self) -> Option<BookFormat> {
        self.current.as_ref().map(|book| book.format)
    }

    pub fn current_title(&self) -> Option<&str> {
        self.current.as_ref().map(|book| book.title.as_str())
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn rendition(&self) -> Option<&dyn Rendition> {
        self.current.as_ref().map(|book| book.rendition.as_ref())
    }

    pub fn rendition_mut(&mut self) -> Option<&mut dyn Rendition> {
        match self.current.as_mut() {
            Some(book) => Some(book.rendition.as_mut()),
            None => None,
        }
    }

    /// Opens `id`, replacing whatever was open. The saved position is
    /// restored when it still resolves; otherwise reading starts at the
    /// beginning.
    pub fn open(
        &mut self,
        library: &Library,
        settings: &SettingsManager,
        id: &BookId,
    ) -> Result<(), LibraryError> {
        self.close();

        let mut record = library
            .get(id)?
            .ok_or_else(|| LibraryError::BookNotFound(id.clone()))?;
        record.last_opened_at = Utc::now();
        library.put(&record)?;
        if let Err(err) = library.set_last_opened(id) {
            tracing::warn!(id = %id, error = %err, "could not record last opened book");
        }

        let mut rendition = self
            .presenter
            .render(&record)
            .map_err(|err| LibraryError::RenderFailure(format!("{err:#}")))?;

        let saved = library.position(id).unwrap_or_else(|err| {
            tracing::warn!(id = %id, error = %err, "could not read reading position");
            None
        });
        let restored = saved
            .as_ref()
            .map(|position| rendition.display(Some(position.as_str())));
        match restored {
            Some(Ok(())) => {}
            Some(Err(err)) => {
                tracing::warn!(id = %id, error = %err, "saved position no longer valid");
                display_start(rendition.as_mut())?;
            }
            None => display_start(rendition.as_mut())?,
        }
        settings.apply_to_rendering(rendition.as_mut());

        tracing::info!(id = %id, format = %record.format, "opened book");
        self.current = Some(OpenBook {
            id: record.id,
            format: record.format,
            title: record.title,
            rendition,
        });
        self.drain_relocations(library);
        Ok(())
    }

    /// Persists a new position for the open book. Failures are logged only.
    pub fn on_position_changed(&self, library: &Library, position: &ReadingPosition) {
        let Some(book) = &self.current else {
            return;
        };
        match library.save_position(&book.id, position) {
            Ok(()) => tracing::debug!(id = %book.id, position = position.as_str(), "saved position"),
            Err(err) => tracing::warn!(id = %book.id, error = %err, "could not save position"),
        }
    }

    pub fn close(&mut self) {
        if let Some(mut book) = self.current.take() {
            book.rendition.destroy();
            tracing::debug!(id = %book.id, "closed book");
        }
    }

    pub fn next(&mut self, library: &Library) {
        if let Some(rendition) = self.rendition_mut() {
            rendition.next();
        }
        self.drain_relocations(library);
    }

    pub fn prev(&mut self, library: &Library) {
        if let Some(rendition) = self.rendition_mut() {
            rendition.prev();
        }
        self.drain_relocations(library);
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        if let Some(rendition) = self.rendition_mut() {
            rendition.resize(width, height);
        }
    }

    /// Jumps to a navigation entry's href.
    pub fn go_to(&mut self, library: &Library, href: &str) -> Result<(), LibraryError> {
        if let Some(rendition) = self.rendition_mut() {
            rendition
                .display(Some(href))
                .map_err(|err| LibraryError::RenderFailure(format!("{err:#}")))?;
        }
        self.drain_relocations(library);
        Ok(())
    }

    pub fn toc(&self) -> &[TocItem] {
        self.rendition().map(|r| r.navigation()).unwrap_or_default()
    }

    pub fn filtered_toc(&self, query: &str) -> Vec<(usize, &TocItem)> {
        filter_toc(self.toc(), query)
    }

    fn drain_relocations(&mut self, library: &Library) {
        let Some(position) = self.rendition_mut().and_then(|r| r.take_relocated()) else {
            return;
        };
        self.on_position_changed(library, &position);
    }
}

fn display_start(rendition: &mut dyn Rendition) -> Result<(), LibraryError> {
    rendition
        .display(None)
        .map_err(|err| LibraryError::RenderFailure(format!("{err:#}")))
}
