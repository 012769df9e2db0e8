//! Application orchestration layer for Libris.

mod import;
mod library;
mod session;
mod settings;

use std::rc::Rc;

use libris_core::{
    BookId, BookLoader, BookRecord, ColorPair, LibraryError, Presenter, Rgb, SortOrder,
};

pub use import::{DiskFile, FileSource, ImportReport, import_files};
pub use library::{LAST_OPENED_KEY, Library, position_key};
pub use session::Session;
pub use settings::{
    BASE_LAYOUT_STYLE, CUSTOM_STYLE, PREFERENCES_KEY, SettingsManager, derive_theme,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// A message waiting to be shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Everything the front-end drives: stores, settings, the open book and the
/// sorted library list.
pub struct AppContext {
    pub library: Library,
    pub settings: SettingsManager,
    pub session: Session,
    loader: Rc<dyn BookLoader>,
    pub books: Vec<BookRecord>,
    pub selected: usize,
    notice: Option<Notice>,
}

impl AppContext {
    pub fn new(
        library: Library,
        settings: SettingsManager,
        loader: Rc<dyn BookLoader>,
        presenter: Rc<dyn Presenter>,
    ) -> Self {
        let mut ctx = Self {
            library,
            settings,
            session: Session::new(presenter),
            loader,
            books: Vec::new(),
            selected: 0,
            notice: None,
        };
        if ctx.library.is_available() {
            ctx.refresh();
        } else {
            ctx.notify_error(
                "Library storage could not be opened. Books cannot be imported or opened.",
            );
        }
        ctx
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn notify_info(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice {
            kind: NoticeKind::Info,
            message: message.into(),
        });
    }

    pub fn notify_error(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice {
            kind: NoticeKind::Error,
            message: message.into(),
        });
    }

    fn report(&mut self, err: LibraryError) {
        tracing::warn!(error = %err, "command failed");
        if err.needs_refresh() {
            self.refresh();
        }
        self.notify_error(err.to_string());
    }

    /// Reloads the library list in the preferred order, keeping the
    /// selection on the same book when it is still present.
    pub fn refresh(&mut self) {
        let selected_id = self.selected_book().map(|b| b.id.clone());
        match self.library.sorted(self.settings.preferences().sort_order) {
            Ok(books) => self.books = books,
            Err(err) => {
                self.books.clear();
                self.notify_error(err.to_string());
            }
        }
        self.selected = selected_id
            .and_then(|id| self.books.iter().position(|b| b.id == id))
            .unwrap_or(0)
            .min(self.books.len().saturating_sub(1));
    }

    pub fn selected_book(&self) -> Option<&BookRecord> {
        self.books.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.books.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Books in most-recently-opened order, independent of the list sort.
    pub fn history(&self) -> Vec<&BookRecord> {
        let mut books: Vec<&BookRecord> = self.books.iter().collect();
        books.sort_by(|a, b| b.last_opened_at.cmp(&a.last_opened_at));
        books
    }

    /// Imports a batch. Returns `None` for an empty selection, which leaves
    /// the list and the notice untouched.
    pub fn import_files(&mut self, files: &[&dyn FileSource]) -> Option<ImportReport> {
        if files.is_empty() {
            return None;
        }
        let report = import_files(&self.library, self.loader.as_ref(), files);
        self.refresh();
        if report.failed > 0 {
            let mut message = report.summary();
            for failure in &report.failures {
                message.push('\n');
                message.push_str(failure);
            }
            self.notify_error(message);
        } else {
            self.notify_info(report.summary());
        }
        Some(report)
    }

    pub fn open_book(&mut self, id: &BookId) -> bool {
        match self.session.open(&self.library, &self.settings, id) {
            Ok(()) => {
                self.refresh();
                true
            }
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    pub fn open_selected(&mut self) -> bool {
        match self.selected_book().map(|b| b.id.clone()) {
            Some(id) => self.open_book(&id),
            None => false,
        }
    }

    /// Reopens the last book read, if it still exists. Silent when there is
    /// nothing to resume.
    pub fn resume_last_book(&mut self) -> bool {
        if !self.library.is_available() {
            return false;
        }
        let id = match self.library.last_opened() {
            Ok(Some(id)) => id,
            Ok(None) => return false,
            Err(err) => {
                tracing::warn!(error = %err, "could not read last opened book");
                return false;
            }
        };
        if !self.books.iter().any(|b| b.id == id) {
            tracing::info!(id = %id, "last opened book no longer in library");
            return false;
        }
        self.open_book(&id)
    }

    pub fn close_book(&mut self) {
        self.session.close();
    }

    pub fn delete_book(&mut self, id: &BookId) {
        if self.session.current_id() == Some(id) {
            self.session.close();
        }
        let result = self.library.delete(id);
        self.refresh();
        match result {
            Ok(()) => self.notify_info("Book deleted"),
            Err(err) => self.report(err),
        }
    }

    pub fn next_page(&mut self) {
        self.session.next(&self.library);
    }

    pub fn prev_page(&mut self) {
        self.session.prev(&self.library);
    }

    pub fn go_to(&mut self, href: &str) {
        if let Err(err) = self.session.go_to(&self.library, href) {
            self.report(err);
        }
    }

    /// Re-applies preferences to the open book after a live edit.
    fn reapply(&mut self) {
        if let Some(rendition) = self.session.rendition_mut() {
            self.settings.apply_to_rendering(rendition);
        }
    }

    fn settings_result(&mut self, result: Result<(), LibraryError>) {
        match result {
            Ok(()) => self.reapply(),
            Err(err) => self.report(err),
        }
    }

    pub fn step_font_size(&mut self, delta: i32) {
        self.settings.step_font_size(delta);
        self.reapply();
    }

    pub fn set_font_size(&mut self, size: u32) {
        self.settings.set_font_size(size);
        self.reapply();
    }

    pub fn commit_settings(&mut self) {
        let result = self.settings.commit();
        self.settings_result(result);
    }

    pub fn cycle_font_family(&mut self) {
        let result = self.settings.cycle_font_family();
        self.settings_result(result);
    }

    pub fn set_font_family(&mut self, family: &str) {
        let result = self.settings.set_font_family(family);
        self.settings_result(result);
    }

    pub fn select_theme(&mut self, name: &str) {
        let result = self.settings.select_theme(name);
        self.settings_result(result);
    }

    pub fn toggle_keep_original_format(&mut self) {
        let keep = !self.settings.preferences().keep_original_format;
        let result = self.settings.set_keep_original_format(keep);
        self.settings_result(result);
    }

    pub fn cycle_sort_order(&mut self) {
        let order = self.settings.preferences().sort_order.cycle();
        self.set_sort_order(order);
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        match self.settings.set_sort_order(order) {
            Ok(()) => self.refresh(),
            Err(err) => self.report(err),
        }
    }

    /// Applies a custom background/text pair given as colour strings and
    /// persists it.
    pub fn set_custom_colors(&mut self, bg: &str, text: &str) {
        let colors = match parse_pair(bg, text) {
            Ok((bg, text)) => ColorPair { bg, text },
            Err(err) => return self.report(err),
        };
        self.settings.set_custom_colors(colors);
        self.commit_settings();
    }

    pub fn add_custom_theme(&mut self, name: &str, bg: &str, text: &str) {
        let result = parse_pair(bg, text)
            .and_then(|(bg, text)| self.settings.add_custom_theme(name, bg, text));
        match result {
            Ok(theme) => self.notify_info(format!("Added theme \"{}\"", theme.name)),
            Err(err) => self.report(err),
        }
    }

    pub fn delete_theme(&mut self, name: &str) {
        let result = self.settings.delete_theme(name).map(|fell_back| {
            if fell_back {
                self.reapply();
            }
        });
        if let Err(err) = result {
            self.report(err);
        }
    }

    /// Wipes every book, position and preference.
    pub fn reset_all(&mut self) {
        self.session.close();
        let result = self.settings.reset_all(&self.library);
        self.refresh();
        match result {
            Ok(()) => self.notify_info("All data has been reset"),
            Err(err) => self.report(err),
        }
    }
}

fn parse_pair(bg: &str, text: &str) -> Result<(Rgb, Rgb), LibraryError> {
    Ok((bg.parse()?, text.parse()?))
}
