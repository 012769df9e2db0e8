use std::collections::BTreeMap;

use crate::{BookFormat, BookMetadata, BookRecord, CoverImage, ReadingPosition, TocItem};

/// Selector → property → value, in the shape of a CSS rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleRules {
    rules: BTreeMap<String, BTreeMap<String, String>>,
}

impl StyleRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: &str, property: &str, value: impl Into<String>) -> Self {
        self.set(selector, property, value);
        self
    }

    pub fn set(&mut self, selector: &str, property: &str, value: impl Into<String>) {
        self.rules
            .entry(selector.to_string())
            .or_default()
            .insert(property.to_string(), value.into());
    }

    pub fn get(&self, selector: &str, property: &str) -> Option<&str> {
        self.rules
            .get(selector)
            .and_then(|props| props.get(property))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Result of parsing an imported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedBook {
    /// Payload to persist: decoded UTF-8 for text, the untouched container
    /// otherwise.
    pub content: Vec<u8>,
    pub metadata: Option<BookMetadata>,
    pub cover: Option<CoverImage>,
}

pub trait BookLoader {
    fn load(&self, name: &str, format: BookFormat, bytes: Vec<u8>) -> anyhow::Result<LoadedBook>;
}

/// A live, positioned view over one book.
pub trait Rendition {
    /// Jumps to a position token or a navigation href; `None` starts at the
    /// beginning.
    fn display(&mut self, target: Option<&str>) -> anyhow::Result<()>;
    fn next(&mut self);
    fn prev(&mut self);
    fn resize(&mut self, width: u16, height: u16);
    fn location(&self) -> Option<ReadingPosition>;
    /// Drains the most recent relocation since the last call.
    fn take_relocated(&mut self) -> Option<ReadingPosition>;
    fn navigation(&self) -> &[TocItem];
    /// Label of the chapter under the current position, e.g. `3/12 - Title`.
    fn chapter_label(&self) -> Option<String>;
    fn progress_percent(&self) -> f32;
    fn register_style(&mut self, name: &str, rules: StyleRules);
    fn select_style(&mut self, name: &str);
    fn active_style(&self) -> Option<&StyleRules>;
    fn visible_lines(&self) -> Vec<String>;
    fn destroy(&mut self);
}

pub trait Presenter {
    fn render(&self, record: &BookRecord) -> anyhow::Result<Box<dyn Rendition>>;
}
