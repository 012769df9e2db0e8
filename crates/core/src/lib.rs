//! Core domain types for Libris.

mod color;
mod error;
mod present;
mod preferences;
mod store;

use std::cmp::Ordering;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization as _;
use unicode_normalization::char::is_combining_mark;

pub use color::{ColorPair, Rgb, adjust_color, is_dark, luminance};
pub use error::LibraryError;
pub use present::{BookLoader, LoadedBook, Presenter, Rendition, StyleRules};
pub use preferences::{
    CUSTOM_THEME_NAME, DEFAULT_THEME_NAME, FONT_SIZE_MAX, FONT_SIZE_MIN, POPULAR_FONTS,
    Preferences, SortOrder, Theme, builtin_themes,
};
pub use store::{BookStore, PreferenceStore};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub String);

impl BookId {
    /// Identity of an imported file. Two distinct files sharing both name and
    /// size map to the same id and overwrite each other.
    pub fn from_file(name: &str, size: u64) -> Self {
        Self(format!("{name}-{size}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    #[serde(rename = "txt")]
    Text,
    /// Structured book container (EPUB).
    Epub,
}

impl BookFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookFormat::Text => "txt",
            BookFormat::Epub => "epub",
        }
    }

    /// Format implied by a file name's extension, if it is one we import.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = std::path::Path::new(name).extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("txt") {
            Some(BookFormat::Text)
        } else if ext.eq_ignore_ascii_case("epub") {
            Some(BookFormat::Epub)
        } else {
            None
        }
    }
}

impl std::fmt::Display for BookFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookFormat {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(BookFormat::Text),
            "epub" => Ok(BookFormat::Epub),
            _ => Err("unknown book format"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub publisher: Option<String>,
    pub pubdate: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
}

impl BookMetadata {
    pub fn title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
    }
}

/// Cover image as found in the container, before it is inlined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub media_type: String,
    pub data: Vec<u8>,
}

impl CoverImage {
    /// Inline `data:` URL; the only cover representation that is persisted.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.data))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: BookId,
    pub title: String,
    pub format: BookFormat,
    pub content: Vec<u8>,
    pub last_opened_at: DateTime<Utc>,
    pub cover_image: Option<String>,
    pub metadata: Option<BookMetadata>,
}

impl BookRecord {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Opaque, format-specific locator of where the reader left off.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadingPosition(pub String);

impl ReadingPosition {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocItem {
    pub label: String,
    pub href: String,
    #[serde(default)]
    pub children: Vec<TocItem>,
}

impl TocItem {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }
}

/// Depth-first flattening, keeping the nesting level for indentation.
pub fn flatten_toc(items: &[TocItem]) -> Vec<(usize, &TocItem)> {
    fn walk<'a>(items: &'a [TocItem], depth: usize, out: &mut Vec<(usize, &'a TocItem)>) {
        for item in items {
            out.push((depth, item));
            walk(&item.children, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    walk(items, 0, &mut out);
    out
}

/// Entries whose label contains `query`, ignoring case. An empty query keeps
/// everything.
pub fn filter_toc<'a>(items: &'a [TocItem], query: &str) -> Vec<(usize, &'a TocItem)> {
    let needle = query.trim().to_uppercase();
    flatten_toc(items)
        .into_iter()
        .filter(|(_, item)| needle.is_empty() || item.label.to_uppercase().contains(&needle))
        .collect()
}

/// Orders titles as a reader would: accents and case are ignored first, so
/// "Ánh trăng" sorts with the a's, then broken by case-folded and raw text.
pub fn compare_titles(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| a.cmp(b))
}

fn collation_key(title: &str) -> String {
    title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'đ' | 'Đ' => 'd',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn sort_books(books: &mut [BookRecord], order: SortOrder) {
    match order {
        SortOrder::LastOpened => books.sort_by(|a, b| b.last_opened_at.cmp(&a.last_opened_at)),
        SortOrder::TitleAsc => books.sort_by(|a, b| compare_titles(&a.title, &b.title)),
        SortOrder::TitleDesc => books.sort_by(|a, b| compare_titles(&b.title, &a.title)),
    }
}
