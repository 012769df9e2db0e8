//! Overlay state and the small pure helpers the views share.

use libris_core::{BookId, StyleRules};
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Default)]
pub(crate) struct TocPanel {
    pub open: bool,
    pub query: String,
    pub selected: usize,
}

#[derive(Debug, Default)]
pub(crate) struct HistoryPanel {
    pub open: bool,
    pub selected: usize,
}

#[derive(Debug, Default)]
pub(crate) struct InfoPanel {
    pub open: bool,
}

pub(crate) const SETTINGS_MENU_THEME: usize = 0;
pub(crate) const SETTINGS_MENU_FONT_SIZE: usize = 1;
pub(crate) const SETTINGS_MENU_FONT_FAMILY: usize = 2;
pub(crate) const SETTINGS_MENU_SORT: usize = 3;
pub(crate) const SETTINGS_MENU_KEEP_FORMAT: usize = 4;
pub(crate) const SETTINGS_MENU_CUSTOM_COLORS: usize = 5;
pub(crate) const SETTINGS_MENU_ADD_THEME: usize = 6;
pub(crate) const SETTINGS_MENU_DELETE_THEME: usize = 7;
pub(crate) const SETTINGS_MENU_RESET: usize = 8;
pub(crate) const SETTINGS_MENU_ITEM_COUNT: usize = 9;

#[derive(Debug, Default)]
pub(crate) struct SettingsPanel {
    pub open: bool,
    pub selected: usize,
    /// Live edits waiting for a commit when the panel closes.
    pub dirty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromptAction {
    Import,
    CustomColors,
    FontFamily,
    AddTheme,
}

impl PromptAction {
    pub fn title(self) -> &'static str {
        match self {
            PromptAction::Import => "Import books",
            PromptAction::CustomColors => "Custom colours",
            PromptAction::FontFamily => "Font family",
            PromptAction::AddTheme => "Add theme",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            PromptAction::Import => "Paths to .txt or .epub files, separated by ';'",
            PromptAction::CustomColors => "Background and text colour, e.g. #1a1a1a #e0e0e0",
            PromptAction::FontFamily => "Any installed font, e.g. Noto Serif",
            PromptAction::AddTheme => "Name, background and text, e.g. Night #101010 #eeeeee",
        }
    }
}

#[derive(Debug)]
pub(crate) struct PromptPanel {
    pub action: PromptAction,
    pub input: String,
    pub error: Option<String>,
}

impl PromptPanel {
    pub fn new(action: PromptAction, input: String) -> Self {
        Self {
            action,
            input,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConfirmAction {
    DeleteBook { id: BookId, title: String },
    DeleteTheme(String),
    ResetAll,
}

impl ConfirmAction {
    pub fn message(&self) -> String {
        match self {
            ConfirmAction::DeleteBook { title, .. } => {
                format!("Delete \"{title}\" and its reading position?")
            }
            ConfirmAction::DeleteTheme(name) => format!("Delete theme \"{name}\"?"),
            ConfirmAction::ResetAll => {
                "Delete every book, reading position and preference?".to_string()
            }
        }
    }
}

pub(crate) fn parse_import_paths(input: &str) -> Vec<String> {
    input
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `bg text`
pub(crate) fn parse_color_input(input: &str) -> Option<(String, String)> {
    let mut parts = input.split_whitespace();
    let bg = parts.next()?;
    let text = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((bg.to_string(), text.to_string()))
}

/// Collapses inner whitespace; an empty entry is rejected.
pub(crate) fn parse_font_family_input(input: &str) -> Option<String> {
    let family = input.split_whitespace().collect::<Vec<_>>().join(" ");
    (!family.is_empty()).then_some(family)
}

/// `name... bg text`; the name may contain spaces.
pub(crate) fn parse_theme_input(input: &str) -> Option<(String, String, String)> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }
    let (name, colors) = parts.split_at(parts.len() - 2);
    Some((name.join(" "), colors[0].to_string(), colors[1].to_string()))
}

/// Reading column width. The custom style's font size sets how many columns
/// fit in its 1140px measure; the original layout uses the whole area.
pub(crate) fn text_columns(style: Option<&StyleRules>, available: u16) -> u16 {
    let font_px = style
        .and_then(|s| s.get("p", "font-size"))
        .and_then(|v| v.trim_end_matches("px").parse::<u32>().ok());
    let Some(font_px) = font_px.filter(|px| *px > 0) else {
        return available;
    };
    let columns = (1140 * 2 / font_px).clamp(20, u32::from(u16::MAX));
    u16::try_from(columns).unwrap_or(u16::MAX).min(available)
}

/// Cuts `text` to at most `max_width` display columns, marking the cut.
pub(crate) fn truncate_to_width(text: &str, max_width: usize) -> String {
    let total: usize = text.chars().filter_map(UnicodeWidthChar::width).sum();
    if total <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut width = 0usize;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if width + w + 1 > max_width {
            break;
        }
        out.push(ch);
        width += w;
    }
    out.push('…');
    out
}

pub(crate) fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

pub(crate) fn format_last_opened(at: chrono::DateTime<chrono::Utc>, now: chrono::DateTime<chrono::Utc>) -> String {
    let delta = (now - at).num_seconds().max(0);
    if delta < 10 {
        return "just now".to_string();
    }
    if delta < 60 {
        return format!("{delta}s ago");
    }
    if delta < 60 * 60 {
        return format!("{}m ago", delta / 60);
    }
    if delta < 60 * 60 * 24 {
        return format!("{}h ago", delta / (60 * 60));
    }
    format!("{}d ago", delta / (60 * 60 * 24))
}
