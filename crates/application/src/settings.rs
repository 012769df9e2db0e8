//! Settings manager: owns [`Preferences`] and their persistence.

use std::rc::Rc;

use libris_core::{
    CUSTOM_THEME_NAME, ColorPair, DEFAULT_THEME_NAME, LibraryError, PreferenceStore, Preferences,
    Rendition, Rgb, SortOrder, StyleRules, Theme, adjust_color, is_dark,
};
use serde_json::{Map, Value};

use crate::library::Library;

pub const PREFERENCES_KEY: &str = "readerPreferences";
pub const BASE_LAYOUT_STYLE: &str = "baseLayout";
pub const CUSTOM_STYLE: &str = "customTheme";

pub struct SettingsManager {
    prefs: Preferences,
    store: Rc<dyn PreferenceStore>,
}

impl SettingsManager {
    /// Loads persisted preferences over the defaults. Each stored top-level
    /// key is merged on its own: a missing or unreadable key keeps its
    /// default, an unreadable blob is replaced by defaults.
    pub fn load(store: Rc<dyn PreferenceStore>) -> Self {
        let prefs = match store.get_item(PREFERENCES_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Map<String, Value>>(&raw) {
                Ok(stored) => merge_over_defaults(stored),
                Err(err) => {
                    tracing::warn!(error = %err, "stored preferences unreadable, using defaults");
                    Preferences::default()
                }
            },
            Ok(None) => Preferences::default(),
            Err(err) => {
                tracing::warn!(error = %err, "could not read preferences, using defaults");
                Preferences::default()
            }
        };
        let mut manager = Self { prefs, store };
        manager.prefs.normalize();
        manager
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn save(&self) -> Result<(), LibraryError> {
        let json = serde_json::to_string(&self.prefs).map_err(anyhow::Error::from)?;
        self.store.set_item(PREFERENCES_KEY, &json)?;
        tracing::debug!("saved preferences");
        Ok(())
    }

    /// Pushes the current preferences into a live rendition.
    pub fn apply_to_rendering(&self, rendition: &mut dyn Rendition) {
        rendition.register_style(BASE_LAYOUT_STYLE, base_layout());
        rendition.register_style(CUSTOM_STYLE, self.custom_rules());
        if self.prefs.keep_original_format {
            rendition.select_style(BASE_LAYOUT_STYLE);
        } else {
            rendition.select_style(CUSTOM_STYLE);
        }
    }

    fn custom_rules(&self) -> StyleRules {
        let colors = self.prefs.reading_colors();
        let mut rules = base_layout()
            .with("body", "max-width", "1140px")
            .with("body", "background", colors.bg.to_string());
        for selector in TEXT_SELECTORS {
            rules.set(selector, "color", colors.text.to_string());
            rules.set(selector, "font-family", self.prefs.font_family.clone());
            rules.set(selector, "font-size", format!("{}px", self.prefs.font_size));
            rules.set(selector, "line-height", "1.6");
        }
        rules
    }

    /// Live font size change; persisted by [`SettingsManager::commit`].
    pub fn set_font_size(&mut self, size: u32) {
        self.prefs.font_size = size;
        self.prefs.normalize();
    }

    pub fn step_font_size(&mut self, delta: i32) {
        let size = self.prefs.font_size.saturating_add_signed(delta);
        self.set_font_size(size);
    }

    /// Live custom colour change; switches to the `custom` palette.
    pub fn set_custom_colors(&mut self, colors: ColorPair) {
        self.prefs.custom_colors = colors;
        self.prefs.active_theme_name = CUSTOM_THEME_NAME.to_string();
    }

    /// Persists live edits made since the last save.
    pub fn commit(&self) -> Result<(), LibraryError> {
        self.save()
    }

    pub fn set_font_family(&mut self, family: &str) -> Result<(), LibraryError> {
        self.prefs.font_family = family.to_string();
        self.prefs.normalize();
        self.save()
    }

    pub fn cycle_font_family(&mut self) -> Result<(), LibraryError> {
        self.prefs.cycle_font_family();
        self.save()
    }

    pub fn select_theme(&mut self, name: &str) -> Result<(), LibraryError> {
        if self.prefs.keep_original_format {
            return Ok(());
        }
        self.prefs.active_theme_name = name.to_string();
        self.save()
    }

    pub fn set_sort_order(&mut self, order: SortOrder) -> Result<(), LibraryError> {
        self.prefs.sort_order = order;
        self.save()
    }

    pub fn set_keep_original_format(&mut self, keep: bool) -> Result<(), LibraryError> {
        self.prefs.keep_original_format = keep;
        self.save()
    }

    pub fn add_custom_theme(&mut self, name: &str, bg: Rgb, text: Rgb) -> Result<Theme, LibraryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::EmptyName);
        }
        if self.prefs.has_theme_named(name) {
            return Err(LibraryError::DuplicateThemeName(name.to_string()));
        }

        let theme = derive_theme(name, bg, text);
        self.prefs.themes.push(theme.clone());
        self.save()?;
        tracing::info!(theme = name, "added custom theme");
        Ok(theme)
    }

    /// Removes a custom theme. Built-ins are rejected; unknown names are a
    /// no-op. Returns whether the active theme fell back to the default.
    pub fn delete_theme(&mut self, name: &str) -> Result<bool, LibraryError> {
        let Some(theme) = self.prefs.theme(name) else {
            return Ok(false);
        };
        if !theme.is_custom {
            return Err(LibraryError::BuiltinTheme(name.to_string()));
        }

        self.prefs.themes.retain(|t| t.name != name);
        let fell_back = self.prefs.active_theme_name == name;
        if fell_back {
            self.prefs.active_theme_name = DEFAULT_THEME_NAME.to_string();
        }
        self.save()?;
        tracing::info!(theme = name, fell_back, "deleted custom theme");
        Ok(fell_back)
    }

    /// Wipes the library and every persisted preference and position.
    pub fn reset_all(&mut self, library: &Library) -> Result<(), LibraryError> {
        if library.is_available() {
            library.clear()?;
        }
        self.store.clear_items()?;
        self.prefs = Preferences::default();
        tracing::info!("reset all data");
        Ok(())
    }
}

const TEXT_SELECTORS: &[&str] = &[
    "p", "li", "a", "span", "div", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote",
    "pre",
];

fn base_layout() -> StyleRules {
    StyleRules::new()
        .with("body", "padding", "20px")
        .with("body", "box-sizing", "border-box")
}

/// Surface and border are lightened for dark backgrounds and darkened for
/// light ones.
pub fn derive_theme(name: &str, bg: Rgb, text: Rgb) -> Theme {
    let (surface_pct, border_pct) = if is_dark(bg) { (15, 30) } else { (-10, -20) };
    Theme {
        name: name.to_string(),
        bg,
        text,
        surface: adjust_color(bg, surface_pct),
        border: adjust_color(bg, border_pct),
        is_custom: true,
    }
}

fn merge_over_defaults(stored: Map<String, Value>) -> Preferences {
    let defaults = Preferences::default();
    let Ok(Value::Object(mut merged)) = serde_json::to_value(&defaults) else {
        return defaults;
    };

    for (key, value) in stored {
        let value = match (key.as_str(), value) {
            ("themes", Value::Array(items)) => Value::Array(readable_themes(items)),
            (_, value) => value,
        };
        let mut candidate = merged.clone();
        candidate.insert(key.clone(), value);
        match serde_json::from_value::<Preferences>(Value::Object(candidate.clone())) {
            Ok(_) => merged = candidate,
            Err(err) => tracing::warn!(key = %key, error = %err, "ignoring unreadable preference"),
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or(defaults)
}

/// Drops stored themes that no longer parse, keeping the rest.
fn readable_themes(items: Vec<Value>) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| match serde_json::from_value::<Theme>(item.clone()) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable theme");
                false
            }
        })
        .collect()
}
