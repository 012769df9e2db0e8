//! Reader preferences and colour themes.

use serde::{Deserialize, Serialize};

use crate::{ColorPair, Rgb};

pub const FONT_SIZE_MIN: u32 = 12;
pub const FONT_SIZE_MAX: u32 = 72;

pub const DEFAULT_THEME_NAME: &str = "Rose";
/// Active theme name meaning "use `custom_colors`".
pub const CUSTOM_THEME_NAME: &str = "custom";

pub const POPULAR_FONTS: &[&str] = &[
    "Arial",
    "Times New Roman",
    "Helvetica",
    "Courier New",
    "Verdana",
    "Georgia",
    "Tahoma",
    "Calibri",
    "Garamond",
    "Roboto",
    "Open Sans",
    "Montserrat",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub name: String,
    pub bg: Rgb,
    pub text: Rgb,
    pub surface: Rgb,
    pub border: Rgb,
    #[serde(default)]
    pub is_custom: bool,
}

impl Theme {
    fn builtin(name: &str, bg: Rgb, text: Rgb, surface: Rgb, border: Rgb) -> Self {
        Self {
            name: name.to_string(),
            bg,
            text,
            surface,
            border,
            is_custom: false,
        }
    }

    pub fn colors(&self) -> ColorPair {
        ColorPair {
            bg: self.bg,
            text: self.text,
        }
    }
}

pub fn builtin_themes() -> Vec<Theme> {
    vec![
        Theme::builtin(
            "Dark",
            Rgb::new(0x12, 0x12, 0x12),
            Rgb::new(0xe0, 0xe0, 0xe0),
            Rgb::new(0x1e, 0x1e, 0x1e),
            Rgb::new(0x3a, 0x3a, 0x3a),
        ),
        Theme::builtin(
            "Paper",
            Rgb::new(0xfb, 0xf0, 0xd9),
            Rgb::new(0x5b, 0x46, 0x36),
            Rgb::new(0xf4, 0xe8, 0xc8),
            Rgb::new(0xe6, 0xd5, 0xb0),
        ),
        Theme::builtin(
            "Gray",
            Rgb::new(0xd3, 0xd3, 0xd3),
            Rgb::new(0x11, 0x11, 0x11),
            Rgb::new(0xc0, 0xc0, 0xc0),
            Rgb::new(0xaa, 0xaa, 0xaa),
        ),
        Theme::builtin(
            "Ocean",
            Rgb::new(0x00, 0x2b, 0x36),
            Rgb::new(0x93, 0xa1, 0xa1),
            Rgb::new(0x00, 0x3c, 0x4d),
            Rgb::new(0x00, 0x55, 0x6e),
        ),
        Theme::builtin(
            DEFAULT_THEME_NAME,
            Rgb::new(35, 38, 39),
            Rgb::new(247, 183, 183),
            Rgb::new(0x36, 0x39, 0x3a),
            Rgb::new(0x4a, 0x4e, 0x4f),
        ),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "lastOpened")]
    LastOpened,
    #[serde(rename = "title-asc")]
    TitleAsc,
    #[serde(rename = "title-desc")]
    TitleDesc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::LastOpened => "lastOpened",
            SortOrder::TitleAsc => "title-asc",
            SortOrder::TitleDesc => "title-desc",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortOrder::LastOpened => "last opened",
            SortOrder::TitleAsc => "title A-Z",
            SortOrder::TitleDesc => "title Z-A",
        }
    }

    pub fn cycle(self) -> Self {
        match self {
            SortOrder::LastOpened => SortOrder::TitleAsc,
            SortOrder::TitleAsc => SortOrder::TitleDesc,
            SortOrder::TitleDesc => SortOrder::LastOpened,
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortOrder {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "lastOpened" => Ok(SortOrder::LastOpened),
            "title-asc" => Ok(SortOrder::TitleAsc),
            "title-desc" => Ok(SortOrder::TitleDesc),
            _ => Err("unknown sort order"),
        }
    }
}

/// Persisted as one JSON object. Fields absent from a stored blob take their
/// default, so new fields need no migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub font_size: u32,
    pub font_family: String,
    pub active_theme_name: String,
    pub keep_original_format: bool,
    pub sort_order: SortOrder,
    pub custom_colors: ColorPair,
    pub themes: Vec<Theme>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            font_size: 32,
            font_family: "Arial".to_string(),
            active_theme_name: DEFAULT_THEME_NAME.to_string(),
            keep_original_format: false,
            sort_order: SortOrder::LastOpened,
            custom_colors: ColorPair {
                bg: Rgb::new(0x1a, 0x1a, 0x1a),
                text: Rgb::new(0xe0, 0xe0, 0xe0),
            },
            themes: builtin_themes(),
        }
    }
}

impl Preferences {
    pub fn normalize(&mut self) {
        self.font_size = self.font_size.clamp(FONT_SIZE_MIN, FONT_SIZE_MAX);
        let family = self.font_family.trim();
        self.font_family = if family.is_empty() {
            POPULAR_FONTS[0].to_string()
        } else {
            family.to_string()
        };
        if self.themes.is_empty() {
            self.themes = builtin_themes();
        }
    }

    pub fn theme(&self, name: &str) -> Option<&Theme> {
        self.themes.iter().find(|t| t.name == name)
    }

    pub fn has_theme_named(&self, name: &str) -> bool {
        let lowered = name.trim().to_lowercase();
        self.themes.iter().any(|t| t.name.to_lowercase() == lowered)
    }

    /// Theme used for the application chrome. `custom` and unknown names
    /// fall back to the first theme.
    pub fn app_theme(&self) -> &Theme {
        self.theme(&self.active_theme_name)
            .or_else(|| self.themes.first())
            .unwrap_or(&FALLBACK_THEME)
    }

    /// Colours applied to book content.
    pub fn reading_colors(&self) -> ColorPair {
        if self.active_theme_name == CUSTOM_THEME_NAME {
            self.custom_colors
        } else {
            self.app_theme().colors()
        }
    }

    pub fn cycle_font_family(&mut self) {
        let next = POPULAR_FONTS
            .iter()
            .position(|f| *f == self.font_family)
            .map(|i| (i + 1) % POPULAR_FONTS.len())
            .unwrap_or(0);
        self.font_family = POPULAR_FONTS[next].to_string();
    }
}

static FALLBACK_THEME: Theme = Theme {
    name: String::new(),
    bg: Rgb::new(0x12, 0x12, 0x12),
    text: Rgb::new(0xe0, 0xe0, 0xe0),
    surface: Rgb::new(0x1e, 0x1e, 0x1e),
    border: Rgb::new(0x3a, 0x3a, 0x3a),
    is_custom: false,
};
