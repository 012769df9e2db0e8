use serde::{Deserialize, Serialize};

use crate::LibraryError;

/// An sRGB colour, serialised as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl std::str::FromStr for Rgb {
    type Err = LibraryError;

    /// Accepts `#rrggbb`, `#rgb` and `rgb(r, g, b)`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let raw = value.trim();
        let invalid = || LibraryError::InvalidColor(value.to_string());

        if let Some(hex) = raw.strip_prefix('#') {
            if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            let hex = match hex.len() {
                6 => hex.to_string(),
                3 => hex.chars().flat_map(|c| [c, c]).collect(),
                _ => return Err(invalid()),
            };
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
            return Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?));
        }

        let inner = raw
            .strip_prefix("rgb(")
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(invalid)?;
        let channels = inner
            .split(',')
            .map(|part| part.trim().parse::<u8>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        match channels.as_slice() {
            [r, g, b] => Ok(Rgb::new(*r, *g, *b)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Rgb {
    type Error = LibraryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPair {
    pub bg: Rgb,
    pub text: Rgb,
}

/// Scales every channel by `percent` (negative darkens), clamped to 0..=255.
pub fn adjust_color(color: Rgb, percent: i32) -> Rgb {
    let scale = |c: u8| {
        let c = f64::from(c);
        (c + c * f64::from(percent) / 100.0).clamp(0.0, 255.0).round() as u8
    };
    Rgb::new(scale(color.r), scale(color.g), scale(color.b))
}

pub fn luminance(color: Rgb) -> f64 {
    0.299 * f64::from(color.r) + 0.587 * f64::from(color.g) + 0.114 * f64::from(color.b)
}

pub fn is_dark(color: Rgb) -> bool {
    luminance(color) < 186.0
}
