//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// One Dark piece colours, indexed by `TetrominoKind::color_index`:
/// cyan, yellow, magenta, green, red, blue, orange.
const ONEDARK_PIECES: [Color; 7] = [
    Color::Rgb(0x56, 0xB6, 0xC2),
    Color::Rgb(0xE5, 0xC0, 0x7B),
    Color::Rgb(0xC6, 0x78, 0xDD),
    Color::Rgb(0x98, 0xC3, 0x79),
    Color::Rgb(0xE0, 0x6C, 0x75),
    Color::Rgb(0x61, 0xAF, 0xEF),
    Color::Rgb(0xD1, 0x9A, 0x66),
];

const HIGH_CONTRAST_PIECES: [Color; 7] = [
    Color::Rgb(0x00, 0xFF, 0xFF),
    Color::Rgb(0xFF, 0xFF, 0x00),
    Color::Rgb(0xFF, 0x00, 0xFF),
    Color::Rgb(0x00, 0xFF, 0x00),
    Color::Rgb(0xFF, 0x00, 0x00),
    Color::Rgb(0x00, 0x88, 0xFF),
    Color::Rgb(0xFF, 0x88, 0x00),
];

// Paul Tol's bright/vibrant sets; no hue pair relies on red vs green alone.
const COLORBLIND_PIECES: [Color; 7] = [
    Color::Rgb(0x33, 0xBB, 0xEE),
    Color::Rgb(0xCC, 0xBB, 0x44),
    Color::Rgb(0xEE, 0x33, 0x77),
    Color::Rgb(0x00, 0x99, 0x88),
    Color::Rgb(0xCC, 0x33, 0x11),
    Color::Rgb(0x00, 0x77, 0xBB),
    Color::Rgb(0xEE, 0x77, 0x33),
];

const ONEDARK_BG: Color = Color::Rgb(0x31, 0x35, 0x3F);
const ONEDARK_DIV_LINE: Color = Color::Rgb(0x3F, 0x44, 0x4F);
const ONEDARK_MAIN_FG: Color = Color::Rgb(0xAB, 0xB2, 0xBF);
const ONEDARK_TITLE: Color = Color::Rgb(0xE5, 0xC0, 0x7B);
const ONEDARK_INACTIVE_FG: Color = Color::Rgb(0x5C, 0x63, 0x70);

/// Piece and UI colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Piece colours (index 0..=6): cyan, yellow, magenta, green, red, blue, orange.
    pub pieces: [Color; 7],
    /// Board background.
    pub bg: Color,
    /// Grid dots / border.
    pub div_line: Color,
    /// Text (score, level).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Key hints.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    pub fn onedark_default() -> Self {
        Self {
            pieces: ONEDARK_PIECES,
            bg: ONEDARK_BG,
            div_line: ONEDARK_DIV_LINE,
            main_fg: ONEDARK_MAIN_FG,
            title: ONEDARK_TITLE,
            inactive_fg: ONEDARK_INACTIVE_FG,
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    /// `palette` selects colour variant: Normal (theme), HighContrast, or Colorblind.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Default theme for a palette when no file is loaded.
    pub fn default_for_palette(palette: crate::Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    /// Override piece colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => self.pieces = HIGH_CONTRAST_PIECES,
            crate::Palette::Colorblind => self.pieces = COLORBLIND_PIECES,
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        // Keys follow btop's onedark.theme; missing keys keep the One Dark value.
        Self {
            pieces: [
                get("hi_fg")
                    .or_else(|| get("proc_misc"))
                    .unwrap_or(ONEDARK_PIECES[0]),
                get("cpu_mid")
                    .or_else(|| get("title"))
                    .unwrap_or(ONEDARK_PIECES[1]),
                get("net_box").unwrap_or(ONEDARK_PIECES[2]),
                get("mem_box")
                    .or_else(|| get("cpu_start"))
                    .unwrap_or(ONEDARK_PIECES[3]),
                get("cpu_end")
                    .or_else(|| get("temp_end"))
                    .unwrap_or(ONEDARK_PIECES[4]),
                get("cpu_box").unwrap_or(ONEDARK_PIECES[5]),
                get("temp_mid")
                    .or_else(|| get("download_mid"))
                    .unwrap_or(ONEDARK_PIECES[6]),
            ],
            bg: get("meter_bg").unwrap_or(ONEDARK_BG),
            div_line: get("div_line").unwrap_or(ONEDARK_DIV_LINE),
            main_fg: get("main_fg").unwrap_or(ONEDARK_MAIN_FG),
            title: get("title").unwrap_or(ONEDARK_TITLE),
            inactive_fg: get("inactive_fg").unwrap_or(ONEDARK_INACTIVE_FG),
        }
    }

    /// Colour for a piece / locked cell index (0..7).
    #[inline]
    pub fn piece_color(&self, index: u8) -> Color {
        self.pieces[(index as usize) % self.pieces.len()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(invalid)
    };
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}
